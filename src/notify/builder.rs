//! Rich notification message building
//!
//! The dispatcher passes job match content through metadata as a
//! `job_contents` array; each entry carries `job`, `match`, `requirements`,
//! and optionally `apply_url`. Builders render that into channel-native
//! formats with every user-supplied field escaped.

use serde_json::{json, Value};

use crate::notify::channels::{escape_html, sanitize_url};

/// Build the `job_contents` entry for one scored match
pub fn job_content(
    title: &str,
    company: &str,
    location: &str,
    is_remote: bool,
    salary: Option<&str>,
    job_level: Option<&str>,
    overall_score: f64,
    fit_score: f64,
    want_score: Option<f64>,
    requirements_total: usize,
    requirements_matched: usize,
    apply_url: Option<&str>,
) -> Value {
    json!({
        "job": {
            "title": title,
            "company": company,
            "location": location,
            "is_remote": is_remote,
            "salary": salary,
            "job_level": job_level,
        },
        "match": {
            "overall_score": overall_score,
            "fit_score": fit_score,
            "want_score": want_score,
        },
        "requirements": {
            "total": requirements_total,
            "matched": requirements_matched,
        },
        "apply_url": apply_url,
    })
}

fn contents(metadata: &Value) -> Vec<Value> {
    metadata
        .get("job_contents")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

fn str_field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cursor = value;
    for key in path {
        cursor = cursor.get(key)?;
    }
    cursor.as_str().filter(|s| !s.is_empty())
}

fn score(value: &Value, path: &[&str]) -> Option<f64> {
    let mut cursor = value;
    for key in path {
        cursor = cursor.get(key)?;
    }
    cursor.as_f64()
}

/// HTML email body for one or more job matches
pub fn build_html_email(subject: &str, metadata: &Value) -> String {
    let safe_subject = escape_html(subject);
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n\
         body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}\n\
         .header {{ background: #4a5fc1; color: white; padding: 20px; }}\n\
         .job-card {{ background: white; padding: 15px; margin: 10px 0;\n\
                      border-left: 4px solid #4a5fc1; }}\n\
         .job-title {{ font-size: 18px; font-weight: bold; color: #4a5fc1; }}\n\
         .job-detail {{ margin: 5px 0; font-size: 14px; }}\n\
         .footer {{ text-align: center; padding: 15px; color: #666; font-size: 12px; }}\n\
         </style>\n</head>\n<body>\n\
         <div class=\"header\"><h1>{}</h1></div>\n<div class=\"content\">\n",
        safe_subject
    );

    for job in contents(metadata) {
        let title = escape_html(str_field(&job, &["job", "title"]).unwrap_or("Unknown Position"));
        let company = escape_html(str_field(&job, &["job", "company"]).unwrap_or("Unknown"));

        html.push_str(&format!(
            "<div class=\"job-card\">\n<div class=\"job-title\">{}</div>\n\
             <div class=\"job-detail\"><strong>Company:</strong> {}</div>\n",
            title, company
        ));

        if let Some(location) = str_field(&job, &["job", "location"]) {
            html.push_str(&format!(
                "<div class=\"job-detail\">Location: {}</div>\n",
                escape_html(location)
            ));
        }
        if let Some(salary) = str_field(&job, &["job", "salary"]) {
            html.push_str(&format!(
                "<div class=\"job-detail\">Salary: {}</div>\n",
                escape_html(salary)
            ));
        }
        if let Some(level) = str_field(&job, &["job", "job_level"]) {
            html.push_str(&format!(
                "<div class=\"job-detail\">Level: {}</div>\n",
                escape_html(level)
            ));
        }

        let overall = score(&job, &["match", "overall_score"]).unwrap_or(0.0);
        let fit = score(&job, &["match", "fit_score"]).unwrap_or(0.0);
        html.push_str(&format!(
            "<div class=\"job-detail\"><strong>Match:</strong> {:.0}%</div>\n\
             <div class=\"job-detail\"><strong>Fit:</strong> {:.0}%</div>\n",
            overall, fit
        ));
        if let Some(want) = score(&job, &["match", "want_score"]) {
            html.push_str(&format!(
                "<div class=\"job-detail\"><strong>Want:</strong> {:.0}%</div>\n",
                want
            ));
        }

        let total = score(&job, &["requirements", "total"]).unwrap_or(0.0) as i64;
        let matched = score(&job, &["requirements", "matched"]).unwrap_or(0.0) as i64;
        html.push_str(&format!(
            "<div class=\"job-detail\"><strong>Requirements:</strong> {}/{} matched</div>\n",
            matched, total
        ));

        if let Some(apply_url) = str_field(&job, &["apply_url"]).and_then(sanitize_url) {
            html.push_str(&format!(
                "<div class=\"job-detail\"><a href=\"{}\">Apply Here</a></div>\n",
                apply_url
            ));
        }

        html.push_str("</div>\n");
    }

    html.push_str(
        "</div>\n<div class=\"footer\"><p>JobRadar - AI-Powered Job Matching</p></div>\n\
         </body>\n</html>",
    );
    html
}

/// Chat-webhook embeds, one per job
pub fn build_chat_embeds(metadata: &Value) -> Vec<Value> {
    contents(metadata)
        .iter()
        .map(|job| {
            let overall = score(job, &["match", "overall_score"]).unwrap_or(0.0);
            let fit = score(job, &["match", "fit_score"]).unwrap_or(0.0);
            let total = score(job, &["requirements", "total"]).unwrap_or(0.0) as i64;
            let matched = score(job, &["requirements", "matched"]).unwrap_or(0.0) as i64;

            let mut fields = vec![
                json!({"name": "Match", "value": format!("{:.0}%", overall), "inline": true}),
                json!({"name": "Fit", "value": format!("{:.0}%", fit), "inline": true}),
                json!({"name": "Requirements", "value": format!("{}/{}", matched, total), "inline": true}),
            ];
            if let Some(want) = score(job, &["match", "want_score"]) {
                fields.insert(
                    2,
                    json!({"name": "Want", "value": format!("{:.0}%", want), "inline": true}),
                );
            }
            if let Some(location) = str_field(job, &["job", "location"]) {
                fields.push(json!({"name": "Location", "value": location, "inline": true}));
            }

            let mut embed = json!({
                "title": format!(
                    "{} at {}",
                    str_field(job, &["job", "title"]).unwrap_or("Unknown Position"),
                    str_field(job, &["job", "company"]).unwrap_or("Unknown"),
                ),
                "color": 0x0099ff,
                "fields": fields,
                "footer": {"text": "JobRadar Notifications"},
            });
            if let Some(apply_url) = str_field(job, &["apply_url"]) {
                if url::Url::parse(apply_url)
                    .map(|u| matches!(u.scheme(), "http" | "https"))
                    .unwrap_or(false)
                {
                    embed["url"] = json!(apply_url);
                }
            }
            embed
        })
        .collect()
}

/// Messenger HTML message for one or more job matches
pub fn build_messenger_message(subject: &str, metadata: &Value) -> String {
    let mut lines = vec![format!("<b>{}</b>\n", escape_html(subject))];

    for (i, job) in contents(metadata).iter().enumerate() {
        if i > 0 {
            lines.push(format!("\n{}\n", "-".repeat(30)));
        }

        lines.push(format!(
            "<b>{}</b>",
            escape_html(str_field(job, &["job", "title"]).unwrap_or("Unknown Position"))
        ));
        lines.push(escape_html(
            str_field(job, &["job", "company"]).unwrap_or("Unknown"),
        ));

        if let Some(location) = str_field(job, &["job", "location"]) {
            lines.push(escape_html(location));
        }
        if let Some(salary) = str_field(job, &["job", "salary"]) {
            lines.push(escape_html(salary));
        }

        lines.push(String::new());
        let overall = score(job, &["match", "overall_score"]).unwrap_or(0.0);
        let fit = score(job, &["match", "fit_score"]).unwrap_or(0.0);
        lines.push(format!("<b>{:.0}%</b> Match", overall));
        lines.push(format!("   Fit: {:.0}%", fit));
        if let Some(want) = score(job, &["match", "want_score"]) {
            lines.push(format!("   Want: {:.0}%", want));
        }

        let total = score(job, &["requirements", "total"]).unwrap_or(0.0) as i64;
        let matched = score(job, &["requirements", "matched"]).unwrap_or(0.0) as i64;
        lines.push(format!("{}/{} requirements matched", matched, total));

        if let Some(apply_url) = str_field(job, &["apply_url"]).and_then(sanitize_url) {
            lines.push(format!("<a href=\"{}\">Apply Here</a>", apply_url));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_with_one_job() -> Value {
        json!({
            "job_contents": [job_content(
                "Señor <Engineer>",
                "Acme & Co",
                "Berlin",
                true,
                Some("90-120k EUR"),
                Some("Senior"),
                87.0,
                92.0,
                Some(67.0),
                8,
                6,
                Some("https://jobs.example/apply?id=1&ref=2"),
            )]
        })
    }

    #[test]
    fn html_email_escapes_user_fields() {
        let html = build_html_email("Matches <today>", &metadata_with_one_job());
        assert!(html.contains("Matches &lt;today&gt;"));
        assert!(html.contains("Se&#241;or") || html.contains("Señor"));
        assert!(html.contains("&lt;Engineer&gt;"));
        assert!(html.contains("Acme &amp; Co"));
        assert!(!html.contains("<Engineer>"));
        assert!(html.contains("6/8 matched"));
        assert!(html.contains("Apply Here"));
        // Ampersand in URL is escaped inside the attribute
        assert!(html.contains("id=1&amp;ref=2"));
    }

    #[test]
    fn chat_embeds_carry_scores_and_counts() {
        let embeds = build_chat_embeds(&metadata_with_one_job());
        assert_eq!(embeds.len(), 1);
        let embed = &embeds[0];
        assert!(embed["title"].as_str().unwrap().contains("Acme & Co"));
        let fields = embed["fields"].as_array().unwrap();
        assert!(fields.iter().any(|f| f["name"] == "Want"));
        assert!(fields.iter().any(|f| f["value"] == "6/8"));
        assert_eq!(embed["url"], "https://jobs.example/apply?id=1&ref=2");
    }

    #[test]
    fn messenger_message_is_escaped_html() {
        let message = build_messenger_message("Today's matches", &metadata_with_one_job());
        assert!(message.contains("<b>Today&#x27;s matches</b>"));
        assert!(message.contains("&lt;Engineer&gt;"));
        assert!(message.contains("87% Match"));
        assert!(message.contains("Want: 67%"));
    }

    #[test]
    fn empty_metadata_builds_empty_shells() {
        let html = build_html_email("Subject", &json!({}));
        assert!(html.contains("Subject"));
        assert!(build_chat_embeds(&json!({})).is_empty());
    }
}
