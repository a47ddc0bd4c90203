//! Notification channels and the channel registry
//!
//! Every channel implements the same `send` interface and validates its own
//! configuration. Security guards live here: webhook URLs must resolve to
//! public addresses, HTML-bearing channels escape every user-supplied field,
//! and recipients are masked in logs.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde_json::{json, Value};

use crate::errors::NotificationError;
use crate::notify::builder;

/// Abstract notification channel.
///
/// Channels report rate limits as `NotificationError::RateLimited` so the
/// dispatcher can coordinate waits across workers.
#[async_trait::async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel type identifier (factory key)
    fn channel_type(&self) -> &'static str;

    /// True when the channel has the configuration it needs to send
    fn validate_config(&self) -> bool {
        true
    }

    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        metadata: &Value,
    ) -> Result<(), NotificationError>;
}

/// Escape HTML special characters to prevent injection
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Sanitize a URL for inclusion in markup; None when the scheme is not http(s)
pub fn sanitize_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    match parsed.scheme() {
        "http" | "https" => Some(escape_html(raw)),
        _ => None,
    }
}

/// Mask an email address for safe logging: shows only the domain
pub fn mask_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((_, domain)) => format!("***@{}", domain),
        None => "***".to_string(),
    }
}

fn ip_is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_unspecified())
        }
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || is_unique_local || is_link_local)
        }
    }
}

/// Validate a webhook URL: http/https scheme and a hostname resolving only
/// to public addresses. Rejecting private ranges blocks SSRF via config.
///
/// Resolution goes through tokio's resolver; callers run on the reactor and
/// must not block on DNS.
pub async fn validate_webhook_url(raw: &str) -> bool {
    let parsed = match url::Url::parse(raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::error!("Invalid webhook URL: {}", e);
            return false;
        }
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        log::error!("Invalid URL scheme: {}", parsed.scheme());
        return false;
    }

    let host = match parsed.host_str() {
        Some(host) => host,
        None => {
            log::error!("URL missing hostname");
            return false;
        }
    };

    let port = parsed.port_or_known_default().unwrap_or(443);
    let addrs = match tokio::net::lookup_host((host, port)).await {
        Ok(addrs) => addrs,
        Err(_) => {
            log::error!("Could not resolve hostname: {}", host);
            return false;
        }
    };

    for addr in addrs {
        if !ip_is_public(&addr.ip()) {
            log::error!("URL resolves to private/reserved IP: {}", addr.ip());
            return false;
        }
    }
    true
}

/// Parse a Retry-After value (seconds) from a 429 response
fn retry_after_seconds(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

// ── Email (SMTP) ──────────────────────────────────────────────────────────

pub struct EmailChannel;

#[async_trait::async_trait]
impl NotificationChannel for EmailChannel {
    fn channel_type(&self) -> &'static str {
        "email"
    }

    fn validate_config(&self) -> bool {
        ["SMTP_SERVER", "SMTP_PORT", "SMTP_USERNAME", "SMTP_PASSWORD"]
            .iter()
            .all(|var| std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false))
    }

    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        metadata: &Value,
    ) -> Result<(), NotificationError> {
        if !self.validate_config() {
            return Err(NotificationError::NotConfigured(
                "SMTP environment variables not set".to_string(),
            ));
        }

        let server = std::env::var("SMTP_SERVER").unwrap_or_default();
        let port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(587);
        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_email =
            std::env::var("FROM_EMAIL").unwrap_or_else(|_| "noreply@jobradar.app".to_string());

        let has_rich_content = metadata
            .get("job_contents")
            .and_then(|v| v.as_array())
            .map(|a| !a.is_empty())
            .unwrap_or(false);

        let (content_type, rendered) = if has_rich_content {
            (
                ContentType::TEXT_HTML,
                builder::build_html_email(subject, metadata),
            )
        } else {
            (ContentType::TEXT_PLAIN, body.to_string())
        };

        let message = Message::builder()
            .from(from_email.parse().map_err(|e| {
                NotificationError::NotConfigured(format!("bad FROM_EMAIL: {}", e))
            })?)
            .to(recipient.parse().map_err(|e| {
                NotificationError::Rejected(format!("bad recipient address: {}", e))
            })?)
            .subject(subject)
            .header(content_type)
            .body(rendered)
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        let mailer = SmtpTransport::starttls_relay(&server)
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?
            .port(port)
            .credentials(Credentials::new(username, password))
            .build();

        mailer
            .send(&message)
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        log::info!("Email sent to {}", mask_email(recipient));
        Ok(())
    }
}

// ── Chat webhook (Discord-style embeds) ───────────────────────────────────

pub struct DiscordChannel {
    client: reqwest::Client,
}

impl DiscordChannel {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for DiscordChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NotificationChannel for DiscordChannel {
    fn channel_type(&self) -> &'static str {
        "discord"
    }

    async fn send(
        &self,
        _recipient: &str,
        subject: &str,
        body: &str,
        metadata: &Value,
    ) -> Result<(), NotificationError> {
        let webhook_url = metadata
            .get("discord_webhook_url")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| std::env::var("DISCORD_WEBHOOK_URL").ok())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                NotificationError::NotConfigured("DISCORD_WEBHOOK_URL not set".to_string())
            })?;

        if !validate_webhook_url(&webhook_url).await {
            return Err(NotificationError::Rejected(
                "unsafe webhook URL".to_string(),
            ));
        }

        let embeds = if metadata.get("job_contents").is_some() {
            builder::build_chat_embeds(metadata)
        } else {
            vec![json!({
                "title": subject,
                "description": body.chars().take(2000).collect::<String>(),
                "color": 0x0099ff,
                "footer": {"text": "JobRadar Notifications"},
            })]
        };

        let embed_count = embeds.len();
        let payload = json!({
            "username": "JobRadar",
            "embeds": embeds,
        });

        let response = self
            .client
            .post(&webhook_url)
            .json(&payload)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        if response.status().as_u16() == 429 {
            return Err(NotificationError::RateLimited(retry_after_seconds(
                &response,
            )));
        }
        if !response.status().is_success() {
            return Err(NotificationError::SendFailed(format!(
                "webhook returned {}",
                response.status()
            )));
        }

        log::info!("Chat webhook message sent ({} embed(s))", embed_count);
        Ok(())
    }
}

// ── Bot messenger (Telegram-style HTML messages) ──────────────────────────

pub struct TelegramChannel {
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Messenger message length cap
    const MAX_MESSAGE_LEN: usize = 4096;
}

impl Default for TelegramChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NotificationChannel for TelegramChannel {
    fn channel_type(&self) -> &'static str {
        "telegram"
    }

    fn validate_config(&self) -> bool {
        std::env::var("TELEGRAM_BOT_TOKEN")
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        metadata: &Value,
    ) -> Result<(), NotificationError> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                NotificationError::NotConfigured("TELEGRAM_BOT_TOKEN not set".to_string())
            })?;

        let api_url = format!("https://api.telegram.org/bot{}/sendMessage", bot_token);

        let mut message = if metadata.get("job_contents").is_some() {
            builder::build_messenger_message(subject, metadata)
        } else {
            format!("<b>{}</b>\n\n{}", escape_html(subject), escape_html(body))
        };

        if message.len() > Self::MAX_MESSAGE_LEN {
            let mut cut = Self::MAX_MESSAGE_LEN - 3;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
            message.push_str("...");
        }

        let payload = json!({
            "chat_id": recipient,
            "text": message,
            "parse_mode": "HTML",
            "disable_web_page_preview": false,
        });

        let response = self
            .client
            .post(&api_url)
            .json(&payload)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        if response.status().as_u16() == 429 {
            let retry_after = retry_after_seconds(&response);
            // The bot API also reports retry_after in the error body
            let body_retry = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| {
                    v.get("parameters")
                        .and_then(|p| p.get("retry_after"))
                        .and_then(|r| r.as_u64())
                });
            return Err(NotificationError::RateLimited(retry_after.or(body_retry)));
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(NotificationError::SendFailed(format!(
                "messenger API error {}: {}",
                status, text
            )));
        }

        log::info!("Messenger message sent to ***{}", mask_tail(recipient));
        Ok(())
    }
}

fn mask_tail(recipient: &str) -> String {
    let tail: String = recipient
        .chars()
        .rev()
        .take(3)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    tail
}

// ── Generic HTTP webhook ──────────────────────────────────────────────────

pub struct WebhookChannel {
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebhookChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NotificationChannel for WebhookChannel {
    fn channel_type(&self) -> &'static str {
        "webhook"
    }

    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        metadata: &Value,
    ) -> Result<(), NotificationError> {
        if !validate_webhook_url(recipient).await {
            return Err(NotificationError::Rejected(
                "invalid or unsafe webhook URL".to_string(),
            ));
        }

        let payload = if let Some(job_contents) = metadata.get("job_contents") {
            json!({
                "type": "job_notifications",
                "subject": subject,
                "jobs": job_contents,
                "metadata": {
                    "user_id": metadata.get("user_id"),
                    "match_id": metadata.get("match_id"),
                }
            })
        } else {
            serde_json::from_str(body).unwrap_or_else(|_| {
                json!({
                    "subject": subject,
                    "body": body,
                    "metadata": metadata,
                })
            })
        };

        let response = self
            .client
            .post(recipient)
            .header("User-Agent", "JobRadar-Notification-Service/1.0")
            .json(&payload)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        if response.status().as_u16() == 429 {
            return Err(NotificationError::RateLimited(retry_after_seconds(
                &response,
            )));
        }
        if !response.status().is_success() {
            return Err(NotificationError::SendFailed(format!(
                "webhook returned {}",
                response.status()
            )));
        }

        // Log without query string or credentials
        if let Ok(parsed) = url::Url::parse(recipient) {
            log::info!(
                "Webhook sent to {}://{}{}",
                parsed.scheme(),
                parsed.host_str().unwrap_or("?"),
                parsed.path()
            );
        }
        Ok(())
    }
}

// ── In-app ────────────────────────────────────────────────────────────────

/// In-app channel: notifications surface through the tracker rows that the
/// dispatcher writes for every send, so delivery is just a log line.
pub struct InAppChannel;

#[async_trait::async_trait]
impl NotificationChannel for InAppChannel {
    fn channel_type(&self) -> &'static str {
        "in_app"
    }

    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        _body: &str,
        _metadata: &Value,
    ) -> Result<(), NotificationError> {
        log::info!("[IN_APP] User: {}, Title: {}", recipient, subject);
        Ok(())
    }
}

// ── Factory ───────────────────────────────────────────────────────────────

/// Registry mapping channel keys to implementations.
///
/// Built-in channels are registered at construction; additional channels can
/// be registered at runtime (build-time registration replaces dynamic code
/// loading in a compiled target).
pub struct ChannelFactory {
    channels: RwLock<HashMap<String, Arc<dyn NotificationChannel>>>,
}

impl ChannelFactory {
    pub fn new() -> Self {
        let factory = Self {
            channels: RwLock::new(HashMap::new()),
        };
        factory.register(Arc::new(EmailChannel));
        factory.register(Arc::new(DiscordChannel::new()));
        factory.register(Arc::new(TelegramChannel::new()));
        factory.register(Arc::new(WebhookChannel::new()));
        factory.register(Arc::new(InAppChannel));
        factory
    }

    pub fn register(&self, channel: Arc<dyn NotificationChannel>) {
        let key = channel.channel_type().to_lowercase();
        self.channels
            .write()
            .expect("channel registry poisoned")
            .insert(key, channel);
    }

    pub fn get(&self, channel_type: &str) -> Result<Arc<dyn NotificationChannel>, NotificationError> {
        self.channels
            .read()
            .expect("channel registry poisoned")
            .get(&channel_type.to_lowercase())
            .cloned()
            .ok_or_else(|| NotificationError::UnknownChannel(channel_type.to_string()))
    }

    pub fn list(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .channels
            .read()
            .expect("channel registry poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl Default for ChannelFactory {
    fn default() -> Self {
        Self::new()
    }
}
