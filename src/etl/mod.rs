pub mod embed;
pub mod extract;
pub mod facets;
pub mod ingest;
pub mod resume;
