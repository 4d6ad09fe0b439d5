//! `fundsync-extraction`: talks to the statement OCR/LLM proxy.

pub mod classify;
pub mod client;
pub mod protocol;

pub use classify::classify_unparsed_body;
pub use client::ExtractionClient;
pub use protocol::{cookie_header, Hop, ProxyResponse};
