//! # Skimmer
//!
//! Webpage summarisation on top of the Gemini generative-language API.
//!
//! ## Features
//!
//! - **Clean extraction**: visible page text only, with navigation, ads and scripts stripped
//! - **Resilient model selection**: configured models are tried in order, with automatic
//!   discovery when they have all been retired, and the last working model is remembered
//! - **Classified failures**: bad keys and quota errors abort at once instead of burning
//!   through every candidate

pub mod agent;
pub mod api;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod render;
pub mod transport;

pub use agent::SummaryClient;
pub use api::ApiError;
pub use config::Config;
pub use extract::ExtractedContent;
