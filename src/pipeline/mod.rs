// Analysis pipeline — coordinates comment resolution, extraction, and storage.

pub mod batch;
pub mod orchestrator;
pub mod reconcile;
pub mod service;
pub mod singleflight;

pub use orchestrator::{Extraction, ExtractionSettings, TieredExtractor};
pub use service::TopicService;
