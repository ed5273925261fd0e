// Murmur: topic extraction for the comments under social posts
//
// This is the library root. Each module corresponds to a major subsystem
// of the analysis pipeline.

pub mod cache;
pub mod comments;
pub mod config;
pub mod db;
pub mod output;
pub mod pipeline;
pub mod status;
pub mod topics;
