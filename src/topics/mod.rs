// Topic extraction — provider tiers, response parsing, and ranking.

pub mod error;
pub mod frequency;
pub mod http;
pub mod model;
pub mod parser;
pub mod primary;
pub mod prompt;
pub mod rank;
pub mod retry;
pub mod secondary;
pub mod traits;
