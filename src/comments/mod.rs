// Comment sources — where a post's comments come from.

pub mod import;
pub mod resolver;

pub use resolver::{CommentCache, CommentResolver};
