pub mod context;
pub mod error;

pub use context::{AppContext, RunContext};
pub use error::{FeedCacheError, Result};
