pub mod config;
pub mod error;
pub mod markers;

pub use config::CompressionConfig;
pub use error::{CompressionError, Result};
pub use markers::{content_spans, ContentSpan};
