#![allow(unreachable_pub)]

mod error;
mod fetched;
mod summary;

pub use error::{AttemptError, BoxError, ErrorKind};
pub use fetched::Fetched;
pub use summary::BatchSummary;

/// The batchfetch `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
