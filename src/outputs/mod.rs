//! Output backends for extracted articles.
//!
//! - [`json`]: a single-file JSON store implementing
//!   [`crate::repository::Repository`], used by the binary

pub mod json;
