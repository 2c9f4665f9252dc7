//! Pure, synchronous extraction helpers.
//!
//! Nothing in here performs I/O. The scrapers feed parsed documents in and
//! get optional values back.

pub mod category;
pub mod dates;
pub mod images;
pub mod matcher;

pub use category::normalize as normalize_category;
pub use matcher::{ElementMatcher, ValueTest};
