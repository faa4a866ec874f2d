//! Extraction capabilities used by the workers
//!
//! This module contains:
//! - Listing link discovery on catalog pages
//! - The listing parser that turns a listing page into a record
//! - The record type handed to the sinks

mod links;
mod listing;
mod record;

pub use links::extract_child_links;
pub use listing::{FieldParser, ListingParser};
pub use record::ExtractedRecord;
