//! URL handling module for Catalog-Harvester
//!
//! Listing addresses are canonicalized before they enter the visited set so
//! that cosmetic variants of one listing are only extracted once.

mod canonical;

pub use canonical::canonicalize_url;
