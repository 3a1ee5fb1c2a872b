//! URL handling module for Campus-Harvest
//!
//! This module provides URL canonicalisation and the registrable-domain
//! comparison used to keep a crawl on its own university's site.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, registrable_domain, same_registrable_domain};
pub use normalize::{canonical_url, normalize_url};
