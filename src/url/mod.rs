//! URL handling module for course-harvest
//!
//! This module provides URL normalization, relative link resolution, listing
//! URL construction and course slug extraction.

mod catalog;
mod normalize;

// Re-export main functions
pub use catalog::{build_listing_urls, course_slug, is_course_url};
pub use normalize::{normalize_url, resolve_link};
