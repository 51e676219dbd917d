//! URL handling module for Sitesift
//!
//! This module provides URL normalization, link resolution, and the
//! same-origin check that keeps a crawl on the seed's site.

mod normalize;

pub use normalize::{normalize_url, resolve_link};

use url::Url;

/// Returns true if both URLs share scheme, host and port
///
/// # Examples
///
/// ```
/// use sitesift::url::same_origin;
/// use url::Url;
///
/// let seed = Url::parse("https://example.com/").unwrap();
/// assert!(same_origin(&seed, &Url::parse("https://example.com/docs").unwrap()));
/// assert!(!same_origin(&seed, &Url::parse("https://other.com/").unwrap()));
/// ```
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}
