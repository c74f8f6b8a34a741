//! Course record types
//!
//! A [`DetailLink`] is a candidate discovered on a listing page. Once its
//! detail page has been fetched and parsed it becomes a [`ParsedCourse`], and
//! after a [`UniqueKey`] has been derived for it, a [`CourseRecord`] that can
//! be handed to a result sink.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// A link to one course detail page, as discovered on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DetailLink {
    /// Normalized URL of the detail page
    pub url: Url,

    /// Search term shown on the listing page that produced this link
    pub search_term: Option<String>,
}

impl DetailLink {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            search_term: None,
        }
    }

    pub fn with_search_term(mut self, term: Option<String>) -> Self {
        self.search_term = term;
        self
    }
}

impl fmt::Display for DetailLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Deduplication key of a course
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueKey(String);

impl UniqueKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rule used to derive a [`UniqueKey`] from a parsed course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyStrategy {
    /// The course slug from the canonical URL, e.g. `rust-fundamentals`
    #[default]
    Slug,

    /// The canonical URL declared by the page itself
    CanonicalUrl,

    /// The URL the page was fetched from
    SourceUrl,

    /// The course title, lowercased with whitespace collapsed
    Title,
}

impl KeyStrategy {
    /// Derives the unique key for a course
    ///
    /// The result depends only on the link and the parsed page content, so
    /// the same page always yields the same key.
    pub fn derive(&self, link: &DetailLink, course: &ParsedCourse) -> UniqueKey {
        match self {
            Self::Slug => UniqueKey::new(course.slug.clone()),
            Self::CanonicalUrl => UniqueKey::new(
                crate::url::normalize_url(&course.canonical_url)
                    .map(|url| url.to_string())
                    .unwrap_or_else(|_| course.canonical_url.clone()),
            ),
            Self::SourceUrl => UniqueKey::new(link.url.as_str()),
            Self::Title => UniqueKey::new(
                course
                    .title
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase(),
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slug => "slug",
            Self::CanonicalUrl => "canonical-url",
            Self::SourceUrl => "source-url",
            Self::Title => "title",
        }
    }
}

impl fmt::Display for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instructor figures shown on a course detail page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructorSummary {
    pub name: Option<String>,
    pub profile_url: Option<String>,
    pub rating: Option<String>,
    pub reviews: Option<String>,
    pub students: Option<String>,
    pub courses: Option<String>,
}

/// Fields extracted from a course detail page
///
/// `slug`, `title` and `canonical_url` are always present; a page without
/// them is not treated as a course page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCourse {
    pub slug: String,
    pub title: String,
    pub canonical_url: String,
    pub subtitle: Option<String>,
    pub price: Option<String>,
    pub rating: Option<String>,
    pub num_students: Option<String>,
    pub created_by: Vec<String>,
    pub last_updated: Option<String>,
    pub instructor: InstructorSummary,
}

/// Details from an instructor's profile page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructorProfile {
    pub name: Option<String>,
    pub profile_url: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub facebook: Option<String>,
    pub youtube: Option<String>,
}

impl InstructorProfile {
    /// Returns true if nothing could be extracted from the page
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A parsed course together with its deduplication key and provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub key: UniqueKey,
    pub source_url: String,
    pub search_term: Option<String>,
    pub course: ParsedCourse,
    pub instructor_profile: Option<InstructorProfile>,
}

impl CourseRecord {
    pub fn new(key: UniqueKey, link: &DetailLink, course: ParsedCourse) -> Self {
        Self {
            key,
            source_url: link.url.to_string(),
            search_term: link.search_term.clone(),
            course,
            instructor_profile: None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_course(slug: &str, title: &str) -> ParsedCourse {
        ParsedCourse {
            slug: slug.to_string(),
            title: title.to_string(),
            canonical_url: format!("https://www.udemy.com/course/{}/", slug),
            subtitle: None,
            price: None,
            rating: Some("4.6".to_string()),
            num_students: None,
            created_by: vec!["Jane Doe".to_string()],
            last_updated: None,
            instructor: InstructorSummary::default(),
        }
    }

    fn link(url: &str) -> DetailLink {
        DetailLink::new(Url::parse(url).unwrap())
    }

    #[test]
    fn test_slug_key() {
        let course = sample_course("rust-fundamentals", "Rust Fundamentals");
        let key = KeyStrategy::Slug.derive(&link("https://www.udemy.com/course/x/"), &course);
        assert_eq!(key.as_str(), "rust-fundamentals");
    }

    #[test]
    fn test_canonical_url_key_is_normalized() {
        let mut course = sample_course("rust", "Rust");
        course.canonical_url = "https://www.udemy.com/course/rust/?utm_source=feed#top".to_string();
        let key = KeyStrategy::CanonicalUrl.derive(&link("https://www.udemy.com/course/x/"), &course);
        assert_eq!(key.as_str(), "https://www.udemy.com/course/rust");
    }

    #[test]
    fn test_source_url_key() {
        let course = sample_course("rust", "Rust");
        let detail = link("https://www.udemy.com/course/rust-2/");
        let key = KeyStrategy::SourceUrl.derive(&detail, &course);
        assert_eq!(key.as_str(), "https://www.udemy.com/course/rust-2/");
    }

    #[test]
    fn test_title_key_collapses_whitespace() {
        let course = sample_course("rust", "  Learn   Rust\n Today ");
        let key = KeyStrategy::Title.derive(&link("https://www.udemy.com/course/rust/"), &course);
        assert_eq!(key.as_str(), "learn rust today");
    }

    #[test]
    fn test_key_is_deterministic() {
        let course = sample_course("rust", "Rust");
        let detail = link("https://www.udemy.com/course/rust/");
        for strategy in [
            KeyStrategy::Slug,
            KeyStrategy::CanonicalUrl,
            KeyStrategy::SourceUrl,
            KeyStrategy::Title,
        ] {
            assert_eq!(
                strategy.derive(&detail, &course),
                strategy.derive(&detail, &course.clone())
            );
        }
    }

    #[test]
    fn test_default_strategy_is_slug() {
        assert_eq!(KeyStrategy::default(), KeyStrategy::Slug);
    }

    #[test]
    fn test_record_carries_link_provenance() {
        let detail = link("https://www.udemy.com/course/rust/")
            .with_search_term(Some("rust".to_string()));
        let record = CourseRecord::new(
            UniqueKey::new("rust"),
            &detail,
            sample_course("rust", "Rust"),
        );
        assert_eq!(record.source_url, "https://www.udemy.com/course/rust/");
        assert_eq!(record.search_term.as_deref(), Some("rust"));
        assert!(record.instructor_profile.is_none());
    }

    #[test]
    fn test_empty_instructor_profile() {
        assert!(InstructorProfile::default().is_empty());
        let profile = InstructorProfile {
            name: Some("Jane".to_string()),
            ..Default::default()
        };
        assert!(!profile.is_empty());
    }
}
