//! HTML parser for catalog listing and course detail pages
//!
//! This module handles parsing HTML content to extract:
//! - Course detail links (and the search term) from listing pages
//! - Course fields from detail pages
//! - Contact links from instructor profile pages
//!
//! Selectors follow the catalog's markup with generic fallbacks (`og:*`
//! meta tags, canonical links) where the catalog-specific ones miss.

use crate::record::{DetailLink, InstructorProfile, InstructorSummary, ParsedCourse};
use crate::url::{course_slug, is_course_url, resolve_link};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Errors that can occur while parsing a detail page
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The page loaded but is not a course detail page
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
}

impl ParseError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
        }
    }
}

/// Links discovered on one listing page
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub url: Url,
    /// Search term shown in the listing header, if any
    pub search_term: Option<String>,
    /// Detail links in document order, without duplicates
    pub links: Vec<DetailLink>,
}

/// Extracts structured data from fetched HTML
///
/// All operations are pure functions of their input.
pub trait RecordParser: Send + Sync {
    /// Extracts detail links from a listing page
    ///
    /// Never fails: markup that does not match yields an empty link list.
    fn extract_links(&self, html: &str, page_url: &Url) -> ListingPage;

    /// Extracts a course from a detail page
    ///
    /// Fails with [`ParseError::MissingField`] when the title or the course
    /// identifier cannot be located. Other fields are optional.
    fn extract_record(&self, html: &str) -> Result<ParsedCourse, ParseError>;

    /// Extracts an instructor's profile; every field is optional
    fn extract_instructor(&self, html: &str, page_url: &Url) -> InstructorProfile;
}

/// [`RecordParser`] for the course catalog's markup
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogParser;

impl CatalogParser {
    pub fn new() -> Self {
        Self
    }
}

impl RecordParser for CatalogParser {
    fn extract_links(&self, html: &str, page_url: &Url) -> ListingPage {
        let document = Html::parse_document(html);
        let search_term = extract_search_term(&document);

        // Prefer the result-card title links; fall back to any course link
        let mut hrefs = select_attrs(
            &document,
            "h3[data-purpose='course-title-url'] a[href]",
            "href",
        );
        if hrefs.is_empty() {
            hrefs = select_attrs(&document, "a[href]", "href");
        }

        let mut seen = HashSet::new();
        let links = hrefs
            .iter()
            .filter_map(|href| resolve_link(page_url, href))
            .filter(is_course_url)
            .filter(|url| seen.insert(url.clone()))
            .map(|url| DetailLink::new(url).with_search_term(search_term.clone()))
            .collect();

        ListingPage {
            url: page_url.clone(),
            search_term,
            links,
        }
    }

    fn extract_record(&self, html: &str) -> Result<ParsedCourse, ParseError> {
        let document = Html::parse_document(html);

        let title = first_text(
            &document,
            &[
                "h1[class*='clp-lead__title']",
                "h1[data-purpose='lead-title']",
            ],
        )
        .or_else(|| first_attr(&document, &["meta[property='og:title']"], "content"))
        .ok_or(ParseError::MissingField("title"))?;

        let canonical = first_attr(&document, &["meta[property='og:url']"], "content")
            .or_else(|| first_attr(&document, &["link[rel='canonical']"], "href"))
            .and_then(|href| Url::parse(&href).ok())
            .ok_or(ParseError::MissingField("identifier"))?;

        let slug = course_slug(&canonical).ok_or(ParseError::MissingField("identifier"))?;

        Ok(ParsedCourse {
            slug,
            title,
            subtitle: first_text(
                &document,
                &[
                    "div[class*='clp-lead__headline']",
                    "[data-purpose='lead-headline']",
                ],
            ),
            price: first_text(&document, &["[data-purpose='course-price-text'] span span"])
                .or_else(|| first_text(&document, &["[data-purpose='course-price-text']"])),
            rating: first_text(
                &document,
                &["[data-purpose='rating-number']", "span.ud-sr-only"],
            ),
            num_students: first_text(
                &document,
                &["[data-purpose='enrollment']", "div[class*='enrollment']"],
            ),
            created_by: select_texts(&document, "a[class*='ud-instructor-links']"),
            last_updated: first_text(
                &document,
                &[
                    "[data-purpose='last-update-date']",
                    "div[class*='last-update-date']",
                ],
            ),
            instructor: extract_instructor_summary(&document, &canonical),
            canonical_url: canonical.to_string(),
        })
    }

    fn extract_instructor(&self, html: &str, page_url: &Url) -> InstructorProfile {
        let document = Html::parse_document(html);
        let link = |purpose: &str| {
            let css = format!("a[data-purpose='{}']", purpose);
            first_attr(&document, &[css.as_str()], "href")
        };

        InstructorProfile {
            name: first_text(&document, &["h1[class*='ud-heading-serif-xxxl']", "h1"]),
            profile_url: first_attr(&document, &["meta[property='og:url']"], "content")
                .or_else(|| Some(page_url.to_string())),
            website: link("personal-website-link"),
            twitter: link("twitter-link"),
            linkedin: link("linkedin-link"),
            facebook: link("facebook-link"),
            youtube: link("youtube-link"),
        }
    }
}

/// Extracts the quoted search term from the listing header
///
/// The header reads like `1,234 results for “rust”`.
fn extract_search_term(document: &Html) -> Option<String> {
    let header = first_text(document, &["h1[class*='search--header-title']"])?;

    let (open, close) = if header.contains('“') {
        ('“', '”')
    } else {
        ('"', '"')
    };

    let start = header.find(open)? + open.len_utf8();
    let end = start + header[start..].find(close)?;
    let term = header[start..end].trim();

    if term.is_empty() {
        None
    } else {
        Some(term.to_string())
    }
}

/// Extracts the instructor block shown on a course page
fn extract_instructor_summary(document: &Html, base: &Url) -> InstructorSummary {
    let stats = select_texts(
        document,
        "div[class*='instructor__image-and-stats'] div[class*='ud-block-list-item-content']",
    );
    let stat = |idx: usize| stats.get(idx).cloned();

    InstructorSummary {
        name: first_text(document, &["div[class*='instructor--instructor__title']"]),
        profile_url: first_attr(
            document,
            &["div[class*='instructor--instructor__title'] a[href]"],
            "href",
        )
        .and_then(|href| base.join(&href).ok())
        .map(|url| url.to_string()),
        rating: stat(0),
        reviews: stat(1),
        students: stat(2),
        courses: stat(3),
    }
}

/// Collapses whitespace in an element's text; `None` when empty
fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Text of the first element matching any of the selectors, tried in order
fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document.select(&selector).find_map(element_text)
    })
}

/// Attribute of the first element matching any of the selectors
fn first_attr(document: &Html, selectors: &[&str], attr: &str) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .filter_map(|element| element.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// Non-empty texts of every element matching the selector
fn select_texts(document: &Html, css: &str) -> Vec<String> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).filter_map(element_text).collect(),
        Err(_) => Vec::new(),
    }
}

/// Attribute values of every element matching the selector
fn select_attrs(document: &Html, css: &str, attr: &str) -> Vec<String> {
    match Selector::parse(css) {
        Ok(selector) => document
            .select(&selector)
            .filter_map(|element| element.value().attr(attr))
            .map(str::to_string)
            .collect(),
        Err(_) => Vec::new(),
    }
}
