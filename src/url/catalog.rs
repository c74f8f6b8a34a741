use crate::UrlError;
use url::Url;

/// Path under which catalog search results are served
const SEARCH_PATH: &str = "/courses/search/";

/// Path segment that introduces a course slug
const COURSE_SEGMENT: &str = "course";

/// Builds the listing URLs for a search expression and page range
///
/// Multi-word expressions use the "search as you type" form, which carries
/// the expression twice (`kw` and `q`); single words use the keyword form.
/// Values are form-encoded, so spaces become `+`.
///
/// # Examples
///
/// ```
/// use course_harvest::url::build_listing_urls;
///
/// let urls = build_listing_urls("https://www.udemy.com", "ChatGPT", 1, 2).unwrap();
/// assert_eq!(urls.len(), 2);
/// assert_eq!(
///     urls[1].as_str(),
///     "https://www.udemy.com/courses/search/?p=2&q=ChatGPT&src=ukw"
/// );
/// ```
pub fn build_listing_urls(
    base_url: &str,
    expression: &str,
    start_page: u32,
    end_page: u32,
) -> Result<Vec<Url>, UrlError> {
    let base = Url::parse(base_url).map_err(|e| UrlError::Parse(e.to_string()))?;
    let search = base
        .join(SEARCH_PATH)
        .map_err(|e| UrlError::Malformed(e.to_string()))?;

    let expression = expression.trim();
    let multi_word = expression.contains(' ');

    let urls = (start_page..=end_page)
        .map(|page| {
            let mut url = search.clone();
            {
                let page = page.to_string();
                let mut query = url.query_pairs_mut();
                query.clear();
                if multi_word {
                    query
                        .append_pair("kw", expression)
                        .append_pair("p", &page)
                        .append_pair("q", expression)
                        .append_pair("src", "sac");
                } else {
                    query
                        .append_pair("p", &page)
                        .append_pair("q", expression)
                        .append_pair("src", "ukw");
                }
            }
            url
        })
        .collect();

    Ok(urls)
}

/// Returns true if the URL points at a course detail page (`/course/<slug>`)
pub fn is_course_url(url: &Url) -> bool {
    let mut segments = match url.path_segments() {
        Some(segments) => segments.filter(|s| !s.is_empty()),
        None => return false,
    };

    matches!(
        (segments.next(), segments.next()),
        (Some(COURSE_SEGMENT), Some(_))
    )
}

/// Extracts the course slug from a course URL
///
/// For `/course/<slug>/...` the segment after `course` is returned; for any
/// other path the last non-empty segment is used.
pub fn course_slug(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .collect();

    let slug = match segments.iter().position(|s| *s == COURSE_SEGMENT) {
        Some(idx) => segments.get(idx + 1).copied(),
        None => segments.last().copied(),
    }?;

    Some(slug.to_string())
}
