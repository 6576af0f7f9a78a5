//! Canonical watch-URL normalization
//!
//! Every downstream component assumes the `https://www.youtube.com/watch?v=<id>`
//! form. Short links, shorts links and query-parameter links are rewritten to
//! it; anything else is passed through untouched.

use url::Url;

/// Base of every canonical watch URL.
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// A normalized video link plus the id extracted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub url: String,
    pub id: Option<String>,
}

impl VideoRef {
    /// Normalizes `raw` and remembers the video id when the link names one.
    ///
    /// Inputs the normalizer cannot place are kept as-is.
    pub fn new(raw: &str) -> Self {
        let url = normalize_or_original(raw);
        let id = url.strip_prefix(WATCH_URL_PREFIX).map(str::to_string).or_else(|| {
            Url::parse(&url)
                .ok()
                .and_then(|u| u.query_pairs().find(|(k, v)| k == "v" && !v.is_empty()).map(|(_, v)| v.into_owned()))
        });
        Self { url, id }
    }
}

fn canonical(id: &str) -> String {
    format!("{}{}", WATCH_URL_PREFIX, id)
}

fn is_youtube_host(host: &str) -> bool {
    host == "youtube.com" || host.ends_with(".youtube.com")
}

/// Turns any accepted video link into its canonical watch URL.
///
/// Returns `None` for empty input and for short links without an id. Every
/// other input yields `Some`, either canonical or the trimmed original.
///
/// # Examples
/// ```
/// use tubecore::core::url::normalize_watch_url;
///
/// let canonical = Some("https://www.youtube.com/watch?v=abc123".to_string());
/// assert_eq!(normalize_watch_url("https://youtu.be/abc123"), canonical);
/// assert_eq!(normalize_watch_url("https://www.youtube.com/shorts/abc123"), canonical);
/// assert_eq!(normalize_watch_url("https://m.youtube.com/watch?feature=share&v=abc123"), canonical);
/// assert_eq!(normalize_watch_url("https://youtu.be/"), None);
/// ```
pub fn normalize_watch_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(parsed) = Url::parse(trimmed) else {
        return Some(trimmed.to_string());
    };
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();

    if host == "youtu.be" || host.ends_with(".youtu.be") {
        let id = parsed.path().trim_matches('/').split('/').next().unwrap_or_default();
        return if id.is_empty() { None } else { Some(canonical(id)) };
    }

    if is_youtube_host(&host) {
        if let Some(rest) = parsed.path().strip_prefix("/shorts/") {
            let id = rest.split('/').next().unwrap_or_default();
            return if id.is_empty() { None } else { Some(canonical(id)) };
        }

        if let Some((_, id)) = parsed.query_pairs().find(|(k, v)| k == "v" && !v.is_empty()) {
            return Some(canonical(&id));
        }
    }

    Some(trimmed.to_string())
}

/// [`normalize_watch_url`] falling back to the trimmed input.
pub fn normalize_or_original(raw: &str) -> String {
    normalize_watch_url(raw).unwrap_or_else(|| raw.trim().to_string())
}
