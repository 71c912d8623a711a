// src/utils/url.rs

//! URL canonicalisation for identity keys.

/// Canonical identity key for a job URL.
///
/// Surrounding whitespace is trimmed. When the value parses as an http(s)
/// URL the fragment is dropped and the URL is re-serialized, so anchors and
/// host casing never split one posting into two keys. Anything else is kept
/// verbatim after trimming.
///
/// # Examples
/// ```
/// use job_router::utils::url::canonical_key;
///
/// assert_eq!(
///     canonical_key(" https://Example.com/job/42#top "),
///     "https://example.com/job/42"
/// );
/// ```
pub fn canonical_key(raw: &str) -> String {
    let trimmed = raw.trim();
    match url::Url::parse(trimmed) {
        Ok(mut parsed) if matches!(parsed.scheme(), "http" | "https") => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        _ => trimmed.to_string(),
    }
}

/// True if a listing location should be crawled over HTTP rather than read
/// from disk.
pub fn is_remote(location: &str) -> bool {
    let location = location.trim_start();
    location.starts_with("http://") || location.starts_with("https://")
}
