//! Filename derivation for downloaded documents.
//!
//! Names come from the URL alone so that re-running the download phase maps
//! every record to the same file, which is what makes the phase resumable.

use sha2::{Digest, Sha256};
use url::Url;

use crate::extract::DOCUMENT_SUFFIX;

/// Name used when a URL has no usable final path segment.
pub const FALLBACK_FILENAME: &str = "download.pdf";

/// Number of hex characters of the URL hash appended to truncated names.
pub const FINGERPRINT_LEN: usize = 12;

/// Derives a filesystem-safe filename for a document URL.
///
/// - takes the last non-empty path segment (percent-decoded), or
///   [`FALLBACK_FILENAME`]
/// - appends `.pdf` unless the name already ends with it (any case)
/// - replaces every run of characters outside `[A-Za-z0-9._-]` with `_`
/// - if the result is longer than `max_len`, truncates the stem and appends
///   `-{fingerprint}` so distinct URLs keep distinct names
#[must_use]
pub fn safe_filename(url: &str, max_len: usize) -> String {
    let segment = last_path_segment(url);
    let mut name = if segment.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        segment
    };
    if !name.to_lowercase().ends_with(DOCUMENT_SUFFIX) {
        name.push_str(DOCUMENT_SUFFIX);
    }
    let name = sanitize_filename_component(&name);

    if name.len() <= max_len {
        return name;
    }

    // Sanitized names are ASCII, so byte slicing below is on char boundaries.
    let (stem, ext) = if name.to_lowercase().ends_with(DOCUMENT_SUFFIX) {
        name.split_at(name.len() - DOCUMENT_SUFFIX.len())
    } else {
        (name.as_str(), "")
    };
    let digest = url_fingerprint(url);
    match max_len.checked_sub(ext.len() + digest.len() + 1) {
        Some(keep) if keep >= 1 => format!("{}-{digest}{ext}", &stem[..keep.min(stem.len())]),
        _ => format!("{digest}{ext}"),
    }
}

/// Short hex digest of the full URL.
#[must_use]
pub fn url_fingerprint(url: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    digest[..FINGERPRINT_LEN].to_string()
}

/// Collapses every run of characters outside `[A-Za-z0-9._-]` into one `_`.
#[must_use]
pub fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_replaced = false;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
            prev_replaced = false;
        } else if !prev_replaced {
            out.push('_');
            prev_replaced = true;
        }
    }
    out
}

fn last_path_segment(url: &str) -> String {
    let raw_path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let segment = raw_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use std::path::{Component, Path};

    use super::*;

    const MAX: usize = 120;

    /// A plain file name that stays inside its directory.
    fn is_safe_filename(name: &str) -> bool {
        let mut components = Path::new(name).components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        )
    }

    fn is_safe_charset(name: &str) -> bool {
        name.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    }

    #[test]
    fn test_simple_pdf_url_keeps_name() {
        let name = safe_filename("https://a.gov/x.pdf", MAX);
        assert_eq!(name, "x.pdf");
        assert!(is_safe_charset(&name));
    }

    #[test]
    fn test_missing_extension_gets_pdf() {
        assert_eq!(safe_filename("https://a.gov/docs/report", MAX), "report.pdf");
        assert_eq!(safe_filename("https://a.gov/docs/r.html", MAX), "r.html.pdf");
    }

    #[test]
    fn test_uppercase_extension_kept() {
        assert_eq!(safe_filename("https://a.gov/Report.PDF", MAX), "Report.PDF");
    }

    #[test]
    fn test_query_and_fragment_ignored() {
        assert_eq!(
            safe_filename("https://a.gov/files/plan.pdf?version=2#page=4", MAX),
            "plan.pdf"
        );
    }

    #[test]
    fn test_trailing_slash_uses_previous_segment() {
        assert_eq!(safe_filename("https://a.gov/library/annual/", MAX), "annual.pdf");
    }

    #[test]
    fn test_empty_path_uses_fallback() {
        assert_eq!(safe_filename("https://a.gov/", MAX), FALLBACK_FILENAME);
        assert_eq!(safe_filename("https://a.gov", MAX), FALLBACK_FILENAME);
    }

    #[test]
    fn test_unsafe_characters_collapsed() {
        assert_eq!(
            safe_filename("https://a.gov/annual%20report%20(2023).pdf", MAX),
            "annual_report_2023_.pdf"
        );
        assert_eq!(
            safe_filename("https://a.gov/r%C3%A9sum%C3%A9.pdf", MAX),
            "r_sum_.pdf"
        );
    }

    #[test]
    fn test_unparseable_url_still_produces_name() {
        let name = safe_filename("not a url/some file.pdf?x", MAX);
        assert_eq!(name, "some_file.pdf");
    }

    #[test]
    fn test_long_name_truncated_with_fingerprint() {
        let stem = "a".repeat(200);
        let url = format!("https://a.gov/{stem}.pdf");
        let name = safe_filename(&url, MAX);

        assert_eq!(name.len(), MAX);
        assert!(name.ends_with(".pdf"));
        assert!(name.contains(&format!("-{}", url_fingerprint(&url))));
        assert!(is_safe_charset(&name));
    }

    #[test]
    fn test_long_names_with_same_prefix_stay_distinct() {
        let prefix = "b".repeat(150);
        let first = safe_filename(&format!("https://a.gov/{prefix}-one.pdf"), MAX);
        let second = safe_filename(&format!("https://a.gov/{prefix}-two.pdf"), MAX);

        assert_ne!(first, second);
        assert_eq!(first[..100], second[..100]);
    }

    #[test]
    fn test_same_url_same_name() {
        let url = format!("https://a.gov/{}.pdf", "c".repeat(300));
        assert_eq!(safe_filename(&url, MAX), safe_filename(&url, MAX));
    }

    #[test]
    fn test_tiny_max_len_falls_back_to_fingerprint() {
        let url = "https://a.gov/long-document-name.pdf";
        let name = safe_filename(url, 10);
        assert_eq!(name, format!("{}.pdf", url_fingerprint(url)));
    }

    #[test]
    fn test_fingerprint_is_hex_of_fixed_length() {
        let digest = url_fingerprint("https://a.gov/x.pdf");
        assert_eq!(digest.len(), FINGERPRINT_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(digest, url_fingerprint("https://a.gov/y.pdf"));
    }

    #[test]
    fn test_derived_names_are_always_safe() {
        for url in [
            "https://a.gov/..",
            "https://a.gov/%2e%2e",
            "https://a.gov/a%2Fb.pdf",
            "https://a.gov/.pdf",
        ] {
            let name = safe_filename(url, MAX);
            assert!(is_safe_filename(&name), "{url} -> {name}");
            assert!(is_safe_charset(&name), "{url} -> {name}");
        }
    }
}
