use regex::Regex;
use std::sync::LazyLock;

/// Longest slug we ever hand out.
pub const SLUG_MAX_LEN: usize = 80;

/// Used when a title has no ASCII letters or digits left after cleaning.
pub const EMPTY_SLUG: &str = "ebook";

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s-]").expect("slug charset pattern compiles"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));
static HYPHENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-+").expect("hyphen pattern compiles"));

/// Turns a title into a lowercase, hyphen-separated URL segment.
///
/// The result always matches `^[a-z0-9]+(-[a-z0-9]+)*$` and is at most
/// [`SLUG_MAX_LEN`] bytes long.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    let cleaned = DISALLOWED.replace_all(&lowered, "");
    let hyphenated = WHITESPACE.replace_all(cleaned.trim(), "-");
    let collapsed = HYPHENS.replace_all(&hyphenated, "-");

    // Only ASCII survives the charset filter, so byte truncation is safe.
    let truncated = &collapsed[..collapsed.len().min(SLUG_MAX_LEN)];
    let slug = truncated.trim_matches('-');

    if slug.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_well_formed(slug: &str) -> bool {
        let pattern = Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap();
        pattern.is_match(slug) && slug.len() <= SLUG_MAX_LEN
    }

    #[test]
    fn test_basic_title() {
        assert_eq!(slugify("Adaptive Learning Basics"), "adaptive-learning-basics");
    }

    #[test]
    fn test_strips_punctuation_and_collapses_separators() {
        assert_eq!(slugify("  Rust:  The -- Good   Parts!  "), "rust-the-good-parts");
        assert_eq!(slugify("C++ & Python 3.12"), "c-python-312");
    }

    #[test]
    fn test_non_ascii_is_dropped() {
        assert_eq!(slugify("Café Crème Über"), "caf-crme-ber");
        assert_eq!(slugify("第一章"), EMPTY_SLUG);
    }

    #[test]
    fn test_edge_hyphens_removed() {
        assert_eq!(slugify("-leading and trailing-"), "leading-and-trailing");
        assert_eq!(slugify("---"), EMPTY_SLUG);
        assert_eq!(slugify(""), EMPTY_SLUG);
    }

    #[test]
    fn test_truncates_to_max_len() {
        let title = "word ".repeat(40);
        let slug = slugify(&title);
        assert!(slug.len() <= SLUG_MAX_LEN);
        assert!(!slug.ends_with('-'));
        assert!(is_well_formed(&slug));
    }

    #[test]
    fn test_invariants_hold_for_assorted_titles() {
        let long = "x".repeat(200);
        let repeated = "ab-".repeat(50);
        let titles: [&str; 8] = [
            "Adaptive Learning Basics",
            "\tTabs\nand\r\nnewlines ",
            "100% Guaranteed!!!",
            "a-b--c---d",
            "  ",
            "Émile's «quoted» title",
            long.as_str(),
            repeated.as_str(),
        ];
        for title in titles {
            let slug = slugify(title);
            assert!(is_well_formed(&slug), "bad slug {slug:?} for {title:?}");
            assert!(!slug.chars().any(char::is_whitespace));
        }
    }

    #[test]
    fn test_identical_titles_share_a_slug() {
        assert_eq!(slugify("Same Title"), slugify("Same Title"));
    }
}
