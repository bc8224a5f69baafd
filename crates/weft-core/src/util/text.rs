//! Text normalization utilities.
//!
//! Provides the normalization rules every component agrees on, so the
//! analyzer, the cache key, and graph name matching all see the same form of
//! a query or name.

/// Normalize free text: lowercase, trim, and collapse whitespace runs into a
/// single space.
///
/// # Examples
///
/// ```
/// use weft_core::util::text::normalize_query;
///
/// assert_eq!(normalize_query("  FastAPI   Authentication "), "fastapi authentication");
/// assert_eq!(normalize_query("\tOAuth2\nFlow"), "oauth2 flow");
/// ```
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Kebab-case form of a concept name, the shape graph node ids take.
///
/// Any run of word separators (whitespace, `_`, `-`) becomes one hyphen and
/// separators at either end are dropped. Other punctuation is kept, so
/// `Next.js` and `C++` keep their dots and pluses.
///
/// # Examples
///
/// ```
/// use weft_core::util::text::concept_slug;
///
/// assert_eq!(concept_slug("Dependency Injection"), "dependency-injection");
/// assert_eq!(concept_slug("path_operation - Decorators"), "path-operation-decorators");
/// assert_eq!(concept_slug("Next.js"), "next.js");
/// ```
pub fn concept_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut separated = false;
    for c in name.chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            separated = !slug.is_empty();
            continue;
        }
        if separated {
            slug.push('-');
            separated = false;
        }
        slug.extend(c.to_lowercase());
    }
    slug
}

/// Split text into lowercase tokens, stripping surrounding punctuation.
///
/// Inner punctuation survives (`next.js`, `oauth2-flow`), as do trailing `+`
/// and `#` so language names like `c++` and `c#` stay intact.
///
/// # Examples
///
/// ```
/// use weft_core::util::text::tokenize;
///
/// assert_eq!(tokenize("How do I use FastAPI?"), vec!["how", "do", "i", "use", "fastapi"]);
/// assert_eq!(tokenize("(C++ vs. next.js)"), vec!["c++", "vs", "next.js"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|raw| {
            raw.trim_start_matches(|c: char| !c.is_alphanumeric())
                .trim_end_matches(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// Build a display snippet of at most `max_chars` characters.
///
/// Whitespace is collapsed; longer text is cut at the last word boundary that
/// fits and suffixed with `...`.
///
/// # Examples
///
/// ```
/// use weft_core::util::text::snippet;
///
/// assert_eq!(snippet("short text", 200), "short text");
/// assert_eq!(snippet("one two three four", 10), "one two...");
/// ```
pub fn snippet(content: &str, max_chars: usize) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let cut: String = collapsed.chars().take(max_chars).collect();
    let at_boundary = collapsed.chars().nth(max_chars) == Some(' ');
    let trimmed = match cut.rfind(' ') {
        _ if at_boundary => cut.as_str(),
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}...", trimmed.trim_end())
}
