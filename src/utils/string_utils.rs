//! UTF-8-safe string helpers

/// Safely truncate a string to a maximum number of CHARACTERS (not bytes).
///
/// Formula sources are mostly ASCII but may contain CJK text inside `\text{}`,
/// so slicing by bytes would panic on a char boundary.
///
/// # Examples
/// ```
/// # use mp_export::utils::string_utils::safe_truncate_chars;
/// assert_eq!(safe_truncate_chars("Hello, World!", 5), "Hello");
/// assert_eq!(safe_truncate_chars("公式转换", 2), "公式");
/// assert_eq!(safe_truncate_chars("Hi", 100), "Hi");
/// ```
#[inline]
pub fn safe_truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((byte_idx, _)) => &s[..byte_idx],
    }
}

/// Shorten a value for a log line, marking the cut with an ellipsis
#[must_use]
pub fn preview_for_log(s: &str, max_chars: usize) -> String {
    let truncated = safe_truncate_chars(s, max_chars);
    if truncated.len() == s.len() {
        s.to_string()
    } else {
        format!("{truncated}…")
    }
}
