/// Ellipsis appended to truncated display text
const ELLIPSIS: char = '…';

/// Truncate a string to at most `max_chars` characters, ending with an
/// ellipsis when anything was cut off.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut truncated: String = s.chars().take(max_chars - 1).collect();
    truncated.push(ELLIPSIS);
    truncated
}
