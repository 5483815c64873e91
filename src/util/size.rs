//! Size helper functions.

/// Format a signed byte delta as a human-readable string.
///
/// Phase memory counters are deltas against a baseline, so negative
/// values are rendered with a leading minus sign.
pub fn format_bytes(bytes: i64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    let sign = if bytes < 0 { "-" } else { "" };
    let abs = bytes.unsigned_abs();

    if abs >= GB {
        format!("{}{:.2} GB", sign, abs as f64 / GB as f64)
    } else if abs >= MB {
        format!("{}{:.2} MB", sign, abs as f64 / MB as f64)
    } else if abs >= KB {
        format!("{}{:.2} KB", sign, abs as f64 / KB as f64)
    } else {
        format!("{}{} B", sign, abs)
    }
}

/// Clamp a byte count reported by an allocator into the signed counter domain.
#[inline]
pub(crate) fn to_delta(bytes: usize) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

/// Truncate `text` to at most `max` bytes without splitting a character.
pub(crate) fn truncate_text(mut text: String, max: Option<usize>) -> String {
    if let Some(max) = max {
        if text.len() > max {
            let mut cut = max;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
    }
    text
}
