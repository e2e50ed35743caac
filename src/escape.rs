use std::borrow::Cow;

/// Escapes `& < > " '` as HTML entities. Text with nothing to escape is
/// returned as is.
pub fn escape_html(raw: &str) -> Cow<'_, str> {
    let Some(first) = raw.find(['&', '<', '>', '"', '\'']) else {
        return Cow::Borrowed(raw);
    };

    let mut escaped = String::with_capacity(raw.len() + 16);
    escaped.push_str(&raw[..first]);
    for c in raw[first..].chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}
