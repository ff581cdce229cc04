use crate::Representation;
use std::borrow::Cow;

/// Escape a fill `value` for insertion into `representation`.
///
/// ```text
/// PlainText       -> unchanged
/// StyledMarkup    -> &amp; &lt; &gt; &quot; &#39;
/// PackagedMarkup  -> &amp; &lt; &gt; &quot; &apos;
/// ```
pub fn escape_for(representation: Representation, value: &str) -> Cow<'_, str> {
    match representation {
        Representation::PlainText => Cow::Borrowed(value),
        Representation::StyledMarkup => escape_markup(value, "&#39;"),
        Representation::PackagedMarkup => escape_markup(value, "&apos;"),
    }
}

/// Escape text content the way it sits between tags in either markup: only
/// `&`, `<` and `>`. Quotes stay literal, so a pattern like `[Investor's
/// Address]` escaped here matches the derived styled markup.
pub(crate) fn escape_text(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn escape_markup<'a>(value: &'a str, apostrophe: &str) -> Cow<'a, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 16);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str(apostrophe),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}
