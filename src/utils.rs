use std::fmt;

pub fn memstr(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Helper to HTML escape a string.
///
/// Escapes `&`, `<`, `>`, `"` and `'`; everything else is passed through
/// unchanged.
pub struct HtmlEscape<'a>(pub &'a str);

impl fmt::Display for HtmlEscape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.as_bytes();
        let mut start = 0;

        for (i, b) in bytes.iter().enumerate() {
            macro_rules! escaping_body {
                ($quote:expr) => {{
                    if start < i {
                        // SAFETY: this is safe because we only push valid utf-8 bytes over
                        ok!(f.write_str(unsafe {
                            std::str::from_utf8_unchecked(&bytes[start..i])
                        }));
                    }
                    ok!(f.write_str($quote));
                    start = i + 1;
                }};
            }
            match *b {
                b'<' => escaping_body!("&lt;"),
                b'>' => escaping_body!("&gt;"),
                b'&' => escaping_body!("&amp;"),
                b'"' => escaping_body!("&quot;"),
                b'\'' => escaping_body!("&#x27;"),
                _ => (),
            }
        }

        if start < bytes.len() {
            // SAFETY: this is safe because we only push valid utf-8 bytes over
            f.write_str(unsafe { std::str::from_utf8_unchecked(&bytes[start..]) })
        } else {
            Ok(())
        }
    }
}

/// Returns the 1-based line number of a byte offset within a source string.
pub fn line_of_offset(source: &str, offset: usize) -> usize {
    source.as_bytes()[..offset.min(source.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            HtmlEscape("<b>\"'&</b>").to_string(),
            "&lt;b&gt;&quot;&#x27;&amp;&lt;/b&gt;"
        );
        assert_eq!(HtmlEscape("nothing to do").to_string(), "nothing to do");
    }

    #[test]
    fn test_line_of_offset() {
        let s = "a\nbb\nccc";
        assert_eq!(line_of_offset(s, 0), 1);
        assert_eq!(line_of_offset(s, 2), 2);
        assert_eq!(line_of_offset(s, 7), 3);
    }
}
