use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::iter;
use std::os::windows::ffi::{OsStrExt, OsStringExt};

const TAB: u16 = b'\t' as u16;
const NEWLINE: u16 = b'\n' as u16;
const SPACE: u16 = b' ' as u16;
const QUOTE: u16 = b'"' as u16;
const BACKSLASH: u16 = b'\\' as u16;

/// Quote a single command line argument so that `CommandLineToArgvW` and the C runtime parse it
/// back into the same string.
///
/// Arguments without whitespace or quotes are returned unchanged.
pub fn escape(s: &OsStr) -> Cow<'_, OsStr> {
    let wide: Vec<u16> = s.encode_wide().collect();
    let needs_quotes =
        wide.is_empty() || wide.iter().any(|&c| matches!(c, TAB | NEWLINE | SPACE | QUOTE));
    if !needs_quotes {
        return Cow::Borrowed(s);
    }

    let mut escaped = Vec::with_capacity(wide.len() + 2);
    escaped.push(QUOTE);
    let mut backslashes = 0;
    for c in wide {
        if c == BACKSLASH {
            backslashes += 1;
        } else {
            // Backslashes are only special right before a quote.
            if c == QUOTE {
                escaped.extend(iter::repeat(BACKSLASH).take(backslashes + 1));
            }
            backslashes = 0;
        }
        escaped.push(c);
    }
    // Trailing backslashes precede the closing quote.
    escaped.extend(iter::repeat(BACKSLASH).take(backslashes));
    escaped.push(QUOTE);

    Cow::Owned(OsString::from_wide(&escaped))
}
