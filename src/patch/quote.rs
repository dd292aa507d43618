//! C-style path quoting used by git diff headers.
//!
//! Git wraps a path in double quotes when it contains control characters, a
//! quote, a backslash or non-ASCII bytes, e.g. `"a/caf\303\251.txt"`.

use std::borrow::Cow;

/// Decode a leading quoted path, returning it with the rest of the input.
///
/// Returns `None` when the input does not start with a quote or the quoted
/// part is malformed.
pub(crate) fn unquote(input: &str) -> Option<(String, &str)> {
    let body = input.strip_prefix('"')?;
    let bytes = body.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while let Some(&byte) = bytes.get(i) {
        match byte {
            b'"' => {
                let path = String::from_utf8_lossy(&decoded).into_owned();
                return Some((path, &body[i + 1..]));
            }
            b'\\' => {
                let escape = *bytes.get(i + 1)?;
                if (b'0'..=b'3').contains(&escape) {
                    let digits = bytes.get(i + 1..i + 4)?;
                    decoded.push(octal(digits)?);
                    i += 4;
                } else {
                    decoded.push(unescape(escape)?);
                    i += 2;
                }
            }
            _ => {
                decoded.push(byte);
                i += 1;
            }
        }
    }

    // unterminated
    None
}

/// Quote a path the way git does, or borrow it when no quoting is needed
pub(crate) fn quote(path: &str) -> Cow<'_, str> {
    if !path.bytes().any(needs_quoting) {
        return Cow::Borrowed(path);
    }

    let mut quoted = String::with_capacity(path.len() + 2);
    quoted.push('"');
    for byte in path.bytes() {
        match byte {
            0x07 => quoted.push_str("\\a"),
            0x08 => quoted.push_str("\\b"),
            b'\t' => quoted.push_str("\\t"),
            b'\n' => quoted.push_str("\\n"),
            0x0b => quoted.push_str("\\v"),
            0x0c => quoted.push_str("\\f"),
            b'\r' => quoted.push_str("\\r"),
            b'"' => quoted.push_str("\\\""),
            b'\\' => quoted.push_str("\\\\"),
            byte if needs_quoting(byte) => quoted.push_str(&format!("\\{byte:03o}")),
            byte => quoted.push(char::from(byte)),
        }
    }
    quoted.push('"');
    Cow::Owned(quoted)
}

fn needs_quoting(byte: u8) -> bool {
    byte < 0x20 || byte >= 0x7f || byte == b'"' || byte == b'\\'
}

fn octal(digits: &[u8]) -> Option<u8> {
    digits.iter().try_fold(0u8, |value, &digit| match digit {
        b'0'..=b'7' => value.checked_mul(8)?.checked_add(digit - b'0'),
        _ => None,
    })
}

fn unescape(escape: u8) -> Option<u8> {
    match escape {
        b'a' => Some(0x07),
        b'b' => Some(0x08),
        b't' => Some(b'\t'),
        b'n' => Some(b'\n'),
        b'v' => Some(0x0b),
        b'f' => Some(0x0c),
        b'r' => Some(b'\r'),
        b'"' => Some(b'"'),
        b'\\' => Some(b'\\'),
        _ => None,
    }
}
