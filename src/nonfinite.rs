// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Bare `NaN`, `Infinity` and `-Infinity` in frame data
//!
//! The renderer writes `NaN` for every escaped pixel, which strict JSON does
//! not allow. Before parsing, each bare token outside a string is replaced by
//! a marker string starting with a NUL character; after serializing, the
//! markers are turned back into the bare tokens. Everything else passes
//! through unchanged.

use std::borrow::Cow;

/// Bare token and the JSON string literal standing in for it.
/// `-Infinity` comes first so it wins over `Infinity` at a `-`.
const TOKENS: [(&str, &str); 3] = [
    ("-Infinity", "\"\\u0000-Infinity\""),
    ("Infinity", "\"\\u0000Infinity\""),
    ("NaN", "\"\\u0000NaN\""),
];

/// Replace bare non-finite tokens with marker strings
pub fn shield(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let mut out: Option<String> = None;
    let mut copied = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if b == b'"' {
            in_string = true;
            i += 1;
            continue;
        }

        if b == b'N' || b == b'I' || b == b'-' {
            if let Some((token, marker)) = TOKENS
                .iter()
                .find(|(token, _)| bytes[i..].starts_with(token.as_bytes()))
            {
                let buf = out.get_or_insert_with(|| String::with_capacity(text.len() + 256));
                buf.push_str(&text[copied..i]);
                buf.push_str(marker);
                i += token.len();
                copied = i;
                continue;
            }
        }

        i += 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&text[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(text),
    }
}

/// Turn marker strings in serialized JSON back into bare tokens
pub fn restore(json: String) -> String {
    if !json.contains("\"\\u0000") {
        return json;
    }
    TOKENS
        .iter()
        .fold(json, |acc, (token, marker)| acc.replace(marker, token))
}
