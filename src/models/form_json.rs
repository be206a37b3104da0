//! Encoding of the approval form string.
//!
//! Approval templates store the form exactly as the original integration
//! wrote it: `", "` and `": "` separators, and everything outside printable
//! ASCII escaped as `\uXXXX` (surrogate pairs above U+FFFF). The platform
//! echoes those bytes back on query, so they must not drift.

use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};

#[derive(Debug, Default, Clone, Copy)]
struct SpacedAsciiFormatter;

impl Formatter for SpacedAsciiFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    // Quotes, backslashes and control characters never reach a fragment;
    // serde_json escapes those itself.
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if (' '..='~').contains(&c) {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..i])?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

/// Serialize `value` in the form-string encoding.
pub fn to_form_string<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut out = Vec::new();
    let mut ser = Serializer::with_formatter(&mut out, SpacedAsciiFormatter);
    value.serialize(&mut ser)?;
    // Every byte written above is ASCII.
    Ok(String::from_utf8_lossy(&out).into_owned())
}
