//! Text primitives for formatted (ASCII) keyword files.
//!
//! Covers the number layouts used by formatted files, whitespace
//! delimited token scanning, quoted strings, and the single byte
//! character encoding of `CHAR`/`C0nn` payloads.

use std::io::Read;

use encoding_rs::WINDOWS_1252;

use crate::ecl::types::error::{EclError, Result};

/// Decodes a fixed width character field, dropping trailing blanks and NULs.
pub fn decode_text(bytes: &[u8]) -> String {
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text.trim_end_matches([' ', '\0']).to_owned()
}

/// Encodes `value` into exactly `width` bytes, blank padded on the right.
///
/// # Errors
/// Returns `ValueTooLong` if the encoded value exceeds `width`, and
/// `InvalidFormat` if it contains characters outside Windows-1252.
pub fn encode_text(value: &str, width: usize) -> Result<Vec<u8>> {
    let (bytes, _, had_errors) = WINDOWS_1252.encode(value);
    if had_errors {
        return Err(EclError::InvalidFormat(format!(
            "'{}' cannot be encoded as Windows-1252",
            value
        )));
    }
    if bytes.len() > width {
        return Err(EclError::ValueTooLong {
            value: value.to_owned(),
            width,
        });
    }
    let mut out = bytes.into_owned();
    out.resize(width, b' ');
    Ok(out)
}

/// Splits a value into a mantissa in `[0.1, 1)` and a power of ten.
///
/// The scaling is done in two steps so neither factor overflows or
/// underflows at the ends of the `f64` range.
fn scientific(x: f64) -> (f64, i32) {
    if x == 0.0 {
        return (0.0, 0);
    }
    let mut pow = x.abs().log10().ceil() as i32;
    let half = pow / 2;
    let mut arg = x / 10f64.powi(half) / 10f64.powi(pow - half);
    if arg.abs() >= 1.0 {
        arg *= 0.1;
        pow += 1;
    }
    (arg, pow)
}

fn require_finite(value: f64, tag: &str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EclError::InvalidFormat(format!(
            "{} value {} has no formatted representation",
            tag, value
        )))
    }
}

/// # Errors
/// Returns `InvalidFormat` for NaN and infinities.
pub fn format_float(value: f32) -> Result<String> {
    require_finite(value as f64, "REAL")?;
    let (arg, pow) = scientific(value as f64);
    Ok(format!("  {:11.8}E{:+03}", arg, pow))
}

/// # Errors
/// Returns `InvalidFormat` for NaN and infinities.
pub fn format_double(value: f64) -> Result<String> {
    require_finite(value, "DOUB")?;
    let (arg, pow) = scientific(value);
    Ok(format!("  {:17.14}D{:+03}", arg, pow))
}

pub fn format_int(value: i32) -> String {
    format!(" {:11}", value)
}

pub fn format_bool(value: bool) -> String {
    format!("  {}", if value { 'T' } else { 'F' })
}

/// Quoted, blank padded string element.
pub fn format_string(value: &str, width: usize) -> Result<String> {
    let padded = encode_text(value, width)?;
    let (text, _, _) = WINDOWS_1252.decode(&padded);
    Ok(format!(" '{}'", text))
}

/// The header line of a formatted keyword.
pub fn format_header(name: &str, count: usize, tag: &str) -> String {
    format!(" '{:<8}' {:>11} '{:<4}'\n", name, count, tag)
}

pub fn parse_int(token: &str) -> Result<i32> {
    token
        .parse()
        .map_err(|_| EclError::InvalidFormat(format!("expected integer, found '{}'", token)))
}

pub fn parse_float(token: &str) -> Result<f32> {
    token
        .parse()
        .map_err(|_| EclError::InvalidFormat(format!("expected float, found '{}'", token)))
}

/// Parses a double, accepting the Fortran `D` exponent marker.
pub fn parse_double(token: &str) -> Result<f64> {
    token
        .replace(['D', 'd'], "E")
        .parse()
        .map_err(|_| EclError::InvalidFormat(format!("expected double, found '{}'", token)))
}

pub fn parse_bool(token: &str) -> Result<bool> {
    match token {
        "T" | "t" => Ok(true),
        "F" | "f" => Ok(false),
        other => Err(EclError::InvalidFormat(format!(
            "expected T or F, found '{}'",
            other
        ))),
    }
}

fn next_byte<R: Read + ?Sized>(reader: &mut R) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Consumes whitespace and returns the first other byte, or `None` at EOF.
pub fn skip_whitespace<R: Read + ?Sized>(reader: &mut R) -> Result<Option<u8>> {
    while let Some(byte) = next_byte(reader)? {
        if !byte.is_ascii_whitespace() {
            return Ok(Some(byte));
        }
    }
    Ok(None)
}

/// Reads the next whitespace delimited token. The delimiter is consumed.
pub fn read_token<R: Read + ?Sized>(reader: &mut R) -> Result<Option<String>> {
    let Some(first) = skip_whitespace(reader)? else {
        return Ok(None);
    };
    let mut token = vec![first];
    while let Some(byte) = next_byte(reader)? {
        if byte.is_ascii_whitespace() {
            break;
        }
        token.push(byte);
    }
    Ok(Some(String::from_utf8_lossy(&token).into_owned()))
}

/// Reads the next `'...'` quoted string. Returns the raw content between
/// the quotes, padding included, or `None` at EOF.
pub fn read_quoted<R: Read + ?Sized>(reader: &mut R) -> Result<Option<String>> {
    let Some(first) = skip_whitespace(reader)? else {
        return Ok(None);
    };
    if first != b'\'' {
        return Err(EclError::InvalidFormat(format!(
            "expected a quoted string, found '{}'",
            first as char
        )));
    }
    let mut content = Vec::new();
    loop {
        match next_byte(reader)? {
            Some(b'\'') => break,
            Some(byte) => content.push(byte),
            None => {
                return Err(EclError::InvalidFormat(
                    "unterminated quoted string".to_string(),
                ));
            }
        }
    }
    let (text, _, _) = WINDOWS_1252.decode(&content);
    Ok(Some(text.into_owned()))
}

/// Reads a token and fails on EOF.
pub fn expect_token<R: Read + ?Sized>(reader: &mut R, what: &str) -> Result<String> {
    read_token(reader)?
        .ok_or_else(|| EclError::InvalidFormat(format!("unexpected end of file reading {}", what)))
}
