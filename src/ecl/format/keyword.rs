//! Typed keyword codec for binary and formatted files.
//!
//! A binary keyword is one 16 byte header record (name, count, type tag)
//! followed by the payload split into records of at most
//! [`DataType::block_size`] elements. Formatted keywords use a quoted
//! header line followed by the values laid out in fixed columns.

use std::io::Write;

use byteorder::{ByteOrder, NativeEndian};
use log::{debug, trace};

use super::fortio::{Fortio, Stream};
use crate::ecl::codec::{endian, text};
use crate::ecl::types::datatype::{
    BOOL_FALSE_INT, BOOL_TRUE_INT, DataType, HEADER_DATA_SIZE, NAME_LENGTH, TYPE_TAG_LENGTH,
    type_table,
};
use crate::ecl::types::error::{EclError, Result};
use crate::ecl::types::keyword::{Keyword, KeywordData, KeywordHeader};

/// Reads the next keyword header; `Ok(None)` at end of file.
///
/// # Errors
/// Returns `InvalidHeader` if the header record has the wrong size or a
/// negative count, `UnknownType` for an unknown tag, and framing errors
/// from the transport.
pub fn read_header(fortio: &mut Fortio) -> Result<Option<KeywordHeader>> {
    if fortio.fmt_file() {
        read_header_formatted(fortio)
    } else {
        read_header_binary(fortio)
    }
}

fn read_header_binary(fortio: &mut Fortio) -> Result<Option<KeywordHeader>> {
    let offset = fortio.ftell()?;
    let Some(record) = fortio.read_record()? else {
        return Ok(None);
    };
    if record.len() != HEADER_DATA_SIZE {
        return Err(EclError::InvalidHeader {
            offset,
            reason: format!(
                "header record is {} bytes, expected {}",
                record.len(),
                HEADER_DATA_SIZE
            ),
        });
    }
    let name = text::decode_text(&record[..NAME_LENGTH]);
    let mut count = NativeEndian::read_i32(&record[NAME_LENGTH..NAME_LENGTH + 4]);
    if fortio.endian_flip() {
        count = count.swap_bytes();
    }
    let tag = String::from_utf8_lossy(&record[NAME_LENGTH + 4..]).into_owned();
    let header = make_header(name, count, &tag, offset)?;
    trace!("Read header {} at {}", header, offset);
    Ok(Some(header))
}

fn read_header_formatted(fortio: &mut Fortio) -> Result<Option<KeywordHeader>> {
    let offset = fortio.ftell()?;
    let stream = fortio.stream()?;
    let Some(name) = text::read_quoted(stream)? else {
        return Ok(None);
    };
    let count = text::parse_int(&text::expect_token(stream, "keyword count")?)?;
    let tag = text::read_quoted(stream)?.ok_or_else(|| EclError::InvalidHeader {
        offset,
        reason: "missing type tag".to_string(),
    })?;
    make_header(name.trim_end().to_string(), count, tag.trim_end(), offset).map(Some)
}

fn make_header(name: String, count: i32, tag: &str, offset: u64) -> Result<KeywordHeader> {
    if count < 0 {
        return Err(EclError::InvalidHeader {
            offset,
            reason: format!("negative element count {} for '{}'", count, name),
        });
    }
    let data_type = type_table().from_tag(tag)?;
    Ok(KeywordHeader::new(name, count as usize, data_type))
}

/// Reads the payload that follows `header`.
pub fn read_data(fortio: &mut Fortio, header: &KeywordHeader) -> Result<KeywordData> {
    if header.data_type == DataType::Mess {
        return Ok(KeywordData::Mess(header.count));
    }
    if fortio.fmt_file() {
        read_data_formatted(fortio, header)
    } else {
        read_data_binary(fortio, header)
    }
}

fn read_data_binary(fortio: &mut Fortio, header: &KeywordHeader) -> Result<KeywordData> {
    let data_type = header.data_type;
    let element_size = data_type.element_size();
    let block_size = data_type.block_size();
    let count = header.count;

    let mut raw = vec![0u8; count * element_size];
    for (block, chunk) in raw.chunks_mut(block_size * element_size).enumerate() {
        trace!("Reading block {} of {} ({} bytes)", block, header.name, chunk.len());
        fortio.read_record_into(chunk, "keyword data block")?;
    }

    if data_type.is_numeric() && fortio.endian_flip() {
        endian::flip_buffer(&mut raw, element_size, count);
    }

    Ok(match data_type {
        DataType::Int => {
            let mut values = vec![0i32; count];
            NativeEndian::read_i32_into(&raw, &mut values);
            KeywordData::Int(values)
        }
        DataType::Bool => {
            let mut values = vec![0i32; count];
            NativeEndian::read_i32_into(&raw, &mut values);
            KeywordData::Bool(values.into_iter().map(|v| v != BOOL_FALSE_INT).collect())
        }
        DataType::Float => {
            let mut values = vec![0f32; count];
            NativeEndian::read_f32_into(&raw, &mut values);
            KeywordData::Float(values)
        }
        DataType::Double => {
            let mut values = vec![0f64; count];
            NativeEndian::read_f64_into(&raw, &mut values);
            KeywordData::Double(values)
        }
        DataType::Char => KeywordData::Char(decode_strings(&raw, element_size)),
        DataType::String(width) => KeywordData::String {
            width,
            values: decode_strings(&raw, width),
        },
        DataType::Mess => KeywordData::Mess(count),
    })
}

fn decode_strings(raw: &[u8], width: usize) -> Vec<String> {
    raw.chunks_exact(width).map(text::decode_text).collect()
}

fn read_data_formatted(fortio: &mut Fortio, header: &KeywordHeader) -> Result<KeywordData> {
    let stream = fortio.stream()?;
    let count = header.count;
    let what = header.name.as_str();

    macro_rules! collect_tokens {
        ($parse:path) => {{
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push($parse(&text::expect_token(stream, what)?)?);
            }
            values
        }};
    }

    Ok(match header.data_type {
        DataType::Char => KeywordData::Char(read_quoted_values(stream, count, what)?),
        DataType::String(width) => KeywordData::String {
            width,
            values: read_quoted_values(stream, count, what)?,
        },
        DataType::Int => KeywordData::Int(collect_tokens!(text::parse_int)),
        DataType::Float => KeywordData::Float(collect_tokens!(text::parse_float)),
        DataType::Double => KeywordData::Double(collect_tokens!(text::parse_double)),
        DataType::Bool => KeywordData::Bool(collect_tokens!(text::parse_bool)),
        DataType::Mess => KeywordData::Mess(count),
    })
}

fn read_quoted_values(stream: &mut Stream, count: usize, what: &str) -> Result<Vec<String>> {
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let value = text::read_quoted(stream)?.ok_or_else(|| {
            EclError::InvalidFormat(format!("unexpected end of file reading {}", what))
        })?;
        values.push(value.trim_end().to_string());
    }
    Ok(values)
}

/// Skips the payload that follows `header` without decoding it.
pub fn skip_data(fortio: &mut Fortio, header: &KeywordHeader) -> Result<()> {
    let element_size = header.data_type.element_size();
    if header.count == 0 || element_size == 0 {
        return Ok(());
    }
    if fortio.fmt_file() {
        read_data_formatted(fortio, header).map(|_| ())
    } else {
        fortio.data_fskip(element_size, header.count, header.data_type.block_size())
    }
}

/// Reads one complete keyword; `Ok(None)` at end of file.
pub fn read_keyword(fortio: &mut Fortio) -> Result<Option<Keyword>> {
    let Some(header) = read_header(fortio)? else {
        return Ok(None);
    };
    let data = read_data(fortio, &header)?;
    Keyword::new(&header.name, data).map(Some)
}

/// Writes the header of `keyword`.
pub fn write_header(fortio: &mut Fortio, header: &KeywordHeader) -> Result<()> {
    let tag = header.data_type.tag();
    let count = i32::try_from(header.count).map_err(|_| EclError::SizeMismatch {
        context: "keyword element count",
        expected: i32::MAX as u64,
        found: header.count as u64,
    })?;
    if fortio.fmt_file() {
        assert_writable(fortio);
        let line = text::format_header(&header.name, header.count, &tag);
        fortio.stream()?.write_all(line.as_bytes())?;
        return Ok(());
    }
    let mut record = Vec::with_capacity(HEADER_DATA_SIZE);
    record.extend_from_slice(&text::encode_text(&header.name, NAME_LENGTH)?);
    let count = if fortio.endian_flip() { count.swap_bytes() } else { count };
    let mut count_bytes = [0u8; 4];
    NativeEndian::write_i32(&mut count_bytes, count);
    record.extend_from_slice(&count_bytes);
    record.extend_from_slice(&text::encode_text(&tag, TYPE_TAG_LENGTH)?);
    fortio.fwrite_record(&record)
}

/// Writes a complete keyword, header and payload.
pub fn write_keyword(fortio: &mut Fortio, keyword: &Keyword) -> Result<()> {
    let header = keyword.header();
    debug!("Writing keyword {}", header);
    write_header(fortio, &header)?;
    if matches!(keyword.data(), KeywordData::Mess(_)) || keyword.is_empty() {
        return Ok(());
    }
    if fortio.fmt_file() {
        write_data_formatted(fortio, keyword)
    } else {
        write_data_binary(fortio, keyword)
    }
}

fn encode_strings(values: &[String], width: usize) -> Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(values.len() * width);
    for value in values {
        raw.extend_from_slice(&text::encode_text(value, width)?);
    }
    Ok(raw)
}

fn write_data_binary(fortio: &mut Fortio, keyword: &Keyword) -> Result<()> {
    let data_type = keyword.data_type();
    let element_size = data_type.element_size();
    let count = keyword.len();

    let mut raw = vec![0u8; count * element_size];
    match keyword.data() {
        KeywordData::Int(values) => NativeEndian::write_i32_into(values, &mut raw),
        KeywordData::Bool(values) => {
            let ints: Vec<i32> = values
                .iter()
                .map(|&b| if b { BOOL_TRUE_INT } else { BOOL_FALSE_INT })
                .collect();
            NativeEndian::write_i32_into(&ints, &mut raw);
        }
        KeywordData::Float(values) => NativeEndian::write_f32_into(values, &mut raw),
        KeywordData::Double(values) => NativeEndian::write_f64_into(values, &mut raw),
        KeywordData::Char(values) => raw = encode_strings(values, NAME_LENGTH)?,
        KeywordData::String { width, values } => raw = encode_strings(values, *width)?,
        KeywordData::Mess(_) => return Ok(()),
    }

    if data_type.is_numeric() && fortio.endian_flip() {
        endian::flip_buffer(&mut raw, element_size, count);
    }

    for chunk in raw.chunks(data_type.block_size() * element_size) {
        fortio.fwrite_record(chunk)?;
    }
    Ok(())
}

fn write_data_formatted(fortio: &mut Fortio, keyword: &Keyword) -> Result<()> {
    let data_type = keyword.data_type();
    let columns = data_type.columns();
    let block_size = data_type.block_size();

    let items: Vec<String> = match keyword.data() {
        KeywordData::Int(values) => values.iter().map(|&v| text::format_int(v)).collect(),
        KeywordData::Float(values) => values
            .iter()
            .map(|&v| text::format_float(v))
            .collect::<Result<_>>()?,
        KeywordData::Double(values) => values
            .iter()
            .map(|&v| text::format_double(v))
            .collect::<Result<_>>()?,
        KeywordData::Bool(values) => values.iter().map(|&v| text::format_bool(v)).collect(),
        KeywordData::Char(values) => values
            .iter()
            .map(|v| text::format_string(v, NAME_LENGTH))
            .collect::<Result<_>>()?,
        KeywordData::String { width, values } => values
            .iter()
            .map(|v| text::format_string(v, *width))
            .collect::<Result<_>>()?,
        KeywordData::Mess(_) => return Ok(()),
    };

    let mut out = String::new();
    for block in items.chunks(block_size) {
        for (i, item) in block.iter().enumerate() {
            out.push_str(item);
            if (i + 1) % columns == 0 || i + 1 == block.len() {
                out.push('\n');
            }
        }
    }
    assert_writable(fortio);
    fortio.stream()?.write_all(out.as_bytes())?;
    Ok(())
}

fn assert_writable(fortio: &Fortio) {
    assert!(
        fortio.is_writable(),
        "keyword write on transport opened read-only: {}",
        fortio.path().display()
    );
}

/// Searches forward for a keyword called `name` and leaves the stream on
/// its header. With `rewind`, the search wraps around to the start of
/// the file once.
///
/// Returns `Ok(false)` and restores the starting position if not found.
pub fn fseek_keyword(fortio: &mut Fortio, name: &str, rewind: bool) -> Result<bool> {
    let start = fortio.ftell()?;
    if seek_forward(fortio, name, None)? {
        return Ok(true);
    }
    if rewind {
        fortio.rewind()?;
        if seek_forward(fortio, name, Some(start))? {
            return Ok(true);
        }
    }
    fortio.fseek(start)?;
    Ok(false)
}

fn seek_forward(fortio: &mut Fortio, name: &str, stop_at: Option<u64>) -> Result<bool> {
    loop {
        let pos = fortio.ftell()?;
        if stop_at.is_some_and(|stop| pos >= stop) {
            return Ok(false);
        }
        let Some(header) = read_header(fortio)? else {
            return Ok(false);
        };
        if header.name == name {
            fortio.fseek(pos)?;
            return Ok(true);
        }
        skip_data(fortio, &header)?;
    }
}
