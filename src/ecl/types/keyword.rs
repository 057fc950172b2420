//! The keyword: a named, typed array and the unit of data in the format.

use std::fmt;

use super::datatype::{DataType, NAME_LENGTH};
use super::error::{EclError, Result};
use crate::ecl::utils;

/// Decoded keyword header: name, element count and element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordHeader {
    /// Name with the trailing blank padding removed.
    pub name: String,
    pub count: usize,
    pub data_type: DataType,
}

impl KeywordHeader {
    pub fn new(name: impl Into<String>, count: usize, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            count,
            data_type,
        }
    }

    /// Name right padded with blanks to exactly eight characters.
    pub fn padded_name(&self) -> String {
        format!("{:<width$}", self.name, width = NAME_LENGTH)
    }

    /// Number of payload bytes in a binary file, excluding record framing.
    pub fn data_bytes(&self) -> u64 {
        (self.count * self.data_type.element_size()) as u64
    }

    /// Total bytes the keyword occupies in a binary file, framing included.
    pub fn binary_size(&self) -> u64 {
        let header = (super::datatype::HEADER_DATA_SIZE + 8) as u64;
        let element_size = self.data_type.element_size();
        if self.count == 0 || element_size == 0 {
            return header;
        }
        let blocks = self.data_type.num_blocks(self.count) as u64;
        header + blocks * 8 + self.data_bytes()
    }
}

impl fmt::Display for KeywordHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:<8} {:>10}:{}", self.name, self.count, self.data_type)
    }
}

/// Typed payload of a keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum KeywordData {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Bool(Vec<bool>),
    /// Eight character strings, stored without trailing blanks.
    Char(Vec<String>),
    /// Fixed width strings, stored without trailing blanks.
    String { width: usize, values: Vec<String> },
    /// Message keywords carry only a declared element count.
    Mess(usize),
}

impl KeywordData {
    pub fn data_type(&self) -> DataType {
        match self {
            KeywordData::Int(_) => DataType::Int,
            KeywordData::Float(_) => DataType::Float,
            KeywordData::Double(_) => DataType::Double,
            KeywordData::Bool(_) => DataType::Bool,
            KeywordData::Char(_) => DataType::Char,
            KeywordData::String { width, .. } => DataType::String(*width),
            KeywordData::Mess(_) => DataType::Mess,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            KeywordData::Int(v) => v.len(),
            KeywordData::Float(v) => v.len(),
            KeywordData::Double(v) => v.len(),
            KeywordData::Bool(v) => v.len(),
            KeywordData::Char(v) => v.len(),
            KeywordData::String { values, .. } => values.len(),
            KeywordData::Mess(count) => *count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named, typed array.
///
/// The keyword exclusively owns its payload; replacing the payload drops
/// the previous buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    name: String,
    data: KeywordData,
}

impl Keyword {
    /// Creates a keyword. The name is stored without trailing blanks.
    ///
    /// # Errors
    /// Returns `NameTooLong` if the name exceeds eight characters, and
    /// `ValueTooLong` if a string element does not fit its slot.
    pub fn new(name: &str, data: KeywordData) -> Result<Self> {
        let name = name.trim_end().to_string();
        if name.chars().count() > NAME_LENGTH {
            return Err(EclError::NameTooLong(name));
        }
        let width = match &data {
            KeywordData::Char(_) => Some(NAME_LENGTH),
            KeywordData::String { width, .. } => Some(*width),
            _ => None,
        };
        if let Some(width) = width {
            let values = match &data {
                KeywordData::Char(values) | KeywordData::String { values, .. } => values,
                _ => unreachable!(),
            };
            if let Some(value) = values.iter().find(|v| v.chars().count() > width) {
                return Err(EclError::ValueTooLong {
                    value: value.clone(),
                    width,
                });
            }
        }
        Ok(Self { name, data })
    }

    pub fn new_int(name: &str, values: Vec<i32>) -> Result<Self> {
        Self::new(name, KeywordData::Int(values))
    }

    pub fn new_float(name: &str, values: Vec<f32>) -> Result<Self> {
        Self::new(name, KeywordData::Float(values))
    }

    pub fn new_double(name: &str, values: Vec<f64>) -> Result<Self> {
        Self::new(name, KeywordData::Double(values))
    }

    pub fn new_bool(name: &str, values: Vec<bool>) -> Result<Self> {
        Self::new(name, KeywordData::Bool(values))
    }

    pub fn new_char<S: AsRef<str>>(name: &str, values: &[S]) -> Result<Self> {
        let values = values
            .iter()
            .map(|s| s.as_ref().trim_end().to_string())
            .collect();
        Self::new(name, KeywordData::Char(values))
    }

    pub fn new_string<S: AsRef<str>>(name: &str, width: usize, values: &[S]) -> Result<Self> {
        let values = values
            .iter()
            .map(|s| s.as_ref().trim_end().to_string())
            .collect();
        Self::new(name, KeywordData::String { width, values })
    }

    pub fn new_mess(name: &str) -> Result<Self> {
        Self::new(name, KeywordData::Mess(0))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &KeywordData {
        &self.data
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn header(&self) -> KeywordHeader {
        KeywordHeader::new(self.name.clone(), self.len(), self.data_type())
    }

    pub fn as_ints(&self) -> Option<&[i32]> {
        match &self.data {
            KeywordData::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match &self.data {
            KeywordData::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_doubles(&self) -> Option<&[f64]> {
        match &self.data {
            KeywordData::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bools(&self) -> Option<&[bool]> {
        match &self.data {
            KeywordData::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// String elements of `CHAR` and `C0nn` keywords.
    pub fn as_strings(&self) -> Option<&[String]> {
        match &self.data {
            KeywordData::Char(v) => Some(v),
            KeywordData::String { values, .. } => Some(values),
            _ => None,
        }
    }

    pub fn iget_int(&self, index: usize) -> Result<i32> {
        let values = self.as_ints().ok_or_else(|| self.type_mismatch("INTE"))?;
        self.checked(values, index).copied()
    }

    pub fn iget_float(&self, index: usize) -> Result<f32> {
        let values = self.as_floats().ok_or_else(|| self.type_mismatch("REAL"))?;
        self.checked(values, index).copied()
    }

    pub fn iget_double(&self, index: usize) -> Result<f64> {
        let values = self.as_doubles().ok_or_else(|| self.type_mismatch("DOUB"))?;
        self.checked(values, index).copied()
    }

    pub fn iget_bool(&self, index: usize) -> Result<bool> {
        let values = self.as_bools().ok_or_else(|| self.type_mismatch("LOGI"))?;
        self.checked(values, index).copied()
    }

    pub fn iget_char(&self, index: usize) -> Result<&str> {
        let values = self.as_strings().ok_or_else(|| self.type_mismatch("CHAR"))?;
        self.checked(values, index).map(String::as_str)
    }

    fn checked<'a, T>(&self, values: &'a [T], index: usize) -> Result<&'a T> {
        values.get(index).ok_or(EclError::IndexOutOfRange {
            index,
            len: values.len(),
        })
    }

    pub(crate) fn type_mismatch(&self, expected: &'static str) -> EclError {
        EclError::TypeMismatch {
            name: self.name.clone(),
            expected,
            actual: self.data_type().tag(),
        }
    }

    /// True if name, element count and type agree.
    pub fn header_eq(&self, other: &Keyword) -> bool {
        self.name == other.name
            && self.len() == other.len()
            && self.data_type() == other.data_type()
    }

    /// Exact payload comparison; headers are not considered.
    pub fn data_equal(&self, other: &Keyword) -> bool {
        self.data == other.data
    }

    /// Compares floating point payloads with combined absolute and
    /// relative tolerances; other types are compared exactly. Headers
    /// other than count and type are not considered.
    pub fn numeric_equal(&self, other: &Keyword, abs_eps: f64, rel_eps: f64) -> bool {
        if self.len() != other.len() || self.data_type() != other.data_type() {
            return false;
        }
        match (&self.data, &other.data) {
            (KeywordData::Float(a), KeywordData::Float(b)) => a
                .iter()
                .zip(b)
                .all(|(&x, &y)| utils::approx_equal(x as f64, y as f64, rel_eps, abs_eps)),
            (KeywordData::Double(a), KeywordData::Double(b)) => a
                .iter()
                .zip(b)
                .all(|(&x, &y)| utils::approx_equal(x, y, rel_eps, abs_eps)),
            _ => self.data_equal(other),
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.header())
    }
}
