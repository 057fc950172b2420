//! Element types of keyword payloads and the shared type table.
//!
//! Every codec path (binary reader, binary writer, formatted reader and
//! writer, the index scanner and the grid dimension sniffer) resolves type
//! tags and element sizes through the one [`TypeTable`] returned by
//! [`type_table()`].

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use super::error::{EclError, Result};

/// Length of the blank-padded keyword name field.
pub const NAME_LENGTH: usize = 8;

/// Length of the type tag field in a keyword header.
pub const TYPE_TAG_LENGTH: usize = 4;

/// Byte size of a binary keyword header record payload (name + count + tag).
pub const HEADER_DATA_SIZE: usize = NAME_LENGTH + 4 + TYPE_TAG_LENGTH;

/// Numeric payloads are written in records of at most this many elements.
pub const BLOCKSIZE_NUMERIC: usize = 1000;

/// Character payloads are written in records of at most this many elements.
pub const BLOCKSIZE_CHAR: usize = 105;

/// Integer representation of a true logical value in binary files.
pub const BOOL_TRUE_INT: i32 = -1;

/// Integer representation of a false logical value in binary files.
pub const BOOL_FALSE_INT: i32 = 0;

/// Element type of a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Fixed eight character strings (`CHAR`).
    Char,
    /// 32 bit IEEE floats (`REAL`).
    Float,
    /// 64 bit IEEE floats (`DOUB`).
    Double,
    /// 32 bit signed integers (`INTE`).
    Int,
    /// Logicals stored as 32 bit integers (`LOGI`).
    Bool,
    /// Message keywords without payload (`MESS`).
    Mess,
    /// Fixed width strings of the given length (`C0nn`).
    String(usize),
}

/// Static description of one element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub data_type: DataType,
    /// Bytes per element in the file.
    pub element_size: usize,
    /// Bytes per element in a NUL terminated in-memory layout.
    pub ctype_size: usize,
    /// Maximum number of elements per physical record.
    pub block_size: usize,
    /// Number of elements per line in formatted files.
    pub columns: usize,
}

/// Lookup table from type tags to element sizes, built once per process.
#[derive(Debug)]
pub struct TypeTable {
    fixed: HashMap<&'static str, TypeInfo>,
}

static TYPE_TABLE: OnceLock<TypeTable> = OnceLock::new();

/// Returns the process wide type table.
pub fn type_table() -> &'static TypeTable {
    TYPE_TABLE.get_or_init(TypeTable::new)
}

impl TypeTable {
    fn new() -> Self {
        let entries = [
            ("CHAR", DataType::Char, 8, 9, BLOCKSIZE_CHAR, 7),
            ("REAL", DataType::Float, 4, 4, BLOCKSIZE_NUMERIC, 4),
            ("DOUB", DataType::Double, 8, 8, BLOCKSIZE_NUMERIC, 3),
            ("INTE", DataType::Int, 4, 4, BLOCKSIZE_NUMERIC, 6),
            ("LOGI", DataType::Bool, 4, 4, BLOCKSIZE_NUMERIC, 25),
            ("MESS", DataType::Mess, 0, 0, BLOCKSIZE_CHAR, 1),
        ];
        let fixed = entries
            .into_iter()
            .map(|(tag, data_type, element_size, ctype_size, block_size, columns)| {
                (
                    tag,
                    TypeInfo {
                        data_type,
                        element_size,
                        ctype_size,
                        block_size,
                        columns,
                    },
                )
            })
            .collect();
        Self { fixed }
    }

    /// Resolves a four character type tag, e.g. `INTE` or `C010`.
    pub fn from_tag(&self, tag: &str) -> Result<DataType> {
        if let Some(info) = self.fixed.get(tag) {
            return Ok(info.data_type);
        }
        if tag.len() == TYPE_TAG_LENGTH
            && let Some(digits) = tag.strip_prefix('C')
            && digits.bytes().all(|b| b.is_ascii_digit())
            && let Ok(width) = digits.parse::<usize>()
            && width > 0
        {
            return Ok(DataType::String(width));
        }
        Err(EclError::UnknownType(tag.to_string()))
    }

    /// Static properties of a data type.
    pub fn info(&self, data_type: DataType) -> TypeInfo {
        match data_type {
            DataType::String(width) => TypeInfo {
                data_type,
                element_size: width,
                ctype_size: width + 1,
                block_size: BLOCKSIZE_CHAR,
                columns: 7,
            },
            fixed => *self
                .fixed
                .get(self.fixed_tag(fixed))
                .expect("every fixed data type has a table entry"),
        }
    }

    /// The four character tag written in keyword headers.
    pub fn tag(&self, data_type: DataType) -> String {
        match data_type {
            DataType::String(width) => format!("C{:03}", width),
            fixed => self.fixed_tag(fixed).to_string(),
        }
    }

    fn fixed_tag(&self, data_type: DataType) -> &'static str {
        match data_type {
            DataType::Char => "CHAR",
            DataType::Float => "REAL",
            DataType::Double => "DOUB",
            DataType::Int => "INTE",
            DataType::Bool => "LOGI",
            DataType::Mess => "MESS",
            DataType::String(_) => unreachable!("string types are not in the fixed table"),
        }
    }
}

impl DataType {
    /// Bytes per element in the file.
    pub fn element_size(&self) -> usize {
        type_table().info(*self).element_size
    }

    /// Maximum number of elements per physical record.
    pub fn block_size(&self) -> usize {
        type_table().info(*self).block_size
    }

    /// Number of elements per line in formatted files.
    pub fn columns(&self) -> usize {
        type_table().info(*self).columns
    }

    /// The four character header tag.
    pub fn tag(&self) -> String {
        type_table().tag(*self)
    }

    /// True for types with a fixed-size numeric representation.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Float | DataType::Double | DataType::Int | DataType::Bool
        )
    }

    /// Number of physical records needed for `count` elements.
    pub fn num_blocks(&self, count: usize) -> usize {
        count.div_ceil(self.block_size())
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}
