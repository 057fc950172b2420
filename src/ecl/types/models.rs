//! Open flags, file kinds and small value types shared across the crate.

use std::ops::{BitOr, BitOrAssign};
use std::path::Path;

/// True when binary files must be byte swapped on this host. Producers
/// write big endian, so every little endian host flips.
pub const ECL_ENDIAN_FLIP: bool = cfg!(target_endian = "little");

/// Behavior flags fixed when a container is opened.
///
/// * `CLOSE_STREAM` - release the OS file handle between accesses.
/// * `WRITABLE` - allow `save_kw` to write keywords back to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct OpenFlags(u32);

impl OpenFlags {
    pub const DEFAULT: OpenFlags = OpenFlags(0);
    pub const CLOSE_STREAM: OpenFlags = OpenFlags(1);
    pub const WRITABLE: OpenFlags = OpenFlags(2);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: OpenFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: OpenFlags) {
        self.0 |= rhs.0;
    }
}

/// Kind of file, as derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Grid,
    EGrid,
    Init,
    Restart,
    UnifiedRestart,
    Summary,
    UnifiedSummary,
    SummarySpec,
    Data,
    Other,
}

/// Result of classifying a path by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileKind {
    pub file_type: FileType,
    /// True for the ASCII (formatted) variant.
    pub fmt_file: bool,
    /// Report step for non-unified restart and summary files.
    pub report_step: Option<u32>,
}

impl FileKind {
    /// Classifies a file by extension, e.g. `CASE.EGRID`, `CASE.FUNRST`,
    /// `CASE.X0012`. Matching is case insensitive.
    pub fn from_path(path: impl AsRef<Path>) -> FileKind {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_uppercase())
            .unwrap_or_default();
        Self::from_extension(&ext)
    }

    fn from_extension(ext: &str) -> FileKind {
        let kind = |file_type, fmt_file| FileKind {
            file_type,
            fmt_file,
            report_step: None,
        };
        match ext {
            "GRID" => kind(FileType::Grid, false),
            "FGRID" => kind(FileType::Grid, true),
            "EGRID" => kind(FileType::EGrid, false),
            "FEGRID" => kind(FileType::EGrid, true),
            "INIT" => kind(FileType::Init, false),
            "FINIT" => kind(FileType::Init, true),
            "UNRST" => kind(FileType::UnifiedRestart, false),
            "FUNRST" => kind(FileType::UnifiedRestart, true),
            "UNSMRY" => kind(FileType::UnifiedSummary, false),
            "FUNSMRY" => kind(FileType::UnifiedSummary, true),
            "SMSPEC" => kind(FileType::SummarySpec, false),
            "FSMSPEC" => kind(FileType::SummarySpec, true),
            "DATA" => kind(FileType::Data, false),
            _ => Self::numbered(ext).unwrap_or(kind(FileType::Other, false)),
        }
    }

    /// `Xnnnn`/`Fnnnn` restart and `Snnnn`/`Annnn` summary extensions.
    fn numbered(ext: &str) -> Option<FileKind> {
        if ext.len() != 5 {
            return None;
        }
        let (prefix, digits) = ext.split_at(1);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let report_step = digits.parse().ok();
        let (file_type, fmt_file) = match prefix {
            "X" => (FileType::Restart, false),
            "F" => (FileType::Restart, true),
            "S" => (FileType::Summary, false),
            "A" => (FileType::Summary, true),
            _ => return None,
        };
        Some(FileKind {
            file_type,
            fmt_file,
            report_step,
        })
    }
}
