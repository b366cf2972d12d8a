//! Read-only access to the named parts of an OOXML spreadsheet package.
//!
//! Only the parts the selector asks for are decompressed. Embedded media is
//! never read, and every part read is capped at a configured size.

use std::io::{Cursor, Read};

use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

const WORKSHEET_PREFIX: &str = "xl/worksheets/sheet";
const WORKSHEET_RELS_PREFIX: &str = "xl/worksheets/_rels/sheet";
const DRAWING_RELS_PREFIX: &str = "xl/drawings/_rels/drawing";

/// Path of the workbook-wide shared string table
pub const SHARED_STRINGS: &str = "xl/sharedStrings.xml";

/// Errors raised while reading the package.
///
/// These never leave the selection module; the selector turns them into
/// "no signal" for the part concerned.
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("input is not a readable zip package")]
    Open(#[source] ZipError),

    #[error("part not found: {name}")]
    MissingPart { name: String },

    #[error("part {name} is larger than {max} bytes")]
    PartTooLarge { name: String, max: u64 },

    #[error("failed to decompress part {name}")]
    Zip {
        name: String,
        #[source]
        source: ZipError,
    },

    #[error("failed to read part {name}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// What a part path means to the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    /// `xl/worksheets/sheet<N>.xml`
    Worksheet(u32),
    /// `xl/worksheets/_rels/sheet<N>.xml.rels`
    WorksheetRels(u32),
    /// `xl/drawings/_rels/drawing<M>.xml.rels`
    DrawingRels(u32),
    SharedStrings,
    Other,
}

/// Classify a part by its path inside the package.
pub fn classify(name: &str) -> PartKind {
    if name == SHARED_STRINGS {
        return PartKind::SharedStrings;
    }
    if let Some(n) = ordinal_between(name, WORKSHEET_RELS_PREFIX, ".xml.rels") {
        return PartKind::WorksheetRels(n);
    }
    if let Some(n) = ordinal_between(name, DRAWING_RELS_PREFIX, ".xml.rels") {
        return PartKind::DrawingRels(n);
    }
    if let Some(n) = ordinal_between(name, WORKSHEET_PREFIX, ".xml") {
        return PartKind::Worksheet(n);
    }
    PartKind::Other
}

/// Extract the 1-based ordinal embedded between `prefix` and `suffix`.
///
/// Zero-padded numbers are rejected so that each ordinal names one part.
pub(crate) fn ordinal_between(name: &str, prefix: &str, suffix: &str) -> Option<u32> {
    let digits = name.strip_prefix(prefix)?.strip_suffix(suffix)?;
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}

/// An opened spreadsheet package backed by an in-memory buffer.
pub struct Package<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    max_part_bytes: u64,
}

impl<'a> Package<'a> {
    /// Open `bytes` as a zip package. Fails only if the central directory
    /// cannot be read at all.
    pub fn open(bytes: &'a [u8], max_part_bytes: u64) -> Result<Self, PackageError> {
        let archive = ZipArchive::new(Cursor::new(bytes)).map_err(PackageError::Open)?;
        Ok(Self {
            archive,
            max_part_bytes,
        })
    }

    /// Names of every part in the package, in central directory order.
    pub fn part_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// Read a part's raw bytes, refusing parts over the size cap.
    pub fn read_bytes(&mut self, name: &str) -> Result<Vec<u8>, PackageError> {
        let max = self.max_part_bytes;
        let file = self.archive.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => PackageError::MissingPart {
                name: name.to_string(),
            },
            other => PackageError::Zip {
                name: name.to_string(),
                source: other,
            },
        })?;

        if file.size() > max {
            return Err(PackageError::PartTooLarge {
                name: name.to_string(),
                max,
            });
        }

        // The declared size can lie, so the read itself is bounded too
        let mut content = Vec::with_capacity(file.size() as usize);
        file.take(max + 1)
            .read_to_end(&mut content)
            .map_err(|source| PackageError::Read {
                name: name.to_string(),
                source,
            })?;

        if content.len() as u64 > max {
            return Err(PackageError::PartTooLarge {
                name: name.to_string(),
                max,
            });
        }

        Ok(content)
    }
}
