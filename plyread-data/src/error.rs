//! Error types for PLY parsing and access.

use crate::ply::store::Cell;
use crate::types::PropertyType;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading a PLY file or querying its data.
#[derive(Debug, Error)]
pub enum PlyError {
    #[error("IO error on {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File format not recognized as PLY")]
    NotPly,

    #[error("Header line {line}: {message}")]
    HeaderSyntax { line: usize, message: String },

    #[error("Unsupported PLY format: {0:?}")]
    UnsupportedFormat(String),

    #[error("Failed to decode {element}[{row}].{property}: {source}")]
    Decode {
        element: String,
        row: usize,
        property: String,
        #[source]
        source: DecodeError,
    },

    #[error("Missing element {0:?}")]
    MissingElement(String),

    #[error("Missing property {property:?} in element {element:?}")]
    MissingProperty { element: String, property: String },

    #[error("Face {face} references invalid vertex index {index}")]
    InvalidFaceIndex { face: usize, index: i128 },

    #[error("Element index {index} out of range ({count} elements)")]
    ElementOutOfRange { index: usize, count: usize },

    #[error("Row {row} out of range for element {element:?} ({count} rows)")]
    RowOutOfRange {
        element: String,
        row: usize,
        count: usize,
    },

    #[error("Property index {index} out of range for element {element:?} ({count} properties)")]
    PropertyOutOfRange {
        element: String,
        index: usize,
        count: usize,
    },

    #[error("Requested {requested} but {element}.{property} holds {recorded}")]
    CategoryMismatch {
        element: String,
        property: String,
        requested: &'static str,
        recorded: &'static str,
    },

    #[error("Cell {cell} of {element}.{property} points past the end of its pool")]
    MissingSlot {
        element: String,
        property: String,
        cell: Cell,
    },
}

/// Reasons a single body value failed to decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of body")]
    UnexpectedEof,

    #[error("token {token:?} is not a valid {ty}")]
    Malformed { token: String, ty: PropertyType },

    #[error("body text is not valid UTF-8")]
    InvalidText,

    #[error("negative list count {0}")]
    NegativeListCount(i64),

    #[error("list count {0} does not fit in memory")]
    ListCountOverflow(u64),

    #[error("read failed: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            DecodeError::UnexpectedEof
        } else {
            DecodeError::Io(err)
        }
    }
}

impl PlyError {
    pub(crate) fn header(line: usize, message: impl Into<String>) -> Self {
        PlyError::HeaderSyntax {
            line,
            message: message.into(),
        }
    }

    /// True for contract violations raised by the accessors, as opposed to
    /// failures while reading the file.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            PlyError::ElementOutOfRange { .. }
                | PlyError::RowOutOfRange { .. }
                | PlyError::PropertyOutOfRange { .. }
                | PlyError::CategoryMismatch { .. }
        )
    }
}

/// A convenience `Result` alias using [`PlyError`].
pub type Result<T> = std::result::Result<T, PlyError>;
