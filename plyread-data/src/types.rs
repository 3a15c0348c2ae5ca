//! Core schema types for PLY data: scalar property types, storage categories
//! and body formats.
//!
//! Every declared scalar width collapses into one of three storage categories
//! at decode time. Pools and accessors only ever see the category.

use std::fmt;

/// Scalar type of a property, as declared in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Float32,
    Float64,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
}

impl PropertyType {
    /// Resolve a header type token (`float`, `uchar`, ...).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "float" => Some(Self::Float32),
            "double" => Some(Self::Float64),
            "int" => Some(Self::Int32),
            "int64" => Some(Self::Int64),
            "uchar" => Some(Self::UInt8),
            "uint16" => Some(Self::UInt16),
            "uint32" => Some(Self::UInt32),
            "uint64" => Some(Self::UInt64),
            _ => None,
        }
    }

    /// Resolve a list count token. Floating types are not valid counts.
    pub fn count_from_token(token: &str) -> Option<Self> {
        Self::from_token(token).filter(|ty| ty.category() != Category::Value)
    }

    /// The header token for this type.
    pub fn token(self) -> &'static str {
        match self {
            Self::Float32 => "float",
            Self::Float64 => "double",
            Self::Int32 => "int",
            Self::Int64 => "int64",
            Self::UInt8 => "uchar",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
        }
    }

    /// Storage category this type widens into.
    pub fn category(self) -> Category {
        match self {
            Self::Float32 | Self::Float64 => Category::Value,
            Self::Int32 | Self::Int64 => Category::Index,
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64 => Category::Byte,
        }
    }

    /// Encoded width in bytes for binary bodies.
    pub fn width(self) -> usize {
        match self {
            Self::UInt8 => 1,
            Self::UInt16 => 2,
            Self::Float32 | Self::Int32 | Self::UInt32 => 4,
            Self::Float64 | Self::Int64 | Self::UInt64 => 8,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Storage bucket for decoded scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Floating point, widened to `f64`.
    Value,
    /// Signed integer, widened to `i64`.
    Index,
    /// Unsigned integer, widened to `u64`.
    Byte,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Value => "value",
            Category::Index => "index",
            Category::Byte => "byte",
        })
    }
}

/// A decoded scalar, already widened to its category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Value(f64),
    Index(i64),
    Byte(u64),
}

impl Scalar {
    pub fn category(&self) -> Category {
        match self {
            Scalar::Value(_) => Category::Value,
            Scalar::Index(_) => Category::Index,
            Scalar::Byte(_) => Category::Byte,
        }
    }
}

/// Body encoding declared by the `format` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl Format {
    /// Match the exact `format` literal. Anything else is unsupported.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ascii" => Some(Self::Ascii),
            "binary_little_endian" => Some(Self::BinaryLittleEndian),
            "binary_big_endian" => Some(Self::BinaryBigEndian),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::BinaryLittleEndian => "binary_little_endian",
            Self::BinaryBigEndian => "binary_big_endian",
        }
    }

    pub fn is_binary(self) -> bool {
        !matches!(self, Self::Ascii)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
