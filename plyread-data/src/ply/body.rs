//! Body decoding for ASCII and binary PLY files.
//!
//! A [`ScalarSource`] turns the raw stream into widened scalars, one per
//! declared type. [`decode_body`] walks the header and feeds every decoded
//! scalar into the [`Store`].

use crate::error::{DecodeError, PlyError, Result};
use crate::ply::header::{Header, Property};
use crate::ply::store::{Cell, Store};
use crate::types::{Category, PropertyType, Scalar};
use byteorder::{ByteOrder, ReadBytesExt};
use std::io::{self, BufRead, Read};
use std::marker::PhantomData;
use tracing::debug;

/// Something that yields one widened scalar per call, in stream order.
pub trait ScalarSource {
    fn read_scalar(&mut self, ty: PropertyType) -> std::result::Result<Scalar, DecodeError>;
}

/// Whitespace separated tokens, possibly spanning several lines.
pub struct TextSource<R> {
    reader: R,
    line: String,
    pos: usize,
}

impl<R: BufRead> TextSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            pos: 0,
        }
    }

    fn next_token(&mut self) -> std::result::Result<Option<&str>, DecodeError> {
        loop {
            if let Some((start, end)) = token_span(&self.line, self.pos) {
                self.pos = end;
                return Ok(Some(&self.line[start..end]));
            }
            self.line.clear();
            self.pos = 0;
            let read = self.reader.read_line(&mut self.line).map_err(|err| {
                match err.kind() {
                    io::ErrorKind::InvalidData => DecodeError::InvalidText,
                    _ => DecodeError::from(err),
                }
            })?;
            if read == 0 {
                return Ok(None);
            }
        }
    }
}

fn token_span(line: &str, from: usize) -> Option<(usize, usize)> {
    let start = from + line[from..].find(|c: char| !c.is_whitespace())?;
    let end = line[start..]
        .find(char::is_whitespace)
        .map_or(line.len(), |len| start + len);
    Some((start, end))
}

impl<R: BufRead> ScalarSource for TextSource<R> {
    fn read_scalar(&mut self, ty: PropertyType) -> std::result::Result<Scalar, DecodeError> {
        let token = self.next_token()?.ok_or(DecodeError::UnexpectedEof)?;
        let malformed = || DecodeError::Malformed {
            token: token.to_string(),
            ty,
        };
        // Overflow parses to infinity; neither it nor a spelled-out inf/NaN is
        // a number in an ascii body.
        let scalar = match ty {
            PropertyType::Float32 => match token.parse::<f32>() {
                Ok(v) if v.is_finite() => Scalar::Value(f64::from(v)),
                _ => return Err(malformed()),
            },
            PropertyType::Float64 => match token.parse::<f64>() {
                Ok(v) if v.is_finite() => Scalar::Value(v),
                _ => return Err(malformed()),
            },
            PropertyType::Int32 => {
                Scalar::Index(i64::from(token.parse::<i32>().map_err(|_| malformed())?))
            }
            PropertyType::Int64 => Scalar::Index(token.parse::<i64>().map_err(|_| malformed())?),
            PropertyType::UInt8 => {
                Scalar::Byte(u64::from(token.parse::<u8>().map_err(|_| malformed())?))
            }
            PropertyType::UInt16 => {
                Scalar::Byte(u64::from(token.parse::<u16>().map_err(|_| malformed())?))
            }
            PropertyType::UInt32 => {
                Scalar::Byte(u64::from(token.parse::<u32>().map_err(|_| malformed())?))
            }
            PropertyType::UInt64 => Scalar::Byte(token.parse::<u64>().map_err(|_| malformed())?),
        };
        Ok(scalar)
    }
}

/// Fixed-width binary values in byte order `E`.
pub struct BinarySource<R, E> {
    reader: R,
    _order: PhantomData<E>,
}

impl<R: Read, E: ByteOrder> BinarySource<R, E> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            _order: PhantomData,
        }
    }
}

impl<R: Read, E: ByteOrder> ScalarSource for BinarySource<R, E> {
    fn read_scalar(&mut self, ty: PropertyType) -> std::result::Result<Scalar, DecodeError> {
        let r = &mut self.reader;
        let scalar = match ty {
            PropertyType::Float32 => Scalar::Value(f64::from(r.read_f32::<E>()?)),
            PropertyType::Float64 => Scalar::Value(r.read_f64::<E>()?),
            PropertyType::Int32 => Scalar::Index(i64::from(r.read_i32::<E>()?)),
            PropertyType::Int64 => Scalar::Index(r.read_i64::<E>()?),
            PropertyType::UInt8 => Scalar::Byte(u64::from(r.read_u8()?)),
            PropertyType::UInt16 => Scalar::Byte(u64::from(r.read_u16::<E>()?)),
            PropertyType::UInt32 => Scalar::Byte(u64::from(r.read_u32::<E>()?)),
            PropertyType::UInt64 => Scalar::Byte(r.read_u64::<E>()?),
        };
        Ok(scalar)
    }
}

/// Decode `declared_count` rows of every element, in header order.
pub fn decode_body<S: ScalarSource>(header: &Header, source: &mut S) -> Result<Store> {
    let mut store = Store::for_header(header);

    for (element_index, element) in header.elements().iter().enumerate() {
        let properties = element.properties();
        if properties.is_empty() {
            debug!("Element {} has no properties, nothing to decode", element.name());
            continue;
        }

        let plan: Vec<Step> = properties.iter().map(Step::for_property).collect();
        for row in 0..element.declared_count() {
            for (property, step) in properties.iter().zip(&plan) {
                let cell = decode_cell(*step, source, &mut store).map_err(|err| {
                    PlyError::Decode {
                        element: element.name().to_string(),
                        row,
                        property: property.name.clone(),
                        source: err,
                    }
                })?;
                store.record(element_index, cell);
            }
        }

        debug!(
            "Decoded element {}: {} rows x {} properties",
            element.name(),
            element.declared_count(),
            properties.len()
        );
    }

    Ok(store)
}

/// How one property is read, resolved once per element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Scalar(PropertyType),
    List {
        count: PropertyType,
        item: PropertyType,
        category: Category,
    },
}

impl Step {
    fn for_property(property: &Property) -> Self {
        match property.list_count_type {
            Some(count) => Step::List {
                count,
                item: property.element_type,
                category: property.category(),
            },
            None => Step::Scalar(property.element_type),
        }
    }
}

fn decode_cell<S: ScalarSource>(
    step: Step,
    source: &mut S,
    store: &mut Store,
) -> std::result::Result<Cell, DecodeError> {
    match step {
        Step::Scalar(ty) => Ok(store.push_scalar(source.read_scalar(ty)?)),
        Step::List {
            count,
            item,
            category,
        } => {
            let len = list_len(source.read_scalar(count)?, count)?;
            let mut list = store.open_list(category, len);
            for _ in 0..len {
                list.push(source.read_scalar(item)?);
            }
            Ok(list.close())
        }
    }
}

fn list_len(count: Scalar, ty: PropertyType) -> std::result::Result<usize, DecodeError> {
    match count {
        Scalar::Index(n) => usize::try_from(n).map_err(|_| DecodeError::NegativeListCount(n)),
        Scalar::Byte(n) => usize::try_from(n).map_err(|_| DecodeError::ListCountOverflow(n)),
        // Float count types are rejected by the header parser.
        Scalar::Value(v) => Err(DecodeError::Malformed {
            token: v.to_string(),
            ty,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
    use std::io::Cursor;

    fn text(body: &str) -> TextSource<Cursor<Vec<u8>>> {
        TextSource::new(Cursor::new(body.as_bytes().to_vec()))
    }

    #[test]
    fn test_text_tokens_span_lines() {
        let mut src = text("  1.5 -2\n\n\t7  \r\n  255");
        assert_eq!(src.read_scalar(PropertyType::Float32).unwrap(), Scalar::Value(1.5));
        assert_eq!(src.read_scalar(PropertyType::Int32).unwrap(), Scalar::Index(-2));
        assert_eq!(src.read_scalar(PropertyType::UInt16).unwrap(), Scalar::Byte(7));
        assert_eq!(src.read_scalar(PropertyType::UInt8).unwrap(), Scalar::Byte(255));
        assert!(matches!(
            src.read_scalar(PropertyType::UInt8),
            Err(DecodeError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_text_malformed_tokens() {
        let cases = [
            ("abc", PropertyType::Float32),
            ("1.0", PropertyType::Int32),
            ("256", PropertyType::UInt8),
            ("-1", PropertyType::UInt32),
            ("3000000000", PropertyType::Int32),
            ("1,5", PropertyType::Float64),
            ("1e39", PropertyType::Float32),
            ("1e400", PropertyType::Float64),
            ("-1e39", PropertyType::Float32),
            ("inf", PropertyType::Float32),
            ("-infinity", PropertyType::Float64),
            ("NaN", PropertyType::Float64),
        ];
        for (token, ty) in cases {
            let err = text(token).read_scalar(ty).unwrap_err();
            assert!(
                matches!(err, DecodeError::Malformed { ty: t, .. } if t == ty),
                "{token} as {ty}"
            );
        }
    }

    #[test]
    fn test_text_float_limits_still_accepted() {
        let mut src = text("3.4028235e38 1e-45 1.7976931348623157e308");
        assert_eq!(
            src.read_scalar(PropertyType::Float32).unwrap(),
            Scalar::Value(f64::from(f32::MAX))
        );
        assert!(matches!(
            src.read_scalar(PropertyType::Float32).unwrap(),
            Scalar::Value(v) if v > 0.0
        ));
        assert_eq!(src.read_scalar(PropertyType::Float64).unwrap(), Scalar::Value(f64::MAX));
    }

    #[test]
    fn test_binary_non_finite_floats_pass_through() {
        let mut bytes = Vec::new();
        bytes.write_f32::<LittleEndian>(f32::INFINITY).unwrap();
        bytes.write_f64::<LittleEndian>(f64::NAN).unwrap();
        let mut src = BinarySource::<_, LittleEndian>::new(Cursor::new(bytes));
        assert_eq!(
            src.read_scalar(PropertyType::Float32).unwrap(),
            Scalar::Value(f64::INFINITY)
        );
        assert!(matches!(
            src.read_scalar(PropertyType::Float64).unwrap(),
            Scalar::Value(v) if v.is_nan()
        ));
    }

    #[test]
    fn test_text_invalid_utf8_is_not_an_io_failure() {
        let mut src = TextSource::new(Cursor::new(vec![0xff, b' ', b'2', b'\n']));
        assert!(matches!(
            src.read_scalar(PropertyType::UInt8),
            Err(DecodeError::InvalidText)
        ));
    }

    #[test]
    fn test_step_resolved_from_property() {
        let scalar = Property::scalar("x", PropertyType::Float32);
        assert_eq!(Step::for_property(&scalar), Step::Scalar(PropertyType::Float32));

        let list = Property::list("vertex_indices", PropertyType::UInt8, PropertyType::Int32);
        assert_eq!(
            Step::for_property(&list),
            Step::List {
                count: PropertyType::UInt8,
                item: PropertyType::Int32,
                category: Category::Index,
            }
        );
    }

    #[test]
    fn test_decode_cell_follows_step() {
        let header = Header::parse(&mut Cursor::new(
            b"ply\nformat ascii 1.0\nelement face 1\nproperty list uchar int idx\nend_header\n".to_vec(),
        ))
        .unwrap();
        let mut store = Store::for_header(&header);
        let mut src = text("2 7 -8 9");
        let step = Step::List {
            count: PropertyType::UInt8,
            item: PropertyType::Int32,
            category: Category::Index,
        };
        let cell = decode_cell(step, &mut src, &mut store).unwrap();
        assert_eq!(cell, Cell::IndexList(0));
        assert_eq!(store.index_list(0), Some(&[7i64, -8][..]));
        let cell = decode_cell(Step::Scalar(PropertyType::UInt8), &mut src, &mut store).unwrap();
        assert_eq!(store.byte(0), Some(9));
        assert_eq!(cell, Cell::Byte(0));
    }

    #[test]
    fn test_text_signed_and_exponent_forms() {
        let mut src = text("+3 -4 1e3 -2.5E-1");
        assert_eq!(src.read_scalar(PropertyType::Int64).unwrap(), Scalar::Index(3));
        assert_eq!(src.read_scalar(PropertyType::Int32).unwrap(), Scalar::Index(-4));
        assert_eq!(src.read_scalar(PropertyType::Float64).unwrap(), Scalar::Value(1000.0));
        assert_eq!(src.read_scalar(PropertyType::Float32).unwrap(), Scalar::Value(-0.25));
    }

    #[test]
    fn test_binary_endianness() {
        let mut le = Vec::new();
        le.write_u16::<LittleEndian>(0x1234).unwrap();
        le.write_i32::<LittleEndian>(-7).unwrap();
        le.write_f64::<LittleEndian>(0.5).unwrap();
        le.write_u8(200).unwrap();

        let mut be = Vec::new();
        be.write_u16::<BigEndian>(0x1234).unwrap();
        be.write_i32::<BigEndian>(-7).unwrap();
        be.write_f64::<BigEndian>(0.5).unwrap();
        be.write_u8(200).unwrap();

        let types = [
            PropertyType::UInt16,
            PropertyType::Int32,
            PropertyType::Float64,
            PropertyType::UInt8,
        ];
        let mut from_le = BinarySource::<_, LittleEndian>::new(Cursor::new(le));
        let mut from_be = BinarySource::<_, BigEndian>::new(Cursor::new(be));
        for ty in types {
            assert_eq!(
                from_le.read_scalar(ty).unwrap(),
                from_be.read_scalar(ty).unwrap()
            );
        }
    }

    #[test]
    fn test_swap_then_inverse_is_identity() {
        let raw: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];
        let as_be = BigEndian::read_u64(&raw);
        let mut back = [0u8; 8];
        BigEndian::write_u64(&mut back, as_be);
        assert_eq!(raw, back);

        let swapped = LittleEndian::read_u64(&raw);
        assert_eq!(swapped.swap_bytes(), as_be);
    }

    #[test]
    fn test_binary_short_read_is_eof() {
        let mut src = BinarySource::<_, LittleEndian>::new(Cursor::new(vec![0u8; 3]));
        assert!(matches!(
            src.read_scalar(PropertyType::Float32),
            Err(DecodeError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_list_len() {
        assert_eq!(list_len(Scalar::Index(3), PropertyType::Int32).unwrap(), 3);
        assert!(matches!(
            list_len(Scalar::Index(-1), PropertyType::Int32),
            Err(DecodeError::NegativeListCount(-1))
        ));
        assert_eq!(list_len(Scalar::Byte(0), PropertyType::UInt8).unwrap(), 0);
    }
}
