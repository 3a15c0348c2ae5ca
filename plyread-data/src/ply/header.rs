//! PLY header parsing.
//!
//! The header is line oriented text terminated by `end_header`. It yields
//! the schema the body decoder walks: elements in declaration order, each
//! with its properties in declaration order.

use crate::error::{PlyError, Result};
use crate::types::{Category, Format, PropertyType};
use std::collections::HashMap;
use std::io::{BufRead, Read};
use tracing::{debug, trace, warn};

/// Longest header line accepted, newline included. Input without a newline
/// in the first this-many bytes is not read any further.
pub const MAX_HEADER_LINE: u64 = 16 * 1024;

/// A named field of an element, scalar or list valued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    /// Type of the scalar, or of each list item.
    pub element_type: PropertyType,
    /// Type of the per-row count prefix. `None` for scalar properties.
    pub list_count_type: Option<PropertyType>,
}

impl Property {
    pub fn scalar(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            element_type: ty,
            list_count_type: None,
        }
    }

    pub fn list(name: impl Into<String>, count: PropertyType, item: PropertyType) -> Self {
        Self {
            name: name.into(),
            element_type: item,
            list_count_type: Some(count),
        }
    }

    pub fn is_list(&self) -> bool {
        self.list_count_type.is_some()
    }

    pub fn category(&self) -> Category {
        self.element_type.category()
    }
}

/// A named, counted record type (`vertex`, `face`, ...).
#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    declared_count: usize,
    properties: Vec<Property>,
    property_index: HashMap<String, usize>,
}

impl Element {
    fn new(name: String, declared_count: usize) -> Self {
        Self {
            name,
            declared_count,
            properties: Vec::new(),
            property_index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Row count claimed by the header.
    pub fn declared_count(&self) -> usize {
        self.declared_count
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }

    pub fn find_property(&self, name: &str) -> Option<usize> {
        self.property_index.get(name).copied()
    }

    fn push_property(&mut self, property: Property) -> std::result::Result<(), String> {
        if self.property_index.contains_key(&property.name) {
            return Err(format!(
                "duplicate property {:?} in element {:?}",
                property.name, self.name
            ));
        }
        self.property_index
            .insert(property.name.clone(), self.properties.len());
        self.properties.push(property);
        Ok(())
    }
}

/// Parsed PLY header.
#[derive(Debug, Clone)]
pub struct Header {
    format: Format,
    version: Option<String>,
    comments: Vec<String>,
    elements: Vec<Element>,
    element_index: HashMap<String, usize>,
}

impl Header {
    /// Parse a header from a reader positioned at the start of the file.
    ///
    /// On success the reader is left at the first byte of the body.
    pub fn parse<R: BufRead>(reader: &mut R) -> Result<Self> {
        let mut lines = HeaderLines::new(reader);

        let magic = loop {
            match lines.next_line() {
                Ok(None) | Err(PlyError::HeaderSyntax { .. }) => return Err(PlyError::NotPly),
                Ok(Some(line)) if line.is_empty() => continue,
                Ok(Some(line)) => break line,
                Err(e) => return Err(e),
            }
        };
        let mut tokens = magic.split_whitespace();
        if tokens.next() != Some("ply") {
            warn!("Missing 'ply' magic token");
            return Err(PlyError::NotPly);
        }
        if tokens.next().is_some() {
            return Err(PlyError::header(lines.line_no, "unexpected content after 'ply'"));
        }

        let mut builder = HeaderBuilder::default();
        loop {
            let Some(line) = lines.next_line()? else {
                return Err(PlyError::header(lines.line_no, "missing end_header"));
            };
            if line == "end_header" {
                break;
            }
            builder.apply(&line).map_err(|msg| PlyError::header(lines.line_no, msg))?;
        }

        let header = builder.finish(lines.line_no)?;
        debug!(
            "PLY header: format={}, {} elements, {} comments",
            header.format,
            header.elements.len(),
            header.comments.len()
        );
        Ok(header)
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Version token following the format name, kept verbatim.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    pub fn find_element(&self, name: &str) -> Option<usize> {
        self.element_index.get(name).copied()
    }
}

/// Reads header lines as lossy UTF-8 with line endings and surrounding
/// whitespace removed.
struct HeaderLines<'a, R> {
    reader: &'a mut R,
    buf: Vec<u8>,
    line_no: usize,
}

impl<'a, R: BufRead> HeaderLines<'a, R> {
    fn new(reader: &'a mut R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_no: 0,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        let read = (&mut *self.reader)
            .take(MAX_HEADER_LINE)
            .read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        if !self.buf.ends_with(b"\n") && read as u64 == MAX_HEADER_LINE {
            return Err(PlyError::header(
                self.line_no,
                format!("line longer than {MAX_HEADER_LINE} bytes"),
            ));
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).trim().to_string()))
    }
}

#[derive(Default)]
struct HeaderBuilder {
    format: Option<String>,
    version: Option<String>,
    comments: Vec<String>,
    elements: Vec<Element>,
    element_index: HashMap<String, usize>,
}

impl HeaderBuilder {
    fn apply(&mut self, line: &str) -> std::result::Result<(), String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&directive) = tokens.first() else {
            return Ok(());
        };

        match directive {
            "comment" => {
                let text = line["comment".len()..].trim().to_string();
                trace!("PLY comment: {}", text);
                self.comments.push(text);
            }
            "format" => match tokens.as_slice() {
                [_, name] | [_, name, _] => {
                    self.format = Some(name.to_string());
                    self.version = tokens.get(2).map(|v| v.to_string());
                }
                _ => return Err(format!("malformed format line {line:?}")),
            },
            "element" => {
                let [_, name, count] = tokens.as_slice() else {
                    return Err(format!("malformed element line {line:?}"));
                };
                let count: usize = count
                    .parse()
                    .map_err(|_| format!("invalid count {count:?} for element {name:?}"))?;
                if self.element_index.contains_key(*name) {
                    return Err(format!("duplicate element {name:?}"));
                }
                debug!("PLY element {} ({} rows)", name, count);
                self.element_index
                    .insert(name.to_string(), self.elements.len());
                self.elements.push(Element::new(name.to_string(), count));
            }
            "property" => {
                let property = parse_property(&tokens)?;
                let element = self
                    .elements
                    .last_mut()
                    .ok_or_else(|| format!("property {:?} declared before any element", property.name))?;
                element.push_property(property)?;
            }
            other => return Err(format!("unrecognized directive {other:?}")),
        }
        Ok(())
    }

    fn finish(self, line_no: usize) -> Result<Header> {
        let Some(name) = self.format else {
            return Err(PlyError::header(line_no, "missing format directive"));
        };
        let format = Format::from_token(&name).ok_or_else(|| {
            warn!("Unsupported PLY format {:?}", name);
            PlyError::UnsupportedFormat(name.clone())
        })?;

        Ok(Header {
            format,
            version: self.version,
            comments: self.comments,
            elements: self.elements,
            element_index: self.element_index,
        })
    }
}

fn parse_property(tokens: &[&str]) -> std::result::Result<Property, String> {
    match tokens {
        [_, "list", count, item, name] => {
            let count_ty = PropertyType::count_from_token(count)
                .ok_or_else(|| format!("invalid list count type {count:?}"))?;
            let item_ty = PropertyType::from_token(item)
                .ok_or_else(|| format!("unknown property type {item:?}"))?;
            Ok(Property::list(*name, count_ty, item_ty))
        }
        [_, "list", ..] => Err("malformed list property".to_string()),
        [_, ty, name] => {
            let ty = PropertyType::from_token(ty)
                .ok_or_else(|| format!("unknown property type {ty:?}"))?;
            Ok(Property::scalar(*name, ty))
        }
        _ => Err("malformed property line".to_string()),
    }
}
