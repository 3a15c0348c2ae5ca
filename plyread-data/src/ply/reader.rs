//! Read-only access to a fully decoded PLY file.

use crate::error::{DecodeError, PlyError, Result};
use crate::ply::body::{BinarySource, TextSource, decode_body};
use crate::ply::header::{Element, Header};
use crate::ply::store::{Cell, Store};
use crate::types::Format;
use byteorder::{BigEndian, LittleEndian};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// A PLY file decoded into memory.
///
/// Built in a single pass by [`PlyReader::open`] or
/// [`PlyReader::from_reader`]; immutable afterwards. Cells are addressed by
/// 0-based (element, row, property) indices in declaration order.
#[derive(Debug)]
pub struct PlyReader {
    header: Header,
    store: Store,
}

impl PlyReader {
    /// Open and decode the PLY file at `path`.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| {
            warn!("Failed to open PLY file: {}", source);
            PlyError::File {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let reader =
            Self::from_reader(BufReader::new(file)).map_err(|e| attach_path(e, path))?;

        info!(
            "PLY file parsed: format={}, {} elements, {} scalars, {} lists",
            reader.header.format(),
            reader.header.elements().len(),
            reader.store.scalar_count(),
            reader.store.list_count()
        );
        Ok(reader)
    }

    /// Decode a PLY file from an already open source.
    pub fn from_reader<R: BufRead>(mut reader: R) -> Result<Self> {
        let header = Header::parse(&mut reader)?;
        let store = match header.format() {
            Format::Ascii => decode_body(&header, &mut TextSource::new(reader)),
            Format::BinaryLittleEndian => {
                decode_body(&header, &mut BinarySource::<_, LittleEndian>::new(reader))
            }
            Format::BinaryBigEndian => {
                decode_body(&header, &mut BinarySource::<_, BigEndian>::new(reader))
            }
        }
        .inspect_err(|e| warn!("Failed to decode PLY body: {}", e))?;

        Ok(Self { header, store })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn format(&self) -> Format {
        self.header.format()
    }

    pub fn elements(&self) -> &[Element] {
        self.header.elements()
    }

    /// Index of the element called `name`, or `None` if the header has none.
    pub fn find_element(&self, name: &str) -> Option<usize> {
        self.header.find_element(name)
    }

    /// Declared row count of an element.
    pub fn element_size(&self, element: usize) -> Result<usize> {
        Ok(self.element(element)?.declared_count())
    }

    /// Index of property `name` within an element, or `None` if absent.
    pub fn find_property(&self, element: usize, name: &str) -> Result<Option<usize>> {
        Ok(self.element(element)?.find_property(name))
    }

    /// Where the value for (element, row, property) lives.
    pub fn cell(&self, element: usize, row: usize, property: usize) -> Result<Cell> {
        let el = self.element(element)?;
        if row >= el.declared_count() {
            return Err(PlyError::RowOutOfRange {
                element: el.name().to_string(),
                row,
                count: el.declared_count(),
            });
        }
        if property >= el.properties().len() {
            return Err(PlyError::PropertyOutOfRange {
                element: el.name().to_string(),
                index: property,
                count: el.properties().len(),
            });
        }
        self.store
            .cell(element, row, property)
            .ok_or_else(|| PlyError::RowOutOfRange {
                element: el.name().to_string(),
                row,
                count: el.declared_count(),
            })
    }

    pub fn get_value(&self, element: usize, row: usize, property: usize) -> Result<f64> {
        match self.cell(element, row, property)? {
            cell @ Cell::Value(slot) => self
                .store
                .value(slot)
                .ok_or_else(|| self.dangling(element, property, cell)),
            other => Err(self.mismatch(element, property, "value", other)),
        }
    }

    pub fn get_value_list(&self, element: usize, row: usize, property: usize) -> Result<&[f64]> {
        match self.cell(element, row, property)? {
            cell @ Cell::ValueList(slot) => self
                .store
                .value_list(slot)
                .ok_or_else(|| self.dangling(element, property, cell)),
            other => Err(self.mismatch(element, property, "value list", other)),
        }
    }

    pub fn get_index(&self, element: usize, row: usize, property: usize) -> Result<i64> {
        match self.cell(element, row, property)? {
            cell @ Cell::Index(slot) => self
                .store
                .index(slot)
                .ok_or_else(|| self.dangling(element, property, cell)),
            other => Err(self.mismatch(element, property, "index", other)),
        }
    }

    pub fn get_index_list(&self, element: usize, row: usize, property: usize) -> Result<&[i64]> {
        match self.cell(element, row, property)? {
            cell @ Cell::IndexList(slot) => self
                .store
                .index_list(slot)
                .ok_or_else(|| self.dangling(element, property, cell)),
            other => Err(self.mismatch(element, property, "index list", other)),
        }
    }

    pub fn get_byte(&self, element: usize, row: usize, property: usize) -> Result<u64> {
        match self.cell(element, row, property)? {
            cell @ Cell::Byte(slot) => self
                .store
                .byte(slot)
                .ok_or_else(|| self.dangling(element, property, cell)),
            other => Err(self.mismatch(element, property, "byte", other)),
        }
    }

    pub fn get_byte_list(&self, element: usize, row: usize, property: usize) -> Result<&[u64]> {
        match self.cell(element, row, property)? {
            cell @ Cell::ByteList(slot) => self
                .store
                .byte_list(slot)
                .ok_or_else(|| self.dangling(element, property, cell)),
            other => Err(self.mismatch(element, property, "byte list", other)),
        }
    }

    fn element(&self, index: usize) -> Result<&Element> {
        self.header
            .element(index)
            .ok_or(PlyError::ElementOutOfRange {
                index,
                count: self.header.elements().len(),
            })
    }

    fn property_name(&self, element: usize, property: usize) -> (String, String) {
        let el = &self.header.elements()[element];
        (el.name().to_string(), el.properties()[property].name.clone())
    }

    fn mismatch(&self, element: usize, property: usize, requested: &'static str, recorded: Cell) -> PlyError {
        let (element, property) = self.property_name(element, property);
        PlyError::CategoryMismatch {
            element,
            property,
            requested,
            recorded: recorded.kind(),
        }
    }

    // Unreachable for a store filled by `decode_body`: every recorded cell
    // points at a slot pushed just before it.
    fn dangling(&self, element: usize, property: usize, cell: Cell) -> PlyError {
        let (element, property) = self.property_name(element, property);
        PlyError::MissingSlot {
            element,
            property,
            cell,
        }
    }
}

/// Tag I/O failures from [`PlyReader::from_reader`] with the file they came
/// from. Header and body read failures both become [`PlyError::File`].
fn attach_path(err: PlyError, path: &Path) -> PlyError {
    match err {
        PlyError::Io(source)
        | PlyError::Decode {
            source: DecodeError::Io(source),
            ..
        } => PlyError::File {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read(text: &str) -> Result<PlyReader> {
        PlyReader::from_reader(Cursor::new(text.as_bytes().to_vec()))
    }

    const CUBE_CORNER: &str = "ply
format ascii 1.0
comment one triangle
element vertex 3
property float x
property float y
property double z
property uchar red
element face 1
property list uchar int vertex_indices
property list uchar float weights
end_header
0 0 0 255
1 0 0 128
0 1 0.5 0
3 0 1 2 2 0.25 0.75
";

    #[test]
    fn test_minimal_vertex_file() {
        let ply = read("ply\nformat ascii 1.0\nelement vertex 2\nproperty float x\nproperty float y\nend_header\n1.0 2.0\n3.0 4.0\n")
            .unwrap();
        let vertex = ply.find_element("vertex").unwrap();
        assert_eq!(ply.element_size(vertex).unwrap(), 2);
        let x = ply.find_property(vertex, "x").unwrap().unwrap();
        let y = ply.find_property(vertex, "y").unwrap().unwrap();
        assert_eq!(ply.get_value(vertex, 0, x).unwrap(), 1.0);
        assert_eq!(ply.get_value(vertex, 1, y).unwrap(), 4.0);
    }

    #[test]
    fn test_ascii_multi_row_elements_bound_by_row_count() {
        let ply = read(CUBE_CORNER).unwrap();
        let vertex = ply.find_element("vertex").unwrap();
        let z = ply.find_property(vertex, "z").unwrap().unwrap();
        let red = ply.find_property(vertex, "red").unwrap().unwrap();

        let zs: Vec<f64> = (0..3).map(|row| ply.get_value(vertex, row, z).unwrap()).collect();
        assert_eq!(zs, [0.0, 0.0, 0.5]);
        let reds: Vec<u64> = (0..3).map(|row| ply.get_byte(vertex, row, red).unwrap()).collect();
        assert_eq!(reds, [255, 128, 0]);

        let face = ply.find_element("face").unwrap();
        assert_eq!(ply.get_index_list(face, 0, 0).unwrap(), [0, 1, 2]);
        assert_eq!(ply.get_value_list(face, 0, 1).unwrap(), [0.25, 0.75]);
    }

    #[test]
    fn test_list_property_index_list() {
        let ply = read("ply\nformat ascii 1.0\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n3 0 1 2\n")
            .unwrap();
        let face = ply.find_element("face").unwrap();
        let prop = ply.find_property(face, "vertex_indices").unwrap().unwrap();
        assert_eq!(ply.get_index_list(face, 0, prop).unwrap(), [0, 1, 2]);
    }

    #[test]
    fn test_lookup_misses_return_none() {
        let ply = read(CUBE_CORNER).unwrap();
        assert_eq!(ply.find_element("edge"), None);
        assert_eq!(ply.find_element("vertex"), Some(0));
        assert_eq!(ply.find_element("face"), Some(1));
        assert_eq!(ply.find_property(0, "nx").unwrap(), None);
        assert_eq!(ply.find_property(0, "red").unwrap(), Some(3));
    }

    #[test]
    fn test_category_mismatch_is_an_error() {
        let ply = read(CUBE_CORNER).unwrap();
        let err = ply.get_value(0, 0, 3).unwrap_err();
        assert!(matches!(
            err,
            PlyError::CategoryMismatch { requested: "value", recorded: "byte", .. }
        ));
        assert!(err.is_contract_violation());

        assert!(ply.get_byte(0, 0, 0).is_err());
        assert!(ply.get_index(0, 0, 0).is_err());
        assert!(ply.get_index(1, 0, 0).is_err());
        assert!(ply.get_value_list(1, 0, 0).is_err());
        assert!(ply.get_byte_list(1, 0, 0).is_err());
        assert!(ply.get_index_list(1, 0, 1).is_err());
    }

    #[test]
    fn test_out_of_range_indices() {
        let ply = read(CUBE_CORNER).unwrap();
        assert!(matches!(
            ply.element_size(2),
            Err(PlyError::ElementOutOfRange { index: 2, count: 2 })
        ));
        assert!(matches!(ply.find_property(5, "x"), Err(PlyError::ElementOutOfRange { .. })));
        assert!(matches!(ply.get_value(0, 3, 0), Err(PlyError::RowOutOfRange { row: 3, .. })));
        assert!(matches!(
            ply.get_value(0, 0, 4),
            Err(PlyError::PropertyOutOfRange { index: 4, .. })
        ));
    }

    #[test]
    fn test_short_ascii_body_fails() {
        let err = read("ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nend_header\n1\n2\n")
            .unwrap_err();
        match err {
            PlyError::Decode { element, row, property, source } => {
                assert_eq!(element, "vertex");
                assert_eq!(row, 2);
                assert_eq!(property, "x");
                assert!(matches!(source, crate::error::DecodeError::UnexpectedEof));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_negative_list_count_fails() {
        let err = read("ply\nformat ascii 1.0\nelement face 1\nproperty list int int idx\nend_header\n-2 1 2\n")
            .unwrap_err();
        assert!(matches!(
            err,
            PlyError::Decode { source: crate::error::DecodeError::NegativeListCount(-2), .. }
        ));
    }

    #[test]
    fn test_absurd_list_count_fails_without_allocating() {
        let err = read("ply\nformat ascii 1.0\nelement face 1\nproperty list uint64 int idx\nend_header\n18446744073709551615 1 2\n")
            .unwrap_err();
        assert!(matches!(err, PlyError::Decode { .. }));
    }

    #[test]
    fn test_elements_without_properties() {
        let ply = read("ply\nformat ascii 1.0\nelement marker 1000000\nelement vertex 1\nproperty int i\nend_header\n42\n")
            .unwrap();
        assert_eq!(ply.element_size(0).unwrap(), 1_000_000);
        assert_eq!(ply.get_index(1, 0, 0).unwrap(), 42);
        assert!(matches!(ply.cell(0, 0, 0), Err(PlyError::PropertyOutOfRange { .. })));
    }

    #[test]
    fn test_ascii_float_overflow_fails() {
        let err = read("ply\nformat ascii 1.0\nelement vertex 2\nproperty float x\nend_header\n1.5\n1e39\n")
            .unwrap_err();
        match err {
            PlyError::Decode { row, source, .. } => {
                assert_eq!(row, 1);
                assert!(matches!(source, DecodeError::Malformed { ref token, .. } if token == "1e39"));
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_utf8_ascii_body_is_a_decode_error() {
        let mut bytes = b"ply\nformat ascii 1.0\nelement vertex 1\nproperty uchar i\nend_header\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        let err = PlyReader::from_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, PlyError::Decode { source: DecodeError::InvalidText, .. }));
    }

    #[test]
    fn test_attach_path_covers_header_and_body_io() {
        let path = Path::new("/data/mesh.ply");
        let header = attach_path(
            PlyError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")),
            path,
        );
        assert!(matches!(header, PlyError::File { ref path, .. } if path == Path::new("/data/mesh.ply")));

        let body = attach_path(
            PlyError::Decode {
                element: "vertex".to_string(),
                row: 4,
                property: "x".to_string(),
                source: DecodeError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad sector")),
            },
            path,
        );
        match body {
            PlyError::File { path: reported, source } => {
                assert_eq!(reported, path);
                assert_eq!(source.kind(), std::io::ErrorKind::InvalidData);
            }
            other => panic!("expected file error, got {other:?}"),
        }

        let eof = attach_path(
            PlyError::Decode {
                element: "vertex".to_string(),
                row: 4,
                property: "x".to_string(),
                source: DecodeError::UnexpectedEof,
            },
            path,
        );
        assert!(matches!(eof, PlyError::Decode { source: DecodeError::UnexpectedEof, .. }));
        assert!(matches!(attach_path(PlyError::NotPly, path), PlyError::NotPly));
    }

    #[test]
    fn test_dangling_cell_reports_missing_slot() {
        let header = Header::parse(&mut Cursor::new(
            b"ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nend_header\n".to_vec(),
        ))
        .unwrap();
        let mut store = Store::for_header(&header);
        store.record(0, Cell::Value(5));
        let ply = PlyReader { header, store };

        let err = ply.get_value(0, 0, 0).unwrap_err();
        assert!(matches!(
            err,
            PlyError::MissingSlot { ref element, ref property, cell: Cell::Value(5) }
                if element == "vertex" && property == "x"
        ));
        assert!(!err.is_contract_violation());
    }

    #[test]
    fn test_reader_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PlyReader>();
    }
}
