//! plyread data crate
//!
//! Reads PLY ("Polygon File Format") files into memory. The header becomes a
//! typed schema; the body, whether ASCII or binary of either byte order, is
//! decoded into category pools addressable by (element, row, property).
//!
//! ```no_run
//! use plyread_data::PlyReader;
//!
//! let ply = PlyReader::open("bunny.ply")?;
//! let vertex = ply.find_element("vertex").expect("no vertex element");
//! let x = ply.find_property(vertex, "x")?.expect("no x property");
//! for row in 0..ply.element_size(vertex)? {
//!     println!("{}", ply.get_value(vertex, row, x)?);
//! }
//! # Ok::<(), plyread_data::PlyError>(())
//! ```

pub mod error;
pub mod ply;
pub mod types;

pub use error::{DecodeError, PlyError, Result};
pub use ply::{
    Cell, Element, Header, PlyReader, PlyVertex, Property, bounding_box, load_faces, load_vertices,
};
pub use types::{Category, Format, PropertyType, Scalar};
