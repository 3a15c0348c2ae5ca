//! PLY file loading and parsing

pub mod body;
pub mod header;
mod loader;
mod reader;
pub mod store;
mod vertex;

pub use header::{Element, Header, Property};
pub use loader::{load_faces, load_vertices};
pub use reader::PlyReader;
pub use store::Cell;
pub use vertex::{PlyVertex, bounding_box};
