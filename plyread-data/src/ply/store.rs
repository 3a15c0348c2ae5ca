//! Columnar storage for decoded body values.
//!
//! Values live in append-only pools, one per category, plus one list pool
//! per category. Each (element, row, property) maps to a [`Cell`] that names
//! the pool and the slot inside it.

use crate::ply::header::Header;
use crate::types::{Category, Scalar};
use std::fmt;
use std::ops::Range;

/// Upper bound on capacity reserved from a header or list count before any
/// data has actually been read.
const MAX_PREALLOC: usize = 1 << 16;

/// Location of one decoded value: pool category plus slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    Value(usize),
    Index(usize),
    Byte(usize),
    ValueList(usize),
    IndexList(usize),
    ByteList(usize),
}

impl Cell {
    pub fn category(&self) -> Category {
        match self {
            Cell::Value(_) | Cell::ValueList(_) => Category::Value,
            Cell::Index(_) | Cell::IndexList(_) => Category::Index,
            Cell::Byte(_) | Cell::ByteList(_) => Category::Byte,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Cell::ValueList(_) | Cell::IndexList(_) | Cell::ByteList(_))
    }

    pub fn slot(&self) -> usize {
        match *self {
            Cell::Value(slot)
            | Cell::Index(slot)
            | Cell::Byte(slot)
            | Cell::ValueList(slot)
            | Cell::IndexList(slot)
            | Cell::ByteList(slot) => slot,
        }
    }

    /// Short name of the pool this cell points into.
    pub fn kind(&self) -> &'static str {
        match self {
            Cell::Value(_) => "value",
            Cell::Index(_) => "index",
            Cell::Byte(_) => "byte",
            Cell::ValueList(_) => "value list",
            Cell::IndexList(_) => "index list",
            Cell::ByteList(_) => "byte list",
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind(), self.slot())
    }
}

/// Variable-length lists stored back to back in one buffer.
#[derive(Debug)]
struct ListPool<T> {
    items: Vec<T>,
    spans: Vec<Range<usize>>,
}

impl<T> Default for ListPool<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            spans: Vec::new(),
        }
    }
}

impl<T> ListPool<T> {
    fn get(&self, slot: usize) -> Option<&[T]> {
        self.spans.get(slot).map(|span| &self.items[span.clone()])
    }

    fn seal(&mut self, start: usize) -> usize {
        self.spans.push(start..self.items.len());
        self.spans.len() - 1
    }
}

/// Row-major cells of one element.
#[derive(Debug)]
struct CellGrid {
    width: usize,
    cells: Vec<Cell>,
}

impl CellGrid {
    fn get(&self, row: usize, property: usize) -> Option<Cell> {
        if property >= self.width {
            return None;
        }
        let at = row.checked_mul(self.width)?.checked_add(property)?;
        self.cells.get(at).copied()
    }
}

/// Owns every decoded value of a PLY body.
#[derive(Debug)]
pub struct Store {
    values: Vec<f64>,
    indices: Vec<i64>,
    bytes: Vec<u64>,
    value_lists: ListPool<f64>,
    index_lists: ListPool<i64>,
    byte_lists: ListPool<u64>,
    grids: Vec<CellGrid>,
}

impl Store {
    /// Empty store with one cell grid per element of `header`.
    pub fn for_header(header: &Header) -> Self {
        let grids = header
            .elements()
            .iter()
            .map(|element| {
                let width = element.properties().len();
                let expected = element.declared_count().saturating_mul(width);
                CellGrid {
                    width,
                    cells: Vec::with_capacity(expected.min(MAX_PREALLOC)),
                }
            })
            .collect();

        Self {
            values: Vec::new(),
            indices: Vec::new(),
            bytes: Vec::new(),
            value_lists: ListPool::default(),
            index_lists: ListPool::default(),
            byte_lists: ListPool::default(),
            grids,
        }
    }

    /// Append a scalar to its category pool.
    pub fn push_scalar(&mut self, scalar: Scalar) -> Cell {
        match scalar {
            Scalar::Value(v) => {
                self.values.push(v);
                Cell::Value(self.values.len() - 1)
            }
            Scalar::Index(v) => {
                self.indices.push(v);
                Cell::Index(self.indices.len() - 1)
            }
            Scalar::Byte(v) => {
                self.bytes.push(v);
                Cell::Byte(self.bytes.len() - 1)
            }
        }
    }

    /// Start a new list in the pool for `category`. `len` only sizes the
    /// initial reservation.
    pub fn open_list(&mut self, category: Category, len: usize) -> ListWriter<'_> {
        let reserve = len.min(MAX_PREALLOC);
        let start = match category {
            Category::Value => {
                self.value_lists.items.reserve(reserve);
                self.value_lists.items.len()
            }
            Category::Index => {
                self.index_lists.items.reserve(reserve);
                self.index_lists.items.len()
            }
            Category::Byte => {
                self.byte_lists.items.reserve(reserve);
                self.byte_lists.items.len()
            }
        };
        ListWriter {
            store: self,
            category,
            start,
        }
    }

    /// Append the next cell of `element` in row-major order.
    pub fn record(&mut self, element: usize, cell: Cell) {
        self.grids[element].cells.push(cell);
    }

    pub fn cell(&self, element: usize, row: usize, property: usize) -> Option<Cell> {
        self.grids.get(element)?.get(row, property)
    }

    pub fn value(&self, slot: usize) -> Option<f64> {
        self.values.get(slot).copied()
    }

    pub fn index(&self, slot: usize) -> Option<i64> {
        self.indices.get(slot).copied()
    }

    pub fn byte(&self, slot: usize) -> Option<u64> {
        self.bytes.get(slot).copied()
    }

    pub fn value_list(&self, slot: usize) -> Option<&[f64]> {
        self.value_lists.get(slot)
    }

    pub fn index_list(&self, slot: usize) -> Option<&[i64]> {
        self.index_lists.get(slot)
    }

    pub fn byte_list(&self, slot: usize) -> Option<&[u64]> {
        self.byte_lists.get(slot)
    }

    /// Number of scalars held across the three scalar pools.
    pub fn scalar_count(&self) -> usize {
        self.values.len() + self.indices.len() + self.bytes.len()
    }

    /// Number of lists held across the three list pools.
    pub fn list_count(&self) -> usize {
        self.value_lists.spans.len() + self.index_lists.spans.len() + self.byte_lists.spans.len()
    }
}

/// Appends items to the list opened by [`Store::open_list`].
pub struct ListWriter<'a> {
    store: &'a mut Store,
    category: Category,
    start: usize,
}

impl ListWriter<'_> {
    /// Items go to the pool of their own category, which is the list's
    /// category whenever they were decoded with the list's item type.
    pub fn push(&mut self, item: Scalar) {
        match item {
            Scalar::Value(v) => self.store.value_lists.items.push(v),
            Scalar::Index(v) => self.store.index_lists.items.push(v),
            Scalar::Byte(v) => self.store.byte_lists.items.push(v),
        }
    }

    pub fn close(self) -> Cell {
        match self.category {
            Category::Value => Cell::ValueList(self.store.value_lists.seal(self.start)),
            Category::Index => Cell::IndexList(self.store.index_lists.seal(self.start)),
            Category::Byte => Cell::ByteList(self.store.byte_lists.seal(self.start)),
        }
    }
}
