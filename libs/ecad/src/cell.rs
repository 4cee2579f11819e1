//! Cells.

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::id::Id;
use crate::layout::Layout;

/// Identifies a cell within its owning database.
pub type CellId = Id<Cell>;

/// The kind of a cell.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CellType {
    /// A cell owning a layout that can be instantiated.
    #[default]
    Circuit,
}

/// A named cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    name: ArcStr,
    kind: CellType,
    layout: Layout,
    #[serde(skip)]
    flattened: Option<Layout>,
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind && self.layout == other.layout
    }
}

impl Cell {
    pub(crate) fn new_circuit(name: ArcStr) -> Self {
        Self {
            name,
            kind: CellType::Circuit,
            layout: Layout::new(),
            flattened: None,
        }
    }

    /// The cell name.
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The cell kind.
    pub fn cell_type(&self) -> CellType {
        self.kind
    }

    /// The layout owned by this cell.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The flattened copy of the layout, if one was taken and the layout has not changed since.
    pub fn flattened_layout(&self) -> Option<&Layout> {
        self.flattened.as_ref()
    }

    pub(crate) fn layout_mut(&mut self) -> &mut Layout {
        self.flattened = None;
        &mut self.layout
    }

    pub(crate) fn set_layout(&mut self, layout: Layout) {
        self.flattened = None;
        self.layout = layout;
    }

    pub(crate) fn set_flattened(&mut self, layout: Layout) -> &Layout {
        self.flattened.insert(layout)
    }
}
