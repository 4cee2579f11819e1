//! The database owning cells, materials and shared definitions.

use std::collections::HashSet;

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellId};
use crate::component::{ComponentDef, ComponentDefId, ComponentId};
use crate::id::Id;
use crate::layer::{LayerId, LayerMap, LayerMapId};
use crate::layout::{CellInst, CellInstId, Layout};
use crate::material::MaterialDef;
use crate::padstack::{PadstackDef, PadstackDefId};
use crate::primitive::{BondwireEnd, PrimitiveId};

/// Identifies a material within its owning database.
pub type MaterialId = Id<MaterialDef>;

/// The default separator between instance names in hierarchical names.
pub const DEFAULT_HIER_SEP: char = '/';

/// Which end of a bondwire.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BondwireSide {
    /// The start of the wire.
    Start,
    /// The end of the wire.
    End,
}

/// A collection of cells and the definitions they share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    name: ArcStr,
    coord_units: CoordUnits,
    #[serde(with = "sep_as_str")]
    hier_sep: char,
    cells: IndexMap<ArcStr, Cell>,
    materials: IndexMap<ArcStr, MaterialDef>,
    component_defs: IndexMap<ArcStr, ComponentDef>,
    padstack_defs: IndexMap<ArcStr, PadstackDef>,
    layer_maps: IndexMap<ArcStr, LayerMap>,
}

/// Stores the hierarchy separator as a one-character string.
mod sep_as_str {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(sep: &char, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(sep.encode_utf8(&mut [0; 4]))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<char, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(serde::de::Error::custom(format!(
                "expected a single separator character, got `{s}`"
            ))),
        }
    }
}

macro_rules! named_collection {
    ($field:ident, $ty:ty, $id:ty, $create:ident, $get:ident, $get_mut:ident, $find:ident, $iter:ident, $what:literal) => {
        #[doc = concat!("Adds a ", $what, ".")]
        ///
        /// Returns `None` if the name is already taken.
        pub fn $create(&mut self, value: $ty) -> Option<$id> {
            if self.$field.contains_key(value.name()) {
                tracing::warn!(name = %value.name(), kind = $what, "duplicate name");
                return None;
            }
            let (index, _) = self.$field.insert_full(value.name().clone(), value);
            Some(<$id>::from_index(index))
        }

        #[doc = concat!("Returns the ", $what, " with the given ID.")]
        pub fn $get(&self, id: $id) -> Option<&$ty> {
            self.$field.get_index(id.index()).map(|(_, v)| v)
        }

        #[doc = concat!("Returns the ", $what, " with the given ID mutably.")]
        pub fn $get_mut(&mut self, id: $id) -> Option<&mut $ty> {
            self.$field.get_index_mut(id.index()).map(|(_, v)| v)
        }

        #[doc = concat!("Finds a ", $what, " by name.")]
        pub fn $find(&self, name: &str) -> Option<$id> {
            self.$field.get_index_of(name).map(<$id>::from_index)
        }

        #[doc = concat!("Iterates over the `(id, ", $what, ")` pairs in creation order.")]
        pub fn $iter(&self) -> impl ExactSizeIterator<Item = ($id, &$ty)> {
            self.$field
                .values()
                .enumerate()
                .map(|(i, v)| (<$id>::from_index(i), v))
        }
    };
}

impl Database {
    /// Creates an empty database with the default coordinate units.
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            coord_units: CoordUnits::default(),
            hier_sep: DEFAULT_HIER_SEP,
            cells: IndexMap::new(),
            materials: IndexMap::new(),
            component_defs: IndexMap::new(),
            padstack_defs: IndexMap::new(),
            layer_maps: IndexMap::new(),
        }
    }

    /// The database name.
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The coordinate units shared by all cells.
    pub fn coord_units(&self) -> CoordUnits {
        self.coord_units
    }

    /// Sets the coordinate units.
    pub fn set_coord_units(&mut self, units: CoordUnits) {
        self.coord_units = units;
    }

    /// The separator between instance names in hierarchical names.
    pub fn hier_sep(&self) -> char {
        self.hier_sep
    }

    /// Sets the hierarchical name separator.
    pub fn set_hier_sep(&mut self, sep: char) {
        self.hier_sep = sep;
    }

    /// Creates an empty circuit cell.
    ///
    /// Returns `None` if a cell with the same name exists.
    pub fn create_circuit_cell(&mut self, name: impl Into<ArcStr>) -> Option<CellId> {
        let name = name.into();
        if self.cells.contains_key(&name) {
            tracing::warn!(cell = %name, "duplicate cell name");
            return None;
        }
        let (index, _) = self
            .cells
            .insert_full(name.clone(), Cell::new_circuit(name));
        Some(CellId::from_index(index))
    }

    /// Gets the cell with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no cell has the given ID.
    /// For a non-panicking alternative, see [`try_cell`](Database::try_cell).
    pub fn cell(&self, id: CellId) -> &Cell {
        match self.try_cell(id) {
            Some(cell) => cell,
            None => {
                tracing::error!(?id, "no such cell");
                panic!("no cell with ID {id:?}");
            }
        }
    }

    /// Gets the cell with the given ID.
    pub fn try_cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get_index(id.index()).map(|(_, c)| c)
    }

    /// Finds a cell by name.
    pub fn find_cell_by_name(&self, name: &str) -> Option<CellId> {
        self.cells.get_index_of(name).map(CellId::from_index)
    }

    /// Iterates over the `(id, cell)` pairs in creation order.
    pub fn cells(&self) -> impl ExactSizeIterator<Item = (CellId, &Cell)> {
        self.cells
            .values()
            .enumerate()
            .map(|(i, c)| (CellId::from_index(i), c))
    }

    /// The layout of a cell.
    pub fn layout(&self, cell: CellId) -> Option<&Layout> {
        self.try_cell(cell).map(Cell::layout)
    }

    /// The layout of a cell, for editing.
    ///
    /// Invalidates every cached flattened layout in the database.
    pub fn layout_mut(&mut self, cell: CellId) -> Option<&mut Layout> {
        self.invalidate_flattened();
        self.cells
            .get_index_mut(cell.index())
            .map(|(_, c)| c.layout_mut())
    }

    pub(crate) fn invalidate_flattened(&mut self) {
        for cell in self.cells.values_mut() {
            cell.layout_mut();
        }
    }

    pub(crate) fn cell_entry_mut(&mut self, cell: CellId) -> Option<&mut Cell> {
        self.cells.get_index_mut(cell.index()).map(|(_, c)| c)
    }

    named_collection!(
        materials,
        MaterialDef,
        MaterialId,
        create_material_def,
        material,
        material_mut,
        find_material_id_by_name,
        materials,
        "material"
    );

    /// Looks up a material by name.
    pub fn find_material_by_name(&self, name: &str) -> Option<&MaterialDef> {
        self.materials.get(name)
    }

    named_collection!(
        component_defs,
        ComponentDef,
        ComponentDefId,
        create_component_def,
        component_def,
        component_def_mut,
        find_component_def_by_name,
        component_defs,
        "component definition"
    );

    named_collection!(
        padstack_defs,
        PadstackDef,
        PadstackDefId,
        create_padstack_def,
        padstack_def,
        padstack_def_mut,
        find_padstack_def_by_name,
        padstack_defs,
        "padstack definition"
    );

    named_collection!(
        layer_maps,
        LayerMap,
        LayerMapId,
        create_layer_map,
        layer_map,
        layer_map_mut,
        find_layer_map_by_name,
        layer_maps,
        "layer map"
    );

    /// Creates a layer map pairing the layers of `from` and `to` in insertion order.
    ///
    /// Extra layers in the longer stackup are left unmapped.
    pub fn create_default_layer_map(
        &mut self,
        name: impl Into<ArcStr>,
        from: CellId,
        to: CellId,
    ) -> Option<LayerMapId> {
        let from = self.layout(from)?.num_layers();
        let to = self.layout(to)?.num_layers();
        let mut map = LayerMap::new(name);
        for i in 0..from.min(to) {
            map.set_mapping(LayerId::from_raw(i), LayerId::from_raw(i));
        }
        self.create_layer_map(map)
    }

    /// Instantiates `child` inside `parent`.
    ///
    /// Returns `None` if either cell or the layer map does not exist, the instance name
    /// is taken, or the instance would make a cell instantiate itself.
    pub fn create_cell_inst(
        &mut self,
        parent: CellId,
        name: impl Into<ArcStr>,
        child: CellId,
        transform: Transformation,
        layer_map: Option<LayerMapId>,
    ) -> Option<CellInstId> {
        let name = name.into();
        let (Some(parent_cell), Some(child_cell)) = (self.try_cell(parent), self.try_cell(child))
        else {
            tracing::warn!(inst = %name, "cell instance refers to a missing cell");
            return None;
        };
        if let Some(map) = layer_map {
            if self.layer_map(map).is_none() {
                tracing::warn!(inst = %name, ?map, "no such layer map");
                return None;
            }
        }
        if self.instantiates(child, parent) {
            tracing::warn!(
                inst = %name,
                parent = %parent_cell.name(),
                child = %child_cell.name(),
                "cell instance would create a cycle"
            );
            return None;
        }
        self.layout_mut(parent)?
            .insert_cell_inst(CellInst::new(name, child, transform, layer_map))
    }

    /// Returns `true` if `root` is `target` or instantiates it at any depth.
    pub fn instantiates(&self, root: CellId, target: CellId) -> bool {
        let mut stack = vec![root];
        let mut visited = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(layout) = self.layout(id) {
                stack.extend(layout.cell_insts().map(|(_, inst)| inst.def()));
            }
        }
        false
    }

    /// Places a component in a cell.
    ///
    /// Returns `None` if the cell, definition or layer does not exist, or the name is taken.
    pub fn create_component(
        &mut self,
        cell: CellId,
        name: impl Into<ArcStr>,
        def: ComponentDefId,
        layer: LayerId,
        transform: Transformation,
        flipped: bool,
    ) -> Option<ComponentId> {
        if self.component_def(def).is_none() {
            tracing::warn!(?def, "no such component definition");
            return None;
        }
        self.layout_mut(cell)?
            .create_component(name, def, layer, transform, flipped)
    }

    /// Binds one end of a bondwire to a component pin.
    ///
    /// Returns `false` and leaves the bondwire unchanged if the bondwire, component or pin
    /// does not exist.
    pub fn set_bondwire_pin(
        &mut self,
        cell: CellId,
        bondwire: PrimitiveId,
        side: BondwireSide,
        component: ComponentId,
        pin: &str,
    ) -> bool {
        let Some(layout) = self.layout(cell) else {
            return false;
        };
        let Some(comp) = layout.component(component) else {
            tracing::warn!(?component, "no such component");
            return false;
        };
        let has_pin = self
            .component_def(comp.def())
            .is_some_and(|def| def.pin(pin).is_some());
        if !has_pin {
            tracing::warn!(component = %comp.name(), pin, "no such pin");
            return false;
        }
        let end = BondwireEnd::Pin {
            component,
            pin: pin.into(),
        };
        let Some(wire) = self
            .layout_mut(cell)
            .and_then(|layout| layout.bondwire_mut(bondwire))
        else {
            tracing::warn!(?bondwire, "no such bondwire");
            return false;
        };
        match side {
            BondwireSide::Start => wire.set_start(end),
            BondwireSide::End => wire.set_end(end),
        }
        true
    }

    /// Resolves a hierarchical component name such as `inst/sub/U1` from `cell`.
    ///
    /// Instance names are resolved left to right; the last segment names a component in
    /// the cell reached. A component copied up by flattening is also found by its full name.
    pub fn find_component_by_hier_name(
        &self,
        cell: CellId,
        name: &str,
    ) -> Option<(CellId, ComponentId)> {
        let layout = self.layout(cell)?;
        if let Some(id) = layout.find_component_by_name(name) {
            return Some((cell, id));
        }
        let (head, rest) = name.split_once(self.hier_sep)?;
        let inst = layout.cell_inst(layout.find_cell_inst_by_name(head)?)?;
        self.find_component_by_hier_name(inst.def(), rest)
    }

    /// Replaces the layout of a cell.
    pub(crate) fn replace_layout(&mut self, cell: CellId, layout: Layout) {
        self.invalidate_flattened();
        if let Some(c) = self.cell_entry_mut(cell) {
            c.set_layout(layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentType, PinIoType};
    use crate::layer::{Layer, LayerType};

    #[test]
    fn cells_are_unique_and_cycles_rejected() {
        let mut db = Database::new("db");
        let a = db.create_circuit_cell("A").unwrap();
        let b = db.create_circuit_cell("B").unwrap();
        let c = db.create_circuit_cell("C").unwrap();
        assert!(db.create_circuit_cell("A").is_none());

        let t = Transformation::identity();
        assert!(db.create_cell_inst(a, "b0", b, t, None).is_some());
        assert!(db.create_cell_inst(b, "c0", c, t, None).is_some());
        assert!(db.create_cell_inst(a, "b0", c, t, None).is_none());
        assert!(db.create_cell_inst(c, "a0", a, t, None).is_none());
        assert!(db.create_cell_inst(c, "self", c, t, None).is_none());
        assert!(db.instantiates(a, c));
        assert!(!db.instantiates(c, a));
    }

    #[test]
    fn hierarchical_component_lookup() {
        let mut db = Database::new("db");
        let top = db.create_circuit_cell("top").unwrap();
        let mid = db.create_circuit_cell("mid").unwrap();
        let leaf = db.create_circuit_cell("leaf").unwrap();
        let layer = db
            .layout_mut(leaf)
            .unwrap()
            .append_layer(Layer::new("L0", LayerType::Conducting, 0., 1., "Cu", "Air"))
            .unwrap();
        let def = db
            .create_component_def(ComponentDef::new(
                "die",
                ComponentType::Ic,
                Rect::from_sides(-1, -1, 1, 1),
            ))
            .unwrap();
        let u1 = db
            .create_component(leaf, "U1", def, layer, Transformation::identity(), false)
            .unwrap();
        let t = Transformation::identity();
        db.create_cell_inst(mid, "m", leaf, t, None).unwrap();
        db.create_cell_inst(top, "t", mid, t, None).unwrap();

        assert_eq!(db.find_component_by_hier_name(top, "t/m/U1"), Some((leaf, u1)));
        assert_eq!(db.find_component_by_hier_name(top, "t/x/U1"), None);
        assert_eq!(db.find_component_by_hier_name(top, "U1"), None);
    }

    #[test]
    fn bondwire_pins_are_validated() {
        let mut db = Database::new("db");
        let cell = db.create_circuit_cell("top").unwrap();
        let mut def = ComponentDef::new("die", ComponentType::Ic, Rect::from_sides(-1, -1, 1, 1));
        def.add_pin("G", Point::new(0, 1), PinIoType::Input);
        let def = db.create_component_def(def).unwrap();
        let layout = db.layout_mut(cell).unwrap();
        let layer = layout
            .append_layer(Layer::new("L0", LayerType::Conducting, 0., 1., "Cu", "Air"))
            .unwrap();
        let end = BondwireEnd::Layer {
            layer,
            point: Point::zero(),
            flipped: false,
        };
        let wire = layout
            .create_bondwire("bw", None, end.clone(), end, 0.1)
            .unwrap();
        let u1 = db
            .create_component(cell, "U1", def, layer, Transformation::identity(), false)
            .unwrap();

        assert!(!db.set_bondwire_pin(cell, wire, BondwireSide::Start, u1, "D"));
        assert!(db.set_bondwire_pin(cell, wire, BondwireSide::Start, u1, "G"));
        let layout = db.layout(cell).unwrap();
        let wire = layout.primitive(wire).and_then(|p| p.as_bondwire()).unwrap();
        assert!(matches!(wire.start(), BondwireEnd::Pin { pin, .. } if pin == "G"));
        assert!(matches!(wire.end(), BondwireEnd::Layer { .. }));
    }
}
