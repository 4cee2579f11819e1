//! Layouts: the stackup, nets and primitives owned by a circuit cell.

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::cell::CellId;
use crate::component::{Component, ComponentDefId, ComponentId};
use crate::id::Id;
use crate::layer::{Layer, LayerId, LayerMapId};
use crate::padstack::{PadstackDefId, PadstackInst, PadstackInstId};
use crate::primitive::{Bondwire, BondwireEnd, Geometry2D, Primitive, PrimitiveId, Text};

/// Identifies a net within its owning layout.
pub type NetId = Id<Net>;
/// Identifies a cell instance within its owning layout.
pub type CellInstId = Id<CellInst>;

/// An electrical net.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Net {
    name: ArcStr,
}

impl Net {
    /// The net name.
    pub fn name(&self) -> &ArcStr {
        &self.name
    }
}

/// An instance of another circuit cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellInst {
    name: ArcStr,
    def: CellId,
    transform: Transformation,
    layer_map: Option<LayerMapId>,
}

impl CellInst {
    pub(crate) fn new(
        name: ArcStr,
        def: CellId,
        transform: Transformation,
        layer_map: Option<LayerMapId>,
    ) -> Self {
        Self {
            name,
            def,
            transform,
            layer_map,
        }
    }

    /// The instance name.
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The instantiated cell.
    pub fn def(&self) -> CellId {
        self.def
    }

    /// The placement of the instantiated layout in the parent.
    pub fn transform(&self) -> &Transformation {
        &self.transform
    }

    /// Sets the placement of the instantiated layout.
    pub fn set_transform(&mut self, transform: Transformation) {
        self.transform = transform;
    }

    /// The map from the child's layers to the parent's layers.
    ///
    /// Without a map, layers are matched by name.
    pub fn layer_map(&self) -> Option<LayerMapId> {
        self.layer_map
    }

    /// Sets the layer map.
    pub fn set_layer_map(&mut self, layer_map: Option<LayerMapId>) {
        self.layer_map = layer_map;
    }
}

/// The physical contents of a circuit cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    boundary: Option<Shape>,
    layers: Vec<Layer>,
    nets: IndexMap<ArcStr, Net>,
    primitives: Vec<Primitive>,
    padstack_insts: Vec<PadstackInst>,
    components: IndexMap<ArcStr, Component>,
    cell_insts: IndexMap<ArcStr, CellInst>,
}

impl Layout {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// The layout outline.
    pub fn boundary(&self) -> Option<&Shape> {
        self.boundary.as_ref()
    }

    /// Sets the layout outline.
    pub fn set_boundary(&mut self, boundary: impl Into<Shape>) {
        self.boundary = Some(boundary.into());
    }

    pub(crate) fn set_boundary_option(&mut self, boundary: Option<Shape>) {
        self.boundary = boundary;
    }

    /// Appends a stackup layer.
    ///
    /// Returns `None` if a layer with the same name exists.
    pub fn append_layer(&mut self, layer: Layer) -> Option<LayerId> {
        if self.find_layer_by_name(layer.name()).is_some() {
            tracing::warn!(layer = %layer.name(), "duplicate layer name");
            return None;
        }
        self.layers.push(layer);
        Some(LayerId::from_index(self.layers.len() - 1))
    }

    /// Appends several layers, stopping at the first failure.
    pub fn append_layers(&mut self, layers: impl IntoIterator<Item = Layer>) -> Option<Vec<LayerId>> {
        layers.into_iter().map(|l| self.append_layer(l)).collect()
    }

    /// Returns the layer with the given ID.
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.index())
    }

    /// Returns the layer with the given ID mutably.
    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(id.index())
    }

    /// The layers in insertion order.
    pub fn layers(&self) -> impl ExactSizeIterator<Item = (LayerId, &Layer)> {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, l)| (LayerId::from_index(i), l))
    }

    /// The number of layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Finds a layer by name.
    pub fn find_layer_by_name(&self, name: &str) -> Option<LayerId> {
        self.layers
            .iter()
            .position(|l| l.name() == name)
            .map(LayerId::from_index)
    }

    /// The layers sorted from the top of the stackup down.
    ///
    /// Layers at equal elevations keep insertion order.
    pub fn stackup_layers(&self) -> Vec<LayerId> {
        let mut ids: Vec<LayerId> = self.layers().map(|(id, _)| id).collect();
        ids.sort_by(|a, b| {
            self.layers[b.index()]
                .elevation()
                .total_cmp(&self.layers[a.index()].elevation())
        });
        ids
    }

    /// Creates a net.
    ///
    /// Returns `None` if a net with the same name exists.
    pub fn create_net(&mut self, name: impl Into<ArcStr>) -> Option<NetId> {
        let name = name.into();
        if self.nets.contains_key(&name) {
            tracing::warn!(net = %name, "duplicate net name");
            return None;
        }
        let (index, _) = self.nets.insert_full(name.clone(), Net { name });
        Some(NetId::from_index(index))
    }

    /// Returns the net with the given ID.
    pub fn net(&self, id: NetId) -> Option<&Net> {
        self.nets.get_index(id.index()).map(|(_, n)| n)
    }

    /// Finds a net by name.
    pub fn find_net_by_name(&self, name: &str) -> Option<NetId> {
        self.nets.get_index_of(name).map(NetId::from_index)
    }

    /// The nets in creation order.
    pub fn nets(&self) -> impl ExactSizeIterator<Item = (NetId, &Net)> {
        self.nets
            .values()
            .enumerate()
            .map(|(i, n)| (NetId::from_index(i), n))
    }

    /// The number of nets.
    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    fn check_layer(&self, layer: LayerId) -> bool {
        if self.layer(layer).is_none() {
            tracing::warn!(?layer, "no such layer");
            return false;
        }
        true
    }

    fn check_net(&self, net: Option<NetId>) -> bool {
        match net {
            Some(id) if self.net(id).is_none() => {
                tracing::warn!(net = ?id, "no such net");
                false
            }
            _ => true,
        }
    }

    fn push_primitive(&mut self, primitive: Primitive) -> PrimitiveId {
        self.primitives.push(primitive);
        PrimitiveId::from_index(self.primitives.len() - 1)
    }

    /// Creates a shape on a layer.
    ///
    /// Returns `None` if the layer or net does not exist.
    pub fn create_geometry_2d(
        &mut self,
        layer: LayerId,
        net: Option<NetId>,
        shape: impl Into<Shape>,
    ) -> Option<PrimitiveId> {
        if !self.check_layer(layer) || !self.check_net(net) {
            return None;
        }
        Some(self.push_primitive(Primitive::Geometry(Geometry2D {
            layer,
            net,
            shape: shape.into(),
        })))
    }

    /// Creates a text annotation.
    pub fn create_text(
        &mut self,
        layer: Option<LayerId>,
        text: impl Into<ArcStr>,
        transform: Transformation,
    ) -> Option<PrimitiveId> {
        if let Some(layer) = layer {
            if !self.check_layer(layer) {
                return None;
            }
        }
        Some(self.push_primitive(Primitive::Text(Text {
            layer,
            text: text.into(),
            transform,
        })))
    }

    /// Creates a bondwire.
    ///
    /// Returns `None` if the name is taken by another bondwire or the net or an endpoint
    /// does not resolve. Pin endpoints are checked against the components of this layout only;
    /// use [`Database::set_bondwire_pin`](crate::database::Database::set_bondwire_pin) to bind
    /// pins with full validation.
    pub fn create_bondwire(
        &mut self,
        name: impl Into<ArcStr>,
        net: Option<NetId>,
        start: BondwireEnd,
        end: BondwireEnd,
        radius: f64,
    ) -> Option<PrimitiveId> {
        let name = name.into();
        if self.find_bondwire_by_name(&name).is_some() {
            tracing::warn!(bondwire = %name, "duplicate bondwire name");
            return None;
        }
        if !self.check_net(net) || !self.check_end(&start) || !self.check_end(&end) {
            return None;
        }
        Some(self.push_primitive(Primitive::Bondwire(Bondwire::new(
            name, net, start, end, radius,
        ))))
    }

    pub(crate) fn check_end(&self, end: &BondwireEnd) -> bool {
        match end {
            BondwireEnd::Layer { layer, .. } => self.check_layer(*layer),
            BondwireEnd::Pin { component, .. } => {
                if self.component(*component).is_none() {
                    tracing::warn!(?component, "no such component");
                    return false;
                }
                true
            }
        }
    }

    /// Returns the primitive with the given ID.
    pub fn primitive(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.primitives.get(id.index())
    }

    /// Returns the primitive with the given ID mutably.
    pub fn primitive_mut(&mut self, id: PrimitiveId) -> Option<&mut Primitive> {
        self.primitives.get_mut(id.index())
    }

    /// The primitives in creation order.
    pub fn primitives(&self) -> impl ExactSizeIterator<Item = (PrimitiveId, &Primitive)> {
        self.primitives
            .iter()
            .enumerate()
            .map(|(i, p)| (PrimitiveId::from_index(i), p))
    }

    /// The number of primitives.
    pub fn num_primitives(&self) -> usize {
        self.primitives.len()
    }

    /// The bondwires in creation order.
    pub fn bondwires(&self) -> impl Iterator<Item = (PrimitiveId, &Bondwire)> {
        self.primitives()
            .filter_map(|(id, p)| p.as_bondwire().map(|b| (id, b)))
    }

    /// The shapes in creation order.
    pub fn geometries(&self) -> impl Iterator<Item = (PrimitiveId, &Geometry2D)> {
        self.primitives()
            .filter_map(|(id, p)| p.as_geometry().map(|g| (id, g)))
    }

    /// Finds a bondwire by name.
    pub fn find_bondwire_by_name(&self, name: &str) -> Option<PrimitiveId> {
        self.bondwires()
            .find(|(_, b)| b.name() == name)
            .map(|(id, _)| id)
    }

    /// Returns the bondwire with the given ID mutably.
    pub fn bondwire_mut(&mut self, id: PrimitiveId) -> Option<&mut Bondwire> {
        self.primitive_mut(id).and_then(Primitive::as_bondwire_mut)
    }

    /// Places a padstack.
    ///
    /// Returns `None` if the name is taken or a layer or the net does not exist.
    #[allow(clippy::too_many_arguments)]
    pub fn create_padstack_inst(
        &mut self,
        name: impl Into<ArcStr>,
        def: PadstackDefId,
        top_layer: LayerId,
        bot_layer: LayerId,
        net: Option<NetId>,
        transform: Transformation,
        is_layout_pin: bool,
    ) -> Option<PadstackInstId> {
        let name = name.into();
        if self.find_padstack_inst_by_name(&name).is_some() {
            tracing::warn!(padstack = %name, "duplicate padstack instance name");
            return None;
        }
        if !self.check_layer(top_layer) || !self.check_layer(bot_layer) || !self.check_net(net) {
            return None;
        }
        self.padstack_insts.push(PadstackInst {
            name,
            def,
            top_layer,
            bot_layer,
            net,
            transform,
            is_layout_pin,
        });
        Some(PadstackInstId::from_index(self.padstack_insts.len() - 1))
    }

    /// Returns the padstack instance with the given ID.
    pub fn padstack_inst(&self, id: PadstackInstId) -> Option<&PadstackInst> {
        self.padstack_insts.get(id.index())
    }

    /// The padstack instances in creation order.
    pub fn padstack_insts(&self) -> impl ExactSizeIterator<Item = (PadstackInstId, &PadstackInst)> {
        self.padstack_insts
            .iter()
            .enumerate()
            .map(|(i, p)| (PadstackInstId::from_index(i), p))
    }

    /// Finds a padstack instance by name.
    pub fn find_padstack_inst_by_name(&self, name: &str) -> Option<PadstackInstId> {
        self.padstack_insts
            .iter()
            .position(|p| p.name == name)
            .map(PadstackInstId::from_index)
    }

    pub(crate) fn push_padstack_inst(&mut self, inst: PadstackInst) {
        self.padstack_insts.push(inst);
    }

    /// Places a component on a layer.
    ///
    /// Returns `None` if the name is taken or the layer does not exist. The definition
    /// is not checked here; see [`Database::create_component`](crate::database::Database::create_component).
    pub fn create_component(
        &mut self,
        name: impl Into<ArcStr>,
        def: ComponentDefId,
        layer: LayerId,
        transform: Transformation,
        flipped: bool,
    ) -> Option<ComponentId> {
        let name = name.into();
        if self.components.contains_key(&name) {
            tracing::warn!(component = %name, "duplicate component name");
            return None;
        }
        if !self.check_layer(layer) {
            return None;
        }
        let comp = Component::new(name.clone(), def, layer, transform, flipped);
        let (index, _) = self.components.insert_full(name, comp);
        Some(ComponentId::from_index(index))
    }

    pub(crate) fn push_component(&mut self, comp: Component) -> ComponentId {
        let (index, _) = self.components.insert_full(comp.name().clone(), comp);
        ComponentId::from_index(index)
    }

    /// Returns the component with the given ID.
    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get_index(id.index()).map(|(_, c)| c)
    }

    /// Returns the component with the given ID mutably.
    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components.get_index_mut(id.index()).map(|(_, c)| c)
    }

    /// The components in creation order.
    pub fn components(&self) -> impl ExactSizeIterator<Item = (ComponentId, &Component)> {
        self.components
            .values()
            .enumerate()
            .map(|(i, c)| (ComponentId::from_index(i), c))
    }

    /// Finds a component of this layout by its full name.
    ///
    /// Components copied up by flattening are named `inst/component`.
    pub fn find_component_by_name(&self, name: &str) -> Option<ComponentId> {
        self.components.get_index_of(name).map(ComponentId::from_index)
    }

    /// The number of components.
    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    pub(crate) fn insert_cell_inst(&mut self, inst: CellInst) -> Option<CellInstId> {
        if self.cell_insts.contains_key(inst.name()) {
            tracing::warn!(inst = %inst.name(), "duplicate cell instance name");
            return None;
        }
        let (index, _) = self.cell_insts.insert_full(inst.name().clone(), inst);
        Some(CellInstId::from_index(index))
    }

    /// Returns the cell instance with the given ID.
    pub fn cell_inst(&self, id: CellInstId) -> Option<&CellInst> {
        self.cell_insts.get_index(id.index()).map(|(_, c)| c)
    }

    /// Returns the cell instance with the given ID mutably.
    pub fn cell_inst_mut(&mut self, id: CellInstId) -> Option<&mut CellInst> {
        self.cell_insts.get_index_mut(id.index()).map(|(_, c)| c)
    }

    /// The cell instances in creation order.
    pub fn cell_insts(&self) -> impl ExactSizeIterator<Item = (CellInstId, &CellInst)> {
        self.cell_insts
            .values()
            .enumerate()
            .map(|(i, c)| (CellInstId::from_index(i), c))
    }

    /// Finds a cell instance by name.
    pub fn find_cell_inst_by_name(&self, name: &str) -> Option<CellInstId> {
        self.cell_insts.get_index_of(name).map(CellInstId::from_index)
    }

    /// The number of cell instances.
    pub fn num_cell_insts(&self) -> usize {
        self.cell_insts.len()
    }

    /// Returns `true` if the layout instantiates no other cells.
    pub fn is_flat(&self) -> bool {
        self.cell_insts.is_empty()
    }

    pub(crate) fn clear_cell_insts(&mut self) {
        self.cell_insts.clear();
    }

    pub(crate) fn push_primitive_raw(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    pub(crate) fn insert_net_raw(&mut self, name: ArcStr) -> NetId {
        let (index, _) = self.nets.insert_full(name.clone(), Net { name });
        NetId::from_index(index)
    }

    pub(crate) fn contains_component_name(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub(crate) fn contains_net_name(&self, name: &str) -> bool {
        self.nets.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerType;

    fn two_layers() -> (Layout, LayerId, LayerId) {
        let mut layout = Layout::new();
        let bot = layout
            .append_layer(Layer::new("BotCu", LayerType::Conducting, -0.3, 3., "Cu", "Air"))
            .unwrap();
        let top = layout
            .append_layer(Layer::new("TopCu", LayerType::Conducting, 0., 0.3, "Cu", "Air"))
            .unwrap();
        (layout, top, bot)
    }

    #[test]
    fn duplicate_names_return_none() {
        let (mut layout, top, _) = two_layers();
        assert!(layout
            .append_layer(Layer::new("TopCu", LayerType::Dielectric, 1., 1., "", ""))
            .is_none());
        let gnd = layout.create_net("GND").unwrap();
        assert!(layout.create_net("GND").is_none());
        assert_eq!(layout.find_net_by_name("GND"), Some(gnd));

        let comp = layout.create_component(
            "U1",
            ComponentDefId::from_index(0),
            top,
            Transformation::identity(),
            false,
        );
        assert!(comp.is_some());
        assert!(layout
            .create_component("U1", ComponentDefId::from_index(0), top, Transformation::identity(), false)
            .is_none());
        assert_eq!(layout.num_components(), 1);
    }

    #[test]
    fn unresolved_references_return_none() {
        let (mut layout, top, _) = two_layers();
        let rect = Rect::from_sides(0, 0, 10, 10);
        assert!(layout
            .create_geometry_2d(LayerId::from_raw(7), None, rect)
            .is_none());
        assert!(layout
            .create_geometry_2d(top, Some(NetId::from_index(3)), rect)
            .is_none());
        assert!(layout.create_geometry_2d(top, None, rect).is_some());

        let end = BondwireEnd::Pin {
            component: ComponentId::from_index(0),
            pin: "G".into(),
        };
        let start = BondwireEnd::Layer {
            layer: top,
            point: Point::zero(),
            flipped: false,
        };
        assert!(layout.create_bondwire("bw", None, start.clone(), end, 0.15).is_none());
        assert!(layout
            .create_bondwire("bw", None, start.clone(), start.clone(), 0.15)
            .is_some());
        assert!(layout.create_bondwire("bw", None, start.clone(), start, 0.15).is_none());
        assert_eq!(layout.num_primitives(), 2);
        assert_eq!(layout.bondwires().count(), 1);
    }

    #[test]
    fn stackup_is_sorted_top_first() {
        let (layout, top, bot) = two_layers();
        assert_eq!(layout.stackup_layers(), vec![top, bot]);
    }
}
