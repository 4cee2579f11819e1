//! Resolving cell instance hierarchies into flat layouts.
//!
//! Flattening walks the instance tree top-down, composing instance transforms
//! along the way and applying the composed transform once to each leaf object.
//! Objects on a layer with no counterpart in the top-level stackup are dropped.

use arcstr::ArcStr;
use geometry::prelude::*;

use crate::cell::CellId;
use crate::component::ComponentId;
use crate::database::Database;
use crate::layer::LayerId;
use crate::layout::{CellInst, Layout, NetId};
use crate::primitive::{BondwireEnd, Primitive};

/// What [`Database::flatten`] does with the source hierarchy.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FlattenOption {
    /// Replace the cell's layout with its flattened form, discarding the hierarchy.
    InPlace,
    /// Keep the hierarchy and cache a flattened copy on the cell.
    #[default]
    Snapshot,
}

/// Translation tables from the ids of one layout to the ids of the flat layout.
struct IdTables {
    layers: Vec<Option<LayerId>>,
    nets: Vec<Option<NetId>>,
    components: Vec<Option<ComponentId>>,
}

impl IdTables {
    fn layer(&self, id: LayerId) -> Option<LayerId> {
        self.layers.get(id.index()).copied().flatten()
    }

    fn net(&self, id: Option<NetId>) -> Option<NetId> {
        id.and_then(|id| self.nets.get(id.index()).copied().flatten())
    }

    fn component(&self, id: ComponentId) -> Option<ComponentId> {
        self.components.get(id.index()).copied().flatten()
    }
}

impl Database {
    /// Flattens a cell.
    ///
    /// Returns `None` if the cell does not exist or its hierarchy is cyclic.
    pub fn flatten(&mut self, cell: CellId, option: FlattenOption) -> Option<&Layout> {
        match option {
            FlattenOption::InPlace => {
                if !self.layout(cell)?.is_flat() {
                    let flat = self.flattened(cell)?;
                    self.replace_layout(cell, flat);
                }
                self.layout(cell)
            }
            FlattenOption::Snapshot => {
                if self.try_cell(cell)?.flattened_layout().is_none() {
                    let flat = self.flattened(cell)?;
                    self.cell_entry_mut(cell)?.set_flattened(flat);
                }
                self.try_cell(cell)?.flattened_layout()
            }
        }
    }

    /// Returns a flattened copy of a cell's layout without modifying the database.
    ///
    /// Objects copied up from an instance are named `inst<sep>name`, with `<sep>` the
    /// database's hierarchical separator. Flattening a layout with no cell instances
    /// returns an identical copy.
    pub fn flattened(&self, cell: CellId) -> Option<Layout> {
        let entry = self.try_cell(cell)?;
        let top = entry.layout();
        let _span = tracing::debug_span!("flatten", cell = %entry.name()).entered();
        if top.is_flat() {
            return Some(top.clone());
        }

        let mut flat = top.clone();
        flat.clear_cell_insts();
        let tables = IdTables {
            layers: (0..top.num_layers()).map(|i| Some(LayerId::from_raw(i))).collect(),
            nets: (0..top.num_nets()).map(|i| Some(NetId::from_index(i))).collect(),
            components: (0..top.num_components())
                .map(|i| Some(ComponentId::from_index(i)))
                .collect(),
        };
        let mut path = vec![cell];
        for (_, inst) in top.cell_insts() {
            self.flatten_inst(
                &mut flat,
                top,
                &tables,
                inst,
                Transformation::identity(),
                "",
                &mut path,
            )?;
        }
        tracing::debug!(
            primitives = flat.num_primitives(),
            components = flat.num_components(),
            "flattened layout"
        );
        Some(flat)
    }

    #[allow(clippy::too_many_arguments)]
    fn flatten_inst(
        &self,
        flat: &mut Layout,
        parent: &Layout,
        parent_tables: &IdTables,
        inst: &CellInst,
        parent_trans: Transformation,
        prefix: &str,
        path: &mut Vec<CellId>,
    ) -> Option<()> {
        if path.contains(&inst.def()) {
            tracing::error!(inst = %inst.name(), "cyclic cell hierarchy");
            return None;
        }
        let child = self.layout(inst.def())?;
        let trans = Transformation::cascade(parent_trans, *inst.transform());
        let prefix = format!("{prefix}{}{}", inst.name(), self.hier_sep());
        let map = inst.layer_map().and_then(|id| self.layer_map(id));

        let layers = child
            .layers()
            .map(|(id, layer)| {
                let local = match map {
                    Some(map) => map.mapping_forward(id),
                    None => parent.find_layer_by_name(layer.name()),
                };
                let target = local.and_then(|l| parent_tables.layer(l));
                if target.is_none() {
                    tracing::debug!(inst = %inst.name(), layer = %layer.name(), "layer has no mapping");
                }
                target
            })
            .collect();
        let nets = child
            .nets()
            .map(|(_, net)| {
                let name = unique_name(&format!("{prefix}{}", net.name()), |n| {
                    flat.contains_net_name(n)
                });
                Some(flat.insert_net_raw(name))
            })
            .collect();
        let mut tables = IdTables {
            layers,
            nets,
            components: Vec::with_capacity(child.num_components()),
        };

        for (_, comp) in child.components() {
            let Some(layer) = tables.layer(comp.layer()) else {
                tracing::debug!(component = %comp.name(), "dropping component on unmapped layer");
                tables.components.push(None);
                continue;
            };
            let mut comp = comp.clone();
            let name = unique_name(&format!("{prefix}{}", comp.name()), |n| {
                flat.contains_component_name(n)
            });
            comp.set_name(name);
            comp.set_layer(layer);
            comp.set_transform(Transformation::cascade(trans, *comp.transform()));
            tables.components.push(Some(flat.push_component(comp)));
        }

        for (id, prim) in child.primitives() {
            match copy_primitive(prim, &tables, trans, &prefix, flat) {
                Some(prim) => flat.push_primitive_raw(prim),
                None => tracing::debug!(primitive = ?id, "dropping unmapped primitive"),
            }
        }

        for (_, pad) in child.padstack_insts() {
            let (Some(top), Some(bot)) = (tables.layer(pad.top_layer), tables.layer(pad.bot_layer))
            else {
                tracing::debug!(padstack = %pad.name, "dropping padstack on unmapped layer");
                continue;
            };
            let mut pad = pad.clone();
            pad.name = unique_name(&format!("{prefix}{}", pad.name), |n| {
                flat.find_padstack_inst_by_name(n).is_some()
            });
            pad.top_layer = top;
            pad.bot_layer = bot;
            pad.net = tables.net(pad.net);
            pad.transform = Transformation::cascade(trans, pad.transform);
            flat.push_padstack_inst(pad);
        }

        if let Some(boundary) = child.boundary() {
            merge_boundary(flat, boundary.clone().transform(trans));
        }

        path.push(inst.def());
        for (_, sub) in child.cell_insts() {
            self.flatten_inst(flat, child, &tables, sub, trans, &prefix, path)?;
        }
        path.pop();
        Some(())
    }
}

fn copy_primitive(
    prim: &Primitive,
    tables: &IdTables,
    trans: Transformation,
    prefix: &str,
    flat: &Layout,
) -> Option<Primitive> {
    match prim {
        Primitive::Geometry(geom) => {
            let mut geom = geom.clone();
            geom.layer = tables.layer(geom.layer)?;
            geom.net = tables.net(geom.net);
            geom.shape.transform_mut(trans);
            Some(Primitive::Geometry(geom))
        }
        Primitive::Text(text) => {
            let mut text = text.clone();
            if let Some(layer) = text.layer {
                text.layer = Some(tables.layer(layer)?);
            }
            text.transform = Transformation::cascade(trans, text.transform);
            Some(Primitive::Text(text))
        }
        Primitive::Bondwire(wire) => {
            let mut wire = wire.clone();
            let start = copy_end(wire.start(), tables, trans)?;
            let end = copy_end(wire.end(), tables, trans)?;
            wire.set_start(start);
            wire.set_end(end);
            wire.set_net(tables.net(wire.net()));
            let name = unique_name(&format!("{prefix}{}", wire.name()), |n| {
                flat.find_bondwire_by_name(n).is_some()
            });
            wire.set_name(name);
            Some(Primitive::Bondwire(wire))
        }
    }
}

fn copy_end(end: &BondwireEnd, tables: &IdTables, trans: Transformation) -> Option<BondwireEnd> {
    Some(match end {
        BondwireEnd::Layer {
            layer,
            point,
            flipped,
        } => BondwireEnd::Layer {
            layer: tables.layer(*layer)?,
            point: point.transform(trans),
            flipped: *flipped,
        },
        BondwireEnd::Pin { component, pin } => BondwireEnd::Pin {
            component: tables.component(*component)?,
            pin: pin.clone(),
        },
    })
}

/// Grows the flat boundary to the bounding box of both outlines if `other` sticks out.
fn merge_boundary(flat: &mut Layout, other: Shape) {
    let merged = match flat.boundary() {
        None => Some(other),
        Some(current) => match (current.bbox(), other.bbox()) {
            (Some(a), Some(b)) if a.union(b) != a => Some(Shape::Rect(a.union(b))),
            _ => None,
        },
    };
    if let Some(boundary) = merged {
        flat.set_boundary_option(Some(boundary));
    }
}

/// Returns `base`, or `base_<n>` for the smallest `n` that is not taken.
fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> ArcStr {
    if !taken(base) {
        return ArcStr::from(base);
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken(&candidate) {
            return ArcStr::from(candidate);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests;
