//! Thermal networks: conductances, capacities, sources and boundary links of a model
//! evaluated at a temperature field.

use ecad::component::LossPowerTable;
use ecad::database::Database;
use ecad::layout::Layout;
use ecad::material::{celsius_to_kelvin, kelvin_to_celsius, MaterialDef, MaterialPropId};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::model::PrismThermalModel;
use crate::settings::{
    BoundaryCondition, BoundaryConditionType, Orientation, PrismExtractionSettings,
};

/// A conductance between two nodes.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Edge {
    /// The first node.
    pub a: usize,
    /// The second node.
    pub b: usize,
    /// The conductance in W/K.
    pub conductance: f64,
}

/// Heat dissipated at a node by a scenario.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Source {
    /// The node.
    pub node: usize,
    /// The nominal power in W.
    pub watts: f64,
    /// The scenario scaling this source.
    pub scenario: usize,
}

/// A conductance from a node to a fixed temperature.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Link {
    /// The node.
    pub node: usize,
    /// The conductance in W/K.
    pub conductance: f64,
    /// The fixed temperature in K.
    pub kelvin: f64,
}

/// A linear thermal network in SI units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThermalNetwork {
    /// The number of nodes.
    pub num_nodes: usize,
    /// Conductances between nodes.
    pub edges: Vec<Edge>,
    /// The heat capacity of each node in J/K.
    pub capacitance: Vec<f64>,
    /// Scenario-scaled heat sources.
    pub sources: Vec<Source>,
    /// Links to fixed temperatures.
    pub links: Vec<Link>,
    /// Constant heat injected at nodes by heat flux boundaries, in W.
    pub heat_flux: Vec<(usize, f64)>,
}

impl ThermalNetwork {
    /// The number of scenarios referenced by sources.
    pub fn num_scenarios(&self) -> usize {
        self.sources.iter().map(|s| s.scenario + 1).max().unwrap_or(0)
    }

    /// The source power per node, with each scenario scaled by `scale`.
    pub fn source_power(&self, scale: impl Fn(usize) -> f64) -> Vec<f64> {
        let mut p = vec![0.; self.num_nodes];
        for s in &self.sources {
            p[s.node] += s.watts * scale(s.scenario);
        }
        p
    }

    /// The power of one scenario per node.
    pub fn scenario_power(&self, scenario: usize) -> Vec<f64> {
        self.source_power(|s| if s == scenario { 1. } else { 0. })
    }

    /// The constant part of the right-hand side: heat flux plus the pull of every link.
    pub fn fixed_power(&self) -> Vec<f64> {
        let mut p = vec![0.; self.num_nodes];
        for &(node, watts) in &self.heat_flux {
            p[node] += watts;
        }
        for link in &self.links {
            p[link.node] += link.conductance * link.kelvin;
        }
        p
    }

    /// The total nominal power of all sources.
    pub fn total_power(&self) -> f64 {
        self.sources.iter().map(|s| s.watts).sum()
    }
}

struct Load<'a> {
    table: &'a LossPowerTable,
    scenario: usize,
}

struct Wire {
    current: f64,
    scenario: usize,
}

/// Evaluates the network of a model at temperature fields.
///
/// Material definitions and loss tables are resolved once; [`NetworkBuilder::build`] can then
/// be called repeatedly as temperatures change.
pub struct NetworkBuilder<'a> {
    model: &'a PrismThermalModel,
    materials: Vec<Option<&'a MaterialDef>>,
    loads: Vec<Option<Load<'a>>>,
    component_volume: Vec<f64>,
    wires: Vec<Option<Wire>>,
    settings: &'a PrismExtractionSettings,
    env_kelvin: f64,
}

impl<'a> NetworkBuilder<'a> {
    /// Resolves the materials and sources of `model`.
    ///
    /// `layout` is the flattened layout the model was extracted from; its loss tables and
    /// currents drive the sources. Materials that no element uses need not be defined.
    pub fn new(
        model: &'a PrismThermalModel,
        db: &'a Database,
        layout: &'a Layout,
        settings: &'a PrismExtractionSettings,
        env_celsius: f64,
    ) -> Result<Self> {
        let mut used = vec![false; model.materials.len()];
        for m in model
            .prisms
            .iter()
            .map(|p| p.material)
            .chain(model.lines.iter().map(|l| l.material))
        {
            used[m] = true;
        }
        let materials = model
            .materials
            .iter()
            .zip(used)
            .map(|(name, used)| match db.find_material_by_name(name) {
                Some(def) => Ok(Some(def)),
                None if used => Err(Error::MissingMaterial(name.clone())),
                None => Ok(None),
            })
            .collect::<Result<Vec<_>>>()?;

        let loads = model
            .components
            .iter()
            .map(|name| {
                let comp = layout
                    .find_component_by_name(name)
                    .and_then(|id| layout.component(id));
                if comp.is_none() {
                    tracing::warn!(component = %name, "component not found; it dissipates no power");
                }
                comp.map(|c| Load {
                    table: c.loss_power(),
                    scenario: c.scenario(),
                })
            })
            .collect();
        let mut component_volume = vec![0.; model.components.len()];
        for (p, prism) in model.prisms.iter().enumerate() {
            if let Some(c) = prism.component {
                component_volume[c] += model.prism_volume(p);
            }
        }
        let wires = model
            .bondwires
            .iter()
            .map(|name| {
                layout
                    .find_bondwire_by_name(name)
                    .and_then(|id| layout.primitive(id))
                    .and_then(|p| p.as_bondwire())
                    .map(|w| Wire {
                        current: w.current(),
                        scenario: w.scenario(),
                    })
            })
            .collect();

        Ok(Self {
            model,
            materials,
            loads,
            component_volume,
            wires,
            settings,
            env_kelvin: celsius_to_kelvin(env_celsius),
        })
    }

    /// The ambient temperature in K.
    pub fn env_kelvin(&self) -> f64 {
        self.env_kelvin
    }

    /// Returns `true` if rebuilding at another temperature changes the network.
    pub fn is_temperature_dependent(&self) -> bool {
        self.materials
            .iter()
            .flatten()
            .any(|m| m.is_temperature_dependent())
            || self
                .loads
                .iter()
                .flatten()
                .any(|l| l.table.samples().len() > 1)
    }

    fn material(&self, m: usize) -> Result<&'a MaterialDef> {
        self.materials[m].ok_or_else(|| Error::MissingMaterial(self.model.materials[m].clone()))
    }

    fn missing(&self, m: usize, property: &'static str) -> Error {
        Error::MissingProperty {
            material: self.model.materials[m].clone(),
            property,
        }
    }

    fn conductivity(&self, m: usize, kelvin: f64) -> Result<[f64; 3]> {
        self.material(m)?
            .anisotropic_property(MaterialPropId::ThermalConductivity, kelvin)
            .ok_or_else(|| self.missing(m, "thermal conductivity"))
    }

    fn volumetric_heat(&self, m: usize, kelvin: f64) -> Result<f64> {
        let def = self.material(m)?;
        let c = def
            .simple_property(MaterialPropId::SpecificHeat, kelvin)
            .ok_or_else(|| self.missing(m, "specific heat"))?;
        let rho = def
            .simple_property(MaterialPropId::MassDensity, kelvin)
            .ok_or_else(|| self.missing(m, "mass density"))?;
        Ok(c * rho)
    }

    fn bc(&self, orientation: Orientation, at: [f64; 2]) -> Option<BoundaryCondition> {
        self.settings
            .block_bcs
            .iter()
            .find(|b| b.orientation == orientation && b.region.contains(at))
            .map(|b| b.bc)
            .or(match orientation {
                Orientation::Top => self.settings.top_uniform_bc,
                Orientation::Bot => self.settings.bot_uniform_bc,
            })
    }

    /// Builds the network with material properties and loss curves evaluated at `kelvin`,
    /// one temperature per node.
    pub fn build(&self, kelvin: &[f64]) -> Result<ThermalNetwork> {
        let _span = tracing::debug_span!("assemble").entered();
        let model = self.model;
        let u = model.unit_to_meter;
        let np = model.prisms.len();

        struct PrismPart {
            edges: Vec<Edge>,
            links: Vec<Link>,
            flux: Vec<(usize, f64)>,
            capacitance: f64,
            source: Option<Source>,
        }

        let parts = (0..np)
            .into_par_iter()
            .map(|p| -> Result<PrismPart> {
                let prism = &model.prisms[p];
                let t = kelvin[p];
                let k = self.conductivity(prism.material, t)?;
                let kxy = (k[0] + k[1]) / 2.;
                let h = model.prism_height(p) * u;
                let slab = &model.slabs[prism.slab];
                let mesh = &model.meshes[slab.mesh];
                let c = mesh.centroid(prism.triangle);

                let mut edges = Vec::new();
                for (e, n) in prism.neighbors.iter().enumerate() {
                    let Some(n) = *n else { continue };
                    if n < p {
                        continue;
                    }
                    let other = &model.prisms[n];
                    let Some(back) = other.neighbors.iter().position(|&x| x == Some(p)) else {
                        continue;
                    };
                    let kn = self.conductivity(other.material, kelvin[n])?;
                    let kn = (kn[0] + kn[1]) / 2.;
                    let area = mesh.edge_length(prism.triangle, e) * u * h;
                    let d = mesh.distance_to_edge(prism.triangle, e, c) * u;
                    let cn = mesh.centroid(other.triangle);
                    let dn = mesh.distance_to_edge(other.triangle, back, cn) * u;
                    let r = d / (kxy * area) + dn / (kn * area);
                    edges.push(Edge {
                        a: p,
                        b: n,
                        conductance: 1. / r,
                    });
                }

                let mut links = Vec::new();
                let mut flux = Vec::new();
                for (orientation, exposed) in [
                    (Orientation::Top, prism.top_exposed),
                    (Orientation::Bot, prism.bot_exposed),
                ] {
                    if exposed <= 0. {
                        continue;
                    }
                    let Some(bc) = self.bc(orientation, c) else {
                        continue;
                    };
                    let area = exposed * u * u;
                    match bc.kind {
                        BoundaryConditionType::Htc => links.push(Link {
                            node: p,
                            conductance: bc.value * area,
                            kelvin: self.env_kelvin,
                        }),
                        BoundaryConditionType::Temperature => links.push(Link {
                            node: p,
                            conductance: 2. * k[2] * area / h,
                            kelvin: celsius_to_kelvin(bc.value),
                        }),
                        BoundaryConditionType::HeatFlux => flux.push((p, bc.value * area)),
                    }
                }

                let volume = model.prism_volume(p) * u * u * u;
                let capacitance = self.volumetric_heat(prism.material, t)? * volume;
                let source = prism.component.and_then(|comp| {
                    let load = self.loads[comp].as_ref()?;
                    let share = model.prism_volume(p) / self.component_volume[comp];
                    Some(Source {
                        node: p,
                        watts: load.table.power(kelvin_to_celsius(t)) * share,
                        scenario: load.scenario,
                    })
                });
                Ok(PrismPart {
                    edges,
                    links,
                    flux,
                    capacitance,
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut net = ThermalNetwork {
            num_nodes: model.num_nodes(),
            ..Default::default()
        };
        for part in parts {
            net.edges.extend(part.edges);
            net.links.extend(part.links);
            net.heat_flux.extend(part.flux);
            net.capacitance.push(part.capacitance);
            net.sources.extend(part.source);
        }

        for c in &model.contacts {
            let (ku, kl) = (
                self.conductivity(model.prisms[c.upper].material, kelvin[c.upper])?,
                self.conductivity(model.prisms[c.lower].material, kelvin[c.lower])?,
            );
            let area = c.area * u * u;
            let r = 0.5 * model.prism_height(c.upper) * u / (ku[2] * area)
                + 0.5 * model.prism_height(c.lower) * u / (kl[2] * area);
            net.edges.push(Edge {
                a: c.upper,
                b: c.lower,
                conductance: 1. / r,
            });
        }

        self.add_lines(&mut net, kelvin)?;
        tracing::debug!(
            nodes = net.num_nodes,
            edges = net.edges.len(),
            links = net.links.len(),
            sources = net.sources.len(),
            "assembled thermal network"
        );
        Ok(net)
    }

    fn add_lines(&self, net: &mut ThermalNetwork, kelvin: &[f64]) -> Result<()> {
        let model = self.model;
        let u = model.unit_to_meter;
        let np = model.prisms.len();
        // half-length resistance of each element
        let mut half = Vec::with_capacity(model.lines.len());
        for (i, line) in model.lines.iter().enumerate() {
            let node = np + i;
            let t = kelvin[node];
            let k = self.conductivity(line.material, t)?;
            let k = (k[0] + k[1] + k[2]) / 3.;
            let (len, area) = (line.length() * u, line.section() * u * u);
            half.push(0.5 * len / (k * area));

            net.capacitance.push(self.volumetric_heat(line.material, t)? * area * len);
            if let Some(prev) = line.prev {
                net.edges.push(Edge {
                    a: np + prev,
                    b: node,
                    conductance: 1. / (half[prev] + half[i]),
                });
            }
            for &anchor in &line.anchors {
                net.edges.push(Edge {
                    a: anchor,
                    b: node,
                    conductance: 1. / half[i],
                });
            }
            let Some(wire) = &self.wires[line.bondwire] else {
                continue;
            };
            if wire.current == 0. {
                continue;
            }
            let rho = self
                .material(line.material)?
                .simple_property(MaterialPropId::Resistivity, t)
                .ok_or_else(|| self.missing(line.material, "resistivity"))?;
            net.sources.push(Source {
                node,
                watts: rho * len * wire.current * wire.current / area,
                scenario: wire.scenario,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ecad::prelude::*;

    use super::*;
    use crate::model::tests::two_slabs;
    use crate::model::LineElement;
    use crate::settings::FRect;

    fn copper() -> Database {
        let mut db = Database::new("net");
        let mut cu = MaterialDef::new("Cu");
        cu.set_property(MaterialPropId::ThermalConductivity, MaterialProp::Simple(400.))
            .set_property(MaterialPropId::SpecificHeat, MaterialProp::Simple(385.))
            .set_property(MaterialPropId::MassDensity, MaterialProp::Simple(8960.))
            .set_property(MaterialPropId::Resistivity, MaterialProp::Simple(1.7e-8));
        db.create_material_def(cu).unwrap();
        db
    }

    fn edge(net: &ThermalNetwork, a: usize, b: usize) -> f64 {
        net.edges
            .iter()
            .filter(|e| (e.a, e.b) == (a, b) || (e.a, e.b) == (b, a))
            .map(|e| e.conductance)
            .sum()
    }

    #[test]
    fn conductances_follow_geometry() {
        let db = copper();
        let layout = Layout::new();
        let model = two_slabs();
        let settings = PrismExtractionSettings::default().with_bot_bc(BoundaryCondition::htc(1000.));
        let builder = NetworkBuilder::new(&model, &db, &layout, &settings, 25.).unwrap();
        assert!(!builder.is_temperature_dependent());
        let net = builder.build(&[298.15; 3]).unwrap();

        assert_eq!(net.num_nodes, 3);
        assert_eq!(net.edges.len(), 2);
        assert_relative_eq!(edge(&net, 0, 1), 1.2, max_relative = 1e-9);
        assert_relative_eq!(edge(&net, 2, 0), 2. / 15., max_relative = 1e-9);
        assert_eq!(net.links.len(), 2);
        for link in &net.links {
            assert_relative_eq!(link.conductance, 5e-4, max_relative = 1e-9);
            assert_relative_eq!(link.kelvin, 298.15);
        }
        assert_relative_eq!(net.capacitance[2], 385. * 8960. * 1e-9, max_relative = 1e-9);
        assert_eq!(net.num_scenarios(), 0);
    }

    #[test]
    fn block_conditions_override_uniform_ones() {
        let db = copper();
        let layout = Layout::new();
        let model = two_slabs();
        let mut settings =
            PrismExtractionSettings::default().with_bot_bc(BoundaryCondition::htc(1000.));
        settings.add_block_bc(
            "cold plate",
            Orientation::Bot,
            FRect::from_sides(0., 0.5, 0.5, 1.),
            BoundaryCondition::temperature(50.),
        );
        settings.add_block_bc(
            "heater",
            Orientation::Top,
            FRect::from_sides(0., 0.5, 0.5, 1.),
            BoundaryCondition::heat_flux(2e4),
        );
        let builder = NetworkBuilder::new(&model, &db, &layout, &settings, 25.).unwrap();
        let net = builder.build(&[298.15; 3]).unwrap();

        let fixed: Vec<_> = net.links.iter().filter(|l| l.node == 1).collect();
        assert_eq!(fixed.len(), 1);
        assert_relative_eq!(fixed[0].kelvin, 323.15);
        assert_relative_eq!(fixed[0].conductance, 0.4, max_relative = 1e-9);
        assert_eq!(net.heat_flux.len(), 1);
        assert_relative_eq!(net.heat_flux[0].1, 2e4 * 5e-7, max_relative = 1e-9);
        let p = net.fixed_power();
        assert_relative_eq!(p[1], 0.4 * 323.15 + 1e-2, max_relative = 1e-9);
    }

    #[test]
    fn components_and_bondwires_dissipate() {
        let mut db = copper();
        let def = db
            .create_component_def(ComponentDef::new(
                "die",
                ComponentType::Ic,
                Rect::from_sides(0, 0, 1_000_000, 1_000_000),
            ))
            .unwrap();
        let cell = db.create_circuit_cell("top").unwrap();
        let layer = db
            .layout_mut(cell)
            .unwrap()
            .append_layer(Layer::new("L", LayerType::Conducting, 1., 1., "Cu", "Cu"))
            .unwrap();
        let comp = db
            .create_component(cell, "U1", def, layer, Transformation::identity(), false)
            .unwrap();
        let layout = db.layout_mut(cell).unwrap();
        layout
            .component_mut(comp)
            .unwrap()
            .set_loss_power(LossPowerTable::constant(10.))
            .set_scenario(1);
        let end = BondwireEnd::Layer {
            layer,
            point: Point::zero(),
            flipped: false,
        };
        let wire = layout
            .create_bondwire("BW", None, end.clone(), end, 0.1)
            .unwrap();
        layout.bondwire_mut(wire).unwrap().set_current(2.);
        let layout = db.layout(cell).unwrap();

        let mut model = two_slabs();
        model.components.push(arcstr::literal!("U1"));
        model.prisms[2].component = Some(0);
        model.bondwires.push(arcstr::literal!("BW"));
        model.lines.push(LineElement {
            bondwire: 0,
            start: [0.5, 0.5, 3.],
            end: [0.5, 0.5, 4.],
            radius: 0.1,
            material: 0,
            prev: None,
            anchors: vec![2],
        });

        let settings = PrismExtractionSettings::default();
        let builder = NetworkBuilder::new(&model, &db, layout, &settings, 25.).unwrap();
        let net = builder.build(&[298.15; 4]).unwrap();

        assert_eq!(net.num_scenarios(), 2);
        assert_relative_eq!(net.scenario_power(1)[2], 10.);
        let area = std::f64::consts::PI * 1e-8;
        assert_relative_eq!(net.scenario_power(0)[3], 1.7e-8 * 1e-3 * 4. / area, max_relative = 1e-9);
        assert_relative_eq!(edge(&net, 2, 3), 400. * area / 0.5e-3, max_relative = 1e-9);
        assert_relative_eq!(net.total_power(), 10. + 6.8e-11 / area, max_relative = 1e-9);
        assert_eq!(net.capacitance.len(), 4);
    }

    #[test]
    fn undefined_materials_are_reported() {
        let db = Database::new("empty");
        let layout = Layout::new();
        let model = two_slabs();
        let settings = PrismExtractionSettings::default();
        let err = NetworkBuilder::new(&model, &db, &layout, &settings, 25.)
            .err()
            .unwrap();
        assert!(matches!(err, Error::MissingMaterial(name) if name == "Cu"));

        let mut db = Database::new("bare");
        db.create_material_def(MaterialDef::new("Cu")).unwrap();
        let builder = NetworkBuilder::new(&model, &db, &layout, &settings, 25.).unwrap();
        let err = builder.build(&[298.15; 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingProperty {
                property: "thermal conductivity",
                ..
            }
        ));
    }
}
