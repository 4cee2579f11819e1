//! The prism thermal model.
//!
//! A model is the geometric half of a thermal network: prisms extruded from 2-D meshes
//! over horizontal slabs, bondwire line elements, and how they touch. It holds material
//! and source *names* only, so the same model serves any set of material properties, loss
//! curves, currents and boundary values. All lengths are in user units.

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::mesh::Mesh2D;

/// A horizontal slice of the stack sharing one mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slab {
    /// The bottom elevation.
    pub bot: f64,
    /// The top elevation.
    pub top: f64,
    /// The mesh the slab is extruded from.
    pub mesh: usize,
    /// The prism extruded from each triangle, if the triangle is filled in this slab.
    pub prisms: Vec<Option<usize>>,
}

impl Slab {
    /// The slab thickness.
    pub fn thickness(&self) -> f64 {
        self.top - self.bot
    }
}

/// A triangular prism of one material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prism {
    /// The owning slab.
    pub slab: usize,
    /// The triangle of the slab mesh.
    pub triangle: usize,
    /// The material, as an index into [`PrismThermalModel::materials`].
    pub material: usize,
    /// The component body the prism belongs to, as an index into
    /// [`PrismThermalModel::components`].
    pub component: Option<usize>,
    /// The prism across each triangle edge in the same slab.
    pub neighbors: [Option<usize>; 3],
    /// The area of the top face not covered by another prism.
    pub top_exposed: f64,
    /// The area of the bottom face not covered by another prism.
    pub bot_exposed: f64,
}

/// A vertical contact between a prism and the prism below it.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// The upper prism.
    pub upper: usize,
    /// The lower prism.
    pub lower: usize,
    /// The shared area.
    pub area: f64,
}

/// A straight piece of bondwire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineElement {
    /// The bondwire, as an index into [`PrismThermalModel::bondwires`].
    pub bondwire: usize,
    /// The start point.
    pub start: [f64; 3],
    /// The end point.
    pub end: [f64; 3],
    /// The wire radius.
    pub radius: f64,
    /// The material, as an index into [`PrismThermalModel::materials`].
    pub material: usize,
    /// The preceding element of the same wire.
    pub prev: Option<usize>,
    /// The prism the element is bonded to, for the first and last element of a wire.
    pub anchors: Vec<usize>,
}

impl LineElement {
    /// The element length.
    pub fn length(&self) -> f64 {
        let d: f64 = (0..3).map(|i| (self.end[i] - self.start[i]).powi(2)).sum();
        d.sqrt()
    }

    /// The cross-section area.
    pub fn section(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }
}

/// A meshed, material-annotated package stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrismThermalModel {
    /// The length of one user unit in meters.
    pub unit_to_meter: f64,
    /// The 2-D meshes slabs are extruded from.
    pub meshes: Vec<Mesh2D>,
    /// The slabs from the bottom of the stack up.
    pub slabs: Vec<Slab>,
    /// The prisms. Node `i < prisms.len()` of a network is prism `i`.
    pub prisms: Vec<Prism>,
    /// Vertical contacts between prisms.
    pub contacts: Vec<Contact>,
    /// The bondwire elements. They follow the prisms in network node order.
    pub lines: Vec<LineElement>,
    /// The material names referenced by elements.
    pub materials: Vec<ArcStr>,
    /// The component names referenced by prisms.
    pub components: Vec<ArcStr>,
    /// The bondwire names referenced by line elements.
    pub bondwires: Vec<ArcStr>,
}

impl PrismThermalModel {
    /// The number of network nodes.
    pub fn num_nodes(&self) -> usize {
        self.prisms.len() + self.lines.len()
    }

    /// The mesh and triangle of prism `p`.
    fn mesh_of(&self, p: usize) -> (&Mesh2D, usize) {
        let prism = &self.prisms[p];
        (&self.meshes[self.slabs[prism.slab].mesh], prism.triangle)
    }

    /// The footprint area of prism `p`.
    pub fn prism_area(&self, p: usize) -> f64 {
        let (mesh, t) = self.mesh_of(p);
        mesh.area(t)
    }

    /// The height of prism `p`.
    pub fn prism_height(&self, p: usize) -> f64 {
        self.slabs[self.prisms[p].slab].thickness()
    }

    /// The volume of prism `p`.
    pub fn prism_volume(&self, p: usize) -> f64 {
        self.prism_area(p) * self.prism_height(p)
    }

    /// The center of prism `p`.
    pub fn prism_center(&self, p: usize) -> [f64; 3] {
        let (mesh, t) = self.mesh_of(p);
        let [x, y] = mesh.centroid(t);
        let slab = &self.slabs[self.prisms[p].slab];
        [x, y, (slab.bot + slab.top) / 2.]
    }

    /// The six corners of prism `p`, bottom triangle first.
    pub fn prism_corners(&self, p: usize) -> [[f64; 3]; 6] {
        let (mesh, t) = self.mesh_of(p);
        let v = mesh.vertices(t);
        let slab = &self.slabs[self.prisms[p].slab];
        let at = |i: usize, z: f64| [v[i][0], v[i][1], z];
        [
            at(0, slab.bot),
            at(1, slab.bot),
            at(2, slab.bot),
            at(0, slab.top),
            at(1, slab.top),
            at(2, slab.top),
        ]
    }

    /// Finds the prism containing `p`.
    ///
    /// Points on a face shared by two slabs resolve to the upper slab when it has a prism there.
    pub fn locate(&self, p: [f64; 3]) -> Option<usize> {
        let tol = 1e-9 * (1. + p[2].abs());
        self.slabs
            .iter()
            .rev()
            .filter(|s| s.bot - tol <= p[2] && p[2] <= s.top + tol)
            .find_map(|s| {
                let mesh = &self.meshes[s.mesh];
                (0..mesh.num_triangles())
                    .filter(|&t| s.prisms[t].is_some())
                    .find(|&t| mesh.bbox(t).contains([p[0], p[1]]) && mesh.contains(t, [p[0], p[1]]))
                    .and_then(|t| s.prisms[t])
            })
    }

    /// The total volume of all prisms.
    pub fn total_volume(&self) -> f64 {
        (0..self.prisms.len()).map(|p| self.prism_volume(p)).sum()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use approx::assert_relative_eq;

    use super::*;

    /// Two stacked slabs over a unit square split into two triangles.
    pub(crate) fn two_slabs() -> PrismThermalModel {
        let mesh = Mesh2D {
            points: vec![[0., 0.], [1., 0.], [1., 1.], [0., 1.]],
            triangles: vec![[0, 1, 2], [0, 2, 3]],
        };
        let prism = |slab, triangle, neighbors, top_exposed, bot_exposed| Prism {
            slab,
            triangle,
            material: 0,
            component: None,
            neighbors,
            top_exposed,
            bot_exposed,
        };
        PrismThermalModel {
            unit_to_meter: 1e-3,
            meshes: vec![mesh],
            slabs: vec![
                Slab {
                    bot: 0.,
                    top: 1.,
                    mesh: 0,
                    prisms: vec![Some(0), Some(1)],
                },
                Slab {
                    bot: 1.,
                    top: 3.,
                    mesh: 0,
                    prisms: vec![Some(2), None],
                },
            ],
            prisms: vec![
                prism(0, 0, [None, None, Some(1)], 0., 0.5),
                prism(0, 1, [Some(0), None, None], 0.5, 0.5),
                prism(1, 0, [None, None, None], 0.5, 0.),
            ],
            contacts: vec![Contact {
                upper: 2,
                lower: 0,
                area: 0.5,
            }],
            lines: Vec::new(),
            materials: vec![arcstr::literal!("Cu")],
            components: Vec::new(),
            bondwires: Vec::new(),
        }
    }

    #[test]
    fn prism_geometry() {
        let model = two_slabs();
        assert_eq!(model.num_nodes(), 3);
        assert_relative_eq!(model.prism_area(0), 0.5);
        assert_relative_eq!(model.prism_volume(2), 1.);
        assert_relative_eq!(model.total_volume(), 2.);
        let c = model.prism_center(2);
        assert_relative_eq!(c[2], 2.);
        assert_relative_eq!(c[0], 2. / 3., epsilon = 1e-12);
        assert_eq!(model.prism_corners(1)[5], [0., 1., 1.]);
    }

    #[test]
    fn points_locate_prisms() {
        let model = two_slabs();
        assert_eq!(model.locate([0.8, 0.2, 0.5]), Some(0));
        assert_eq!(model.locate([0.2, 0.8, 0.5]), Some(1));
        // the shared face resolves upward where a prism exists
        assert_eq!(model.locate([0.8, 0.2, 1.]), Some(2));
        assert_eq!(model.locate([0.2, 0.8, 1.]), Some(1));
        assert_eq!(model.locate([0.2, 0.8, 2.]), None);
        assert_eq!(model.locate([2., 2., 0.5]), None);
    }
}
