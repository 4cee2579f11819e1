//! Named materials with constant or temperature-dependent properties.
//!
//! Temperature-dependent properties are evaluated at absolute temperatures in Kelvin.

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

/// Conversion offset between Celsius and Kelvin.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Converts a temperature in Celsius to Kelvin.
#[inline]
pub fn celsius_to_kelvin(t: f64) -> f64 {
    t + KELVIN_OFFSET
}

/// Converts a temperature in Kelvin to Celsius.
#[inline]
pub fn kelvin_to_celsius(t: f64) -> f64 {
    t - KELVIN_OFFSET
}

/// The phase of a material.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MaterialType {
    /// A solid.
    #[default]
    Solid,
    /// A fluid.
    Fluid,
}

/// Identifies a material property.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MaterialPropId {
    /// Thermal conductivity in W/(m·K).
    ThermalConductivity,
    /// Specific heat in J/(kg·K).
    SpecificHeat,
    /// Mass density in kg/m³.
    MassDensity,
    /// Electrical resistivity in Ω·m.
    Resistivity,
}

impl MaterialPropId {
    /// All property identifiers.
    pub const ALL: [MaterialPropId; 4] = [
        MaterialPropId::ThermalConductivity,
        MaterialPropId::SpecificHeat,
        MaterialPropId::MassDensity,
        MaterialPropId::Resistivity,
    ];
}

/// The value of a material property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaterialProp {
    /// A constant, isotropic value.
    Simple(f64),
    /// A constant value per axis (x, y, z).
    Anisotropic([f64; 3]),
    /// Polynomial coefficients in ascending powers of temperature in Kelvin.
    ///
    /// One row gives an isotropic property; three rows give x, y and z.
    Polynomial(Vec<Vec<f64>>),
    /// Piecewise-linear `(kelvin, value)` samples, clamped outside the sampled range.
    Table(Vec<(f64, f64)>),
}

impl MaterialProp {
    /// Evaluates the property per axis at temperature `kelvin`.
    ///
    /// Isotropic properties return the same value for every axis.
    pub fn anisotropic_value(&self, kelvin: f64) -> [f64; 3] {
        match self {
            MaterialProp::Simple(v) => [*v; 3],
            MaterialProp::Anisotropic(v) => *v,
            MaterialProp::Polynomial(rows) => match rows.len() {
                0 => [0.; 3],
                1 | 2 => [polyval(&rows[0], kelvin); 3],
                _ => [
                    polyval(&rows[0], kelvin),
                    polyval(&rows[1], kelvin),
                    polyval(&rows[2], kelvin),
                ],
            },
            MaterialProp::Table(samples) => [interpolate(samples, kelvin); 3],
        }
    }

    /// Evaluates the property as a scalar at temperature `kelvin`.
    ///
    /// Anisotropic properties return the mean of their axis values.
    pub fn simple_value(&self, kelvin: f64) -> f64 {
        match self {
            MaterialProp::Simple(v) => *v,
            other => {
                let v = other.anisotropic_value(kelvin);
                (v[0] + v[1] + v[2]) / 3.
            }
        }
    }

    /// Returns `true` if the value varies with temperature.
    pub fn is_temperature_dependent(&self) -> bool {
        match self {
            MaterialProp::Simple(_) | MaterialProp::Anisotropic(_) => false,
            MaterialProp::Polynomial(rows) => rows.iter().any(|r| r.len() > 1),
            MaterialProp::Table(samples) => samples.len() > 1,
        }
    }
}

fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0., |acc, c| acc * x + c)
}

/// Linear interpolation over samples sorted by their first element, clamped at both ends.
pub(crate) fn interpolate(samples: &[(f64, f64)], x: f64) -> f64 {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return 0.;
    };
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }
    for w in samples.windows(2) {
        let ((x0, y0), (x1, y1)) = (w[0], w[1]);
        if x <= x1 {
            if x1 == x0 {
                return y1;
            }
            return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
        }
    }
    last.1
}

/// A named material definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDef {
    name: ArcStr,
    kind: MaterialType,
    thermal_conductivity: Option<MaterialProp>,
    specific_heat: Option<MaterialProp>,
    mass_density: Option<MaterialProp>,
    resistivity: Option<MaterialProp>,
}

impl MaterialDef {
    /// Creates a solid material with no properties set.
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            kind: MaterialType::Solid,
            thermal_conductivity: None,
            specific_heat: None,
            mass_density: None,
            resistivity: None,
        }
    }

    /// The material name.
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The material phase.
    pub fn material_type(&self) -> MaterialType {
        self.kind
    }

    /// Sets the material phase.
    pub fn set_material_type(&mut self, kind: MaterialType) -> &mut Self {
        self.kind = kind;
        self
    }

    /// Sets a property value, replacing any previous value.
    pub fn set_property(&mut self, id: MaterialPropId, prop: MaterialProp) -> &mut Self {
        *self.slot_mut(id) = Some(prop);
        self
    }

    /// Returns the value of a property, if set.
    pub fn property(&self, id: MaterialPropId) -> Option<&MaterialProp> {
        match id {
            MaterialPropId::ThermalConductivity => self.thermal_conductivity.as_ref(),
            MaterialPropId::SpecificHeat => self.specific_heat.as_ref(),
            MaterialPropId::MassDensity => self.mass_density.as_ref(),
            MaterialPropId::Resistivity => self.resistivity.as_ref(),
        }
    }

    /// Evaluates a scalar property at temperature `kelvin`, if set.
    pub fn simple_property(&self, id: MaterialPropId, kelvin: f64) -> Option<f64> {
        self.property(id).map(|p| p.simple_value(kelvin))
    }

    /// Evaluates a per-axis property at temperature `kelvin`, if set.
    pub fn anisotropic_property(&self, id: MaterialPropId, kelvin: f64) -> Option<[f64; 3]> {
        self.property(id).map(|p| p.anisotropic_value(kelvin))
    }

    /// Returns `true` if any set property varies with temperature.
    pub fn is_temperature_dependent(&self) -> bool {
        MaterialPropId::ALL
            .iter()
            .filter_map(|id| self.property(*id))
            .any(MaterialProp::is_temperature_dependent)
    }

    fn slot_mut(&mut self, id: MaterialPropId) -> &mut Option<MaterialProp> {
        match id {
            MaterialPropId::ThermalConductivity => &mut self.thermal_conductivity,
            MaterialPropId::SpecificHeat => &mut self.specific_heat,
            MaterialPropId::MassDensity => &mut self.mass_density,
            MaterialPropId::Resistivity => &mut self.resistivity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn copper_polynomial_matches_room_temperature_conductivity() {
        let k = MaterialProp::Polynomial(vec![vec![
            437.6, -0.165, 1.825e-4, -1.427e-7, 3.979e-11,
        ]]);
        let v = k.simple_value(celsius_to_kelvin(25.));
        assert!(v > 390. && v < 410., "{v}");
        assert!(k.is_temperature_dependent());
        assert_eq!(k.anisotropic_value(300.)[0], k.anisotropic_value(300.)[2]);
    }

    #[test]
    fn table_interpolates_and_clamps() {
        let t = MaterialProp::Table(vec![(300., 10.), (400., 20.)]);
        assert_relative_eq!(t.simple_value(350.), 15.);
        assert_relative_eq!(t.simple_value(100.), 10.);
        assert_relative_eq!(t.simple_value(900.), 20.);
    }

    #[test]
    fn material_reports_temperature_dependence() {
        let mut sic = MaterialDef::new("SiC");
        sic.set_property(MaterialPropId::ThermalConductivity, MaterialProp::Simple(370.))
            .set_property(MaterialPropId::MassDensity, MaterialProp::Simple(3210.));
        assert!(!sic.is_temperature_dependent());
        assert_eq!(
            sic.simple_property(MaterialPropId::MassDensity, 300.),
            Some(3210.)
        );
        assert_eq!(sic.property(MaterialPropId::Resistivity), None);
        sic.set_property(
            MaterialPropId::SpecificHeat,
            MaterialProp::Polynomial(vec![vec![500., 1.]]),
        );
        assert!(sic.is_temperature_dependent());
    }
}
