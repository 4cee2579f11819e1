//! Conversion between user units and integer database units.

use serde::{Deserialize, Serialize};

use crate::point::Point;

/// Length units commonly used for package layout.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum LengthUnit {
    /// Nanometer.
    Nanometer,
    /// Micrometer.
    Micrometer,
    /// Millimeter.
    #[default]
    Millimeter,
    /// Meter.
    Meter,
    /// Inch.
    Inch,
    /// One thousandth of an inch.
    Mil,
}

impl LengthUnit {
    /// The length of one unit in meters.
    pub const fn in_meters(&self) -> f64 {
        match self {
            LengthUnit::Nanometer => 1e-9,
            LengthUnit::Micrometer => 1e-6,
            LengthUnit::Millimeter => 1e-3,
            LengthUnit::Meter => 1.,
            LengthUnit::Inch => 0.0254,
            LengthUnit::Mil => 2.54e-5,
        }
    }
}

/// The coordinate unit pair of a database.
///
/// `unit` is the user-facing unit and `precision` is the size of one integer
/// database unit, both expressed in meters.
///
/// # Examples
///
/// ```
/// # use geometry::prelude::*;
/// use geometry::units::LengthUnit;
/// let units = CoordUnits::new(LengthUnit::Millimeter, LengthUnit::Nanometer);
/// assert_eq!(units.to_coord(0.3), 300_000);
/// assert!((units.to_unit(300_000) - 0.3).abs() < 1e-12);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordUnits {
    unit: f64,
    precision: f64,
}

impl Default for CoordUnits {
    fn default() -> Self {
        Self::new(LengthUnit::Millimeter, LengthUnit::Nanometer)
    }
}

impl CoordUnits {
    /// Creates coordinate units from a user unit and a database unit.
    pub fn new(user: LengthUnit, data: LengthUnit) -> Self {
        Self {
            unit: user.in_meters(),
            precision: data.in_meters(),
        }
    }

    /// Creates coordinate units from raw meter scales, returning `None` unless both are positive.
    pub fn from_meters(unit: f64, precision: f64) -> Option<Self> {
        (unit > 0. && precision > 0.).then_some(Self { unit, precision })
    }

    /// The user unit in meters.
    pub fn unit(&self) -> f64 {
        self.unit
    }

    /// The database unit in meters.
    pub fn precision(&self) -> f64 {
        self.precision
    }

    /// The factor converting database units to user units.
    pub fn scale2unit(&self) -> f64 {
        self.precision / self.unit
    }

    /// The factor converting database units to meters.
    pub fn scale2meter(&self) -> f64 {
        self.precision
    }

    /// Converts a user-unit length to database units, rounding to the nearest integer.
    pub fn to_coord(&self, value: f64) -> i64 {
        (value * self.unit / self.precision).round() as i64
    }

    /// Converts a pair of user-unit coordinates to a database point.
    pub fn to_point(&self, x: f64, y: f64) -> Point {
        Point::new(self.to_coord(x), self.to_coord(y))
    }

    /// Converts a database-unit length to user units.
    pub fn to_unit(&self, coord: i64) -> f64 {
        coord as f64 * self.scale2unit()
    }

    /// Converts a database-unit length to meters.
    pub fn to_meter(&self, coord: i64) -> f64 {
        coord as f64 * self.precision
    }

    /// Converts a user-unit length to meters.
    pub fn unit_to_meter(&self, value: f64) -> f64 {
        value * self.unit
    }
}
