//! Traits and types for specifying when one object contains another.

use serde::{Deserialize, Serialize};

/// Ways in which an inner object can be contained within an enclosing object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Containment {
    /// The enclosing object does not contain any part of the inner object.
    None,
    /// The shape is partially contained in the enclosing object.
    Partial,
    /// The shape is fully contained in the enclosing object.
    Full,
}

/// Whether points on the boundary of an enclosing shape count as contained.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum EdgeInclusion {
    /// Boundary points are contained.
    #[default]
    Inclusive,
    /// Only interior points are contained.
    Exclusive,
}

/// Provides information on whether a shape contains another shape.
pub trait Contains<T: ?Sized> {
    /// Returns a [`Containment`] indicating how `other` is enclosed within this shape.
    ///
    /// * If `other` is entirely contained, returns [`Containment::Full`].
    /// * If `other` is only partially contained, returns [`Containment::Partial`].
    /// * If no part of `other` lies within this shape, returns [`Containment::None`].
    fn contains(&self, other: &T) -> Containment;

    /// Returns true if `other` is fully enclosed in this shape.
    #[inline]
    fn encloses(&self, other: &T) -> bool {
        self.contains(other) == Containment::Full
    }

    /// Returns true if `other` is fully or partially enclosed in this shape.
    #[inline]
    fn partially_intersects(&self, other: &T) -> bool {
        self.contains(other) != Containment::None
    }
}

impl Containment {
    /// Returns true if the containment is [`Containment::None`].
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns true if the containment is [`Containment::Full`].
    #[inline]
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }
}
