//! An import prelude that re-exports commonly used items.

pub use geometry::prelude::*;

pub use crate::archive::ArchiveFormat;
pub use crate::cell::{Cell, CellId, CellType};
pub use crate::component::{
    Component, ComponentDef, ComponentDefId, ComponentId, ComponentType, LossPowerTable, Pin,
    PinIoType,
};
pub use crate::config::{EcadConfig, LogLevel};
pub use crate::context::Context;
pub use crate::database::{BondwireSide, Database, MaterialId};
pub use crate::flatten::FlattenOption;
pub use crate::layer::{Layer, LayerId, LayerMap, LayerMapId, LayerType};
pub use crate::layout::{CellInst, CellInstId, Layout, Net, NetId};
pub use crate::material::{MaterialDef, MaterialProp, MaterialPropId, MaterialType};
pub use crate::padstack::{PadShape, PadstackDef, PadstackDefId, PadstackInst, PadstackInstId};
pub use crate::primitive::{
    Bondwire, BondwireEnd, BondwireProfile, Geometry2D, Primitive, PrimitiveId, Text,
};
pub use crate::retriever::LayoutRetriever;
pub use crate::validate::{Issue, IssueSet, Severity};
