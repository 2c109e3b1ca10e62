//! Booster shop and purchased-effects registry.

mod catalog;
mod effect;
mod registry;

pub use catalog::{Catalog, CatalogItem};
pub use effect::{BoosterEffect, BoosterKind, Expiry};
pub use registry::EffectsRegistry;
