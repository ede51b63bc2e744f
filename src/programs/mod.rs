//! Built-in benefit rule modules and the standard registry wiring them up.

mod section8;
mod snap;

pub use section8::Section8;
pub use snap::Snap;

use crate::core::{ConfigError, ProgramId, Registry};

pub const SECTION8: &str = "section8";
pub const SNAP: &str = "snap";

/// Housing runs first: SNAP's shelter deduction reads the post-subsidy rent share.
pub const STANDARD_ORDER: [&str; 2] = [SECTION8, SNAP];

pub fn standard_registry() -> Result<Registry, ConfigError> {
    let mut registry = Registry::new();
    registry.register(SECTION8, Section8, &[])?;
    registry.register(SNAP, Snap, &[SECTION8])?;
    Ok(registry)
}

pub fn standard_order() -> Vec<ProgramId> {
    STANDARD_ORDER.iter().map(|id| ProgramId::from(*id)).collect()
}
