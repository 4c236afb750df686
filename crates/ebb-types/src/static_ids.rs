//! Identifiers reserved for system Ebbs.
//!
//! All of them live in [`IdSpace::STATIC`], which no manager ever allocates
//! from, so they can be bound during startup without coordination.

use crate::id::{EbbId, IdSpace};

/// Per-process map from identifier to root.
pub const LOCAL_ID_MAP: EbbId = EbbId::new(0, 1);
/// Cluster-wide directory of configuration values.
pub const GLOBAL_ID_MAP: EbbId = EbbId::new(0, 2);
/// Identifier allocator.
pub const EBB_MANAGER: EbbId = EbbId::new(0, 3);
/// Inter-location message dispatch.
pub const MESSENGER: EbbId = EbbId::new(0, 4);
/// Timer service.
pub const TIMER: EbbId = EbbId::new(0, 5);

/// First static identifier available to applications.
pub const FIRST_STATIC_USER_ID: EbbId = EbbId::new(0, 0x100);

/// Returns `true` for identifiers from the static space.
pub fn is_static(id: EbbId) -> bool {
    IdSpace::STATIC.contains(id)
}
