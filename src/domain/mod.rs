//! Domain layer - Core business logic and port definitions
//!
//! This module defines the claim and volume views, the descriptor builder,
//! and the traits (ports) that adapters implement, following hexagonal
//! architecture principles.

pub mod annotations;
pub mod builder;
pub mod claim;
pub mod ports;
pub mod types;
pub mod volume;

pub use builder::{build_volume, ValidationError, VOLUME_NAME_PREFIX};
pub use claim::StaticClaim;
pub use ports::*;
pub use types::{ClaimPhase, ReclaimPolicy, VolumePhase};
pub use volume::{ClaimReference, NfsSource, StaticVolume, VolumeDescriptor};
