//! Controllers
//!
//! - [`claim`]: assigns volume names and creates static volumes
//! - [`volume`]: deletes released static volumes
//! - [`filter`]: create / update / delete filtering of watch events
//! - [`backoff`]: per-object requeue backoff
//! - [`runner`]: wiring into the kube runtime

pub mod backoff;
pub mod claim;
pub mod filter;
pub mod runner;
pub mod volume;

#[cfg(test)]
pub(crate) mod fixtures;

pub use backoff::{BackoffConfig, RequeueBackoff};
pub use claim::{precheck, ClaimOutcome, ClaimReconciler, ClaimSkip};
pub use filter::{ChangeClassifier, ChangeKind, EventFilter};
pub use runner::{build_controllers, Context, Readiness, WATCH_COUNT};
pub use volume::{VolumeOutcome, VolumeReconciler, VolumeSkip};
