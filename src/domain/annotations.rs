//! Static provisioning annotation keys
//!
//! These keys form the contract between operators and the provisioner.
//! They are read from claims and, for the marker, written onto volumes.

use std::collections::BTreeMap;

/// Marker enabling static provisioning (on claims) and ownership (on volumes)
pub const STATIC_PROVISION: &str = "storage.kubesphere.io/nfs-static-provision";

/// NFS server address
pub const NFS_SERVER: &str = "storage.kubesphere.io/nfs-server";

/// NFS export path
pub const NFS_PATH: &str = "storage.kubesphere.io/nfs-path";

/// Mount the export read-only
pub const NFS_READ_ONLY: &str = "storage.kubesphere.io/nfs-readonly";

/// JSON array of mount options
pub const MOUNT_OPTIONS: &str = "storage.kubesphere.io/mount-options";

/// Reclaim policy for the produced volume
pub const RECLAIM_POLICY: &str = "storage.kubesphere.io/reclaim-policy";

/// Parse a boolean string using the conventional accepted spellings.
///
/// Returns `None` for anything outside `1 t T TRUE true True` and
/// `0 f F FALSE false False`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// True when the marker annotation is present and parses to `true`
pub fn has_static_provision_marker(annotations: &BTreeMap<String, String>) -> bool {
    annotations
        .get(STATIC_PROVISION)
        .and_then(|v| parse_bool(v))
        .unwrap_or(false)
}
