//! Typed views over the string-valued Kubernetes enums the provisioner
//! reasons about.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A string that is not a member of the expected enum
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} value: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

// =============================================================================
// Reclaim Policy
// =============================================================================

/// What happens to a volume once its claim releases it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReclaimPolicy {
    Retain,
    Recycle,
    #[default]
    Delete,
}

impl ReclaimPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReclaimPolicy::Retain => "Retain",
            ReclaimPolicy::Recycle => "Recycle",
            ReclaimPolicy::Delete => "Delete",
        }
    }
}

impl fmt::Display for ReclaimPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReclaimPolicy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Retain" => Ok(ReclaimPolicy::Retain),
            "Recycle" => Ok(ReclaimPolicy::Recycle),
            "Delete" => Ok(ReclaimPolicy::Delete),
            other => Err(ParseEnumError {
                kind: "reclaim policy",
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Claim Phase
// =============================================================================

/// Lifecycle phase of a PersistentVolumeClaim
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ClaimPhase {
    #[default]
    Pending,
    Bound,
    Lost,
}

impl fmt::Display for ClaimPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimPhase::Pending => write!(f, "Pending"),
            ClaimPhase::Bound => write!(f, "Bound"),
            ClaimPhase::Lost => write!(f, "Lost"),
        }
    }
}

impl FromStr for ClaimPhase {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ClaimPhase::Pending),
            "Bound" => Ok(ClaimPhase::Bound),
            "Lost" => Ok(ClaimPhase::Lost),
            other => Err(ParseEnumError {
                kind: "claim phase",
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Volume Phase
// =============================================================================

/// Lifecycle phase of a PersistentVolume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumePhase {
    Pending,
    Available,
    Bound,
    Released,
    Failed,
}

impl VolumePhase {
    /// The volume can no longer serve a claim
    pub fn is_terminal(&self) -> bool {
        matches!(self, VolumePhase::Released | VolumePhase::Failed)
    }
}

impl fmt::Display for VolumePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumePhase::Pending => write!(f, "Pending"),
            VolumePhase::Available => write!(f, "Available"),
            VolumePhase::Bound => write!(f, "Bound"),
            VolumePhase::Released => write!(f, "Released"),
            VolumePhase::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for VolumePhase {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(VolumePhase::Pending),
            "Available" => Ok(VolumePhase::Available),
            "Bound" => Ok(VolumePhase::Bound),
            "Released" => Ok(VolumePhase::Released),
            "Failed" => Ok(VolumePhase::Failed),
            other => Err(ParseEnumError {
                kind: "volume phase",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reclaim_policy_parse() {
        assert_eq!("Retain".parse(), Ok(ReclaimPolicy::Retain));
        assert_eq!("Recycle".parse(), Ok(ReclaimPolicy::Recycle));
        assert_eq!("Delete".parse(), Ok(ReclaimPolicy::Delete));
        assert!("delete".parse::<ReclaimPolicy>().is_err());
        assert!("".parse::<ReclaimPolicy>().is_err());
        assert_eq!(ReclaimPolicy::default(), ReclaimPolicy::Delete);
    }

    #[test]
    fn test_volume_phase_terminal() {
        assert!(VolumePhase::Released.is_terminal());
        assert!(VolumePhase::Failed.is_terminal());
        assert!(!VolumePhase::Bound.is_terminal());
        assert!(!VolumePhase::Available.is_terminal());
        assert!(!VolumePhase::Pending.is_terminal());
    }

    #[test]
    fn test_display_matches_parse() {
        for phase in [ClaimPhase::Pending, ClaimPhase::Bound, ClaimPhase::Lost] {
            assert_eq!(phase.to_string().parse(), Ok(phase));
        }
        let err = "Gone".parse::<ClaimPhase>().unwrap_err();
        assert_eq!(err.to_string(), "unknown claim phase value: \"Gone\"");
    }
}
