//! RBAC manifest
//!
//! The ClusterRole the controllers need, printed by the `rbac` subcommand.

use crate::error::Result;
use k8s_openapi::api::rbac::v1::{ClusterRole, PolicyRule};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

fn rule(api_group: &str, resource: &str, verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![api_group.to_string()]),
        resources: Some(vec![resource.to_string()]),
        verbs: verbs.iter().map(|v| v.to_string()).collect(),
        ..Default::default()
    }
}

/// ClusterRole granting exactly what the claim and volume controllers use
pub fn cluster_role(name: &str) -> ClusterRole {
    ClusterRole {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        rules: Some(vec![
            rule("", "persistentvolumeclaims", &["get", "list", "watch", "update"]),
            rule("", "persistentvolumes", &["get", "list", "watch", "create", "delete"]),
            rule("", "events", &["create", "patch"]),
            rule("events.k8s.io", "events", &["create", "patch"]),
        ]),
        ..Default::default()
    }
}

/// Render the ClusterRole as YAML
pub fn render(name: &str) -> Result<String> {
    Ok(serde_yaml::to_string(&cluster_role(name))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verbs_for<'a>(role: &'a ClusterRole, group: &str, resource: &str) -> &'a [String] {
        role.rules
            .as_ref()
            .unwrap()
            .iter()
            .find(|r| {
                r.api_groups.as_deref() == Some(&[group.to_string()][..])
                    && r.resources.as_deref() == Some(&[resource.to_string()][..])
            })
            .map(|r| r.verbs.as_slice())
            .unwrap()
    }

    #[test]
    fn test_claims_are_never_created_or_deleted() {
        let role = cluster_role("nfs-static-provisioner");
        let verbs = verbs_for(&role, "", "persistentvolumeclaims");
        assert!(verbs.iter().any(|v| v == "update"));
        assert!(!verbs.iter().any(|v| v == "create" || v == "delete"));
    }

    #[test]
    fn test_volume_verbs() {
        let role = cluster_role("nfs-static-provisioner");
        let verbs = verbs_for(&role, "", "persistentvolumes");
        for verb in ["get", "list", "watch", "create", "delete"] {
            assert!(verbs.iter().any(|v| v == verb), "missing {}", verb);
        }
        assert!(!verbs.iter().any(|v| v == "update"));
    }

    #[test]
    fn test_render_yaml() {
        let yaml = render("nfs-static-provisioner").unwrap();
        assert!(yaml.contains("kind: ClusterRole"));
        assert!(yaml.contains("apiVersion: rbac.authorization.k8s.io/v1"));
        assert!(yaml.contains("name: nfs-static-provisioner"));
        assert!(yaml.contains("events.k8s.io"));
    }
}
