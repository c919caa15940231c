//! Change filtering
//!
//! Watch streams report objects, not transitions. [`ChangeClassifier`]
//! recovers create / update / delete transitions by remembering the last
//! resource version seen per object, and [`EventFilter`] declares which of
//! them trigger a reconciliation.

use kube::runtime::watcher;
use kube::{Resource, ResourceExt};
use std::collections::HashMap;
use std::fmt;

/// Kind of change observed on an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Create => write!(f, "create"),
            ChangeKind::Update => write!(f, "update"),
            ChangeKind::Delete => write!(f, "delete"),
        }
    }
}

/// Which change kinds trigger reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl EventFilter {
    /// Claims react to creation and updates
    pub const fn claims() -> Self {
        Self {
            create: true,
            update: true,
            delete: false,
        }
    }

    /// Volumes react to updates only; a new volume has no phase worth acting on
    pub const fn volumes() -> Self {
        Self {
            create: false,
            update: true,
            delete: false,
        }
    }

    pub fn allows(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Create => self.create,
            ChangeKind::Update => self.update,
            ChangeKind::Delete => self.delete,
        }
    }
}

type ObjectKey = (Option<String>, String);

fn key_of<K: Resource>(obj: &K) -> ObjectKey {
    (obj.namespace(), obj.name_any())
}

/// Turns watcher events into filtered reconciliation triggers.
///
/// Objects that disappear across a relist produce no trigger; the
/// reconcilers would read them as absent anyway. They are still reported
/// as gone by [`ChangeClassifier::triggers_with`], like deletions.
pub struct ChangeClassifier {
    filter: EventFilter,
    seen: HashMap<ObjectKey, Option<String>>,
}

impl ChangeClassifier {
    pub fn new(filter: EventFilter) -> Self {
        Self {
            filter,
            seen: HashMap::new(),
        }
    }

    /// Every change carried by a watcher event
    pub fn classify<K: Resource>(&mut self, event: watcher::Event<K>) -> Vec<(ChangeKind, K)> {
        self.classify_with(event, |_, _| {})
    }

    fn classify_with<K: Resource>(
        &mut self,
        event: watcher::Event<K>,
        mut on_gone: impl FnMut(Option<&str>, &str),
    ) -> Vec<(ChangeKind, K)> {
        match event {
            watcher::Event::Applied(obj) => {
                let key = key_of(&obj);
                let version = obj.resource_version();
                match self.seen.insert(key, version.clone()) {
                    None => vec![(ChangeKind::Create, obj)],
                    Some(previous) if previous.is_none() || previous != version => {
                        vec![(ChangeKind::Update, obj)]
                    }
                    Some(_) => Vec::new(),
                }
            }
            watcher::Event::Deleted(obj) => {
                let key = key_of(&obj);
                self.seen.remove(&key);
                on_gone(key.0.as_deref(), &key.1);
                vec![(ChangeKind::Delete, obj)]
            }
            watcher::Event::Restarted(objs) => {
                let mut next = HashMap::with_capacity(objs.len());
                let mut changes = Vec::new();
                for obj in objs {
                    let key = key_of(&obj);
                    let version = obj.resource_version();
                    match self.seen.get(&key) {
                        None => changes.push((ChangeKind::Create, obj)),
                        Some(previous) if previous.is_none() || *previous != version => {
                            changes.push((ChangeKind::Update, obj))
                        }
                        Some(_) => {}
                    }
                    next.insert(key, version);
                }
                for (namespace, name) in self.seen.keys() {
                    if !next.contains_key(&(namespace.clone(), name.clone())) {
                        on_gone(namespace.as_deref(), name);
                    }
                }
                self.seen = next;
                changes
            }
        }
    }

    /// Objects whose change passes the filter
    pub fn triggers<K: Resource>(&mut self, event: watcher::Event<K>) -> Vec<K> {
        self.triggers_with(event, |_, _| {})
    }

    /// Like [`triggers`](Self::triggers), also calling `on_gone` with the
    /// namespace and name of every object that was deleted or dropped
    /// from a relist, whether or not the filter allows deletes.
    pub fn triggers_with<K: Resource>(
        &mut self,
        event: watcher::Event<K>,
        on_gone: impl FnMut(Option<&str>, &str),
    ) -> Vec<K> {
        let filter = self.filter;
        self.classify_with(event, on_gone)
            .into_iter()
            .filter(|(kind, _)| filter.allows(*kind))
            .map(|(_, obj)| obj)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PersistentVolume;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pv(name: &str, version: &str) -> PersistentVolume {
        PersistentVolume {
            metadata: ObjectMeta {
                name: Some(name.into()),
                resource_version: Some(version.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn kinds(changes: Vec<(ChangeKind, PersistentVolume)>) -> Vec<(ChangeKind, String)> {
        changes.into_iter().map(|(k, o)| (k, o.name_any())).collect()
    }

    #[test]
    fn test_applied_create_then_update() {
        let mut c = ChangeClassifier::new(EventFilter::volumes());
        assert_eq!(
            kinds(c.classify(watcher::Event::Applied(pv("a", "1")))),
            vec![(ChangeKind::Create, "a".to_string())]
        );
        assert_eq!(
            kinds(c.classify(watcher::Event::Applied(pv("a", "2")))),
            vec![(ChangeKind::Update, "a".to_string())]
        );
        assert!(c.classify(watcher::Event::Applied(pv("a", "2"))).is_empty());
    }

    #[test]
    fn test_delete_forgets_object() {
        let mut c = ChangeClassifier::new(EventFilter::claims());
        c.classify(watcher::Event::Applied(pv("a", "1")));
        assert_eq!(
            kinds(c.classify(watcher::Event::Deleted(pv("a", "1")))),
            vec![(ChangeKind::Delete, "a".to_string())]
        );
        assert_eq!(
            kinds(c.classify(watcher::Event::Applied(pv("a", "3")))),
            vec![(ChangeKind::Create, "a".to_string())]
        );
    }

    #[test]
    fn test_relist_only_reports_changes() {
        let mut c = ChangeClassifier::new(EventFilter::claims());
        c.classify(watcher::Event::Restarted(vec![pv("a", "1"), pv("b", "1")]));

        let changes = kinds(c.classify(watcher::Event::Restarted(vec![
            pv("a", "1"),
            pv("b", "2"),
            pv("c", "1"),
        ])));
        assert_eq!(
            changes,
            vec![
                (ChangeKind::Update, "b".to_string()),
                (ChangeKind::Create, "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_volume_filter_drops_creates() {
        let mut c = ChangeClassifier::new(EventFilter::volumes());
        assert!(c.triggers(watcher::Event::Applied(pv("a", "1"))).is_empty());
        assert_eq!(c.triggers(watcher::Event::Applied(pv("a", "2"))).len(), 1);
        assert!(c.triggers(watcher::Event::Deleted(pv("a", "2"))).is_empty());
    }

    #[test]
    fn test_gone_objects_reported_even_when_deletes_filtered() {
        let mut c = ChangeClassifier::new(EventFilter::volumes());
        let mut gone = Vec::new();
        c.triggers_with(
            watcher::Event::Restarted(vec![pv("a", "1"), pv("b", "1")]),
            |ns, name| gone.push((ns.map(String::from), name.to_string())),
        );
        assert!(gone.is_empty());

        let triggered = c.triggers_with(watcher::Event::Deleted(pv("a", "1")), |ns, name| {
            gone.push((ns.map(String::from), name.to_string()))
        });
        assert!(triggered.is_empty());
        assert_eq!(gone, vec![(None, "a".to_string())]);

        // "b" vanished while the watch was down
        c.triggers_with(
            watcher::Event::Restarted(vec![pv("c", "1")]),
            |ns, name| gone.push((ns.map(String::from), name.to_string())),
        );
        assert_eq!(gone, vec![(None, "a".to_string()), (None, "b".to_string())]);
    }

    #[test]
    fn test_claim_filter() {
        let f = EventFilter::claims();
        assert!(f.allows(ChangeKind::Create));
        assert!(f.allows(ChangeKind::Update));
        assert!(!f.allows(ChangeKind::Delete));
    }
}
