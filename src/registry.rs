//! Group Registry
//!
//! Name → [`Group`] lookup shared between the application (which creates
//! groups) and transports (which resolve the group named in a peer request).
//!
//! Registries are plain values: construct one per cache node and hand an
//! `Arc<Registry>` to whatever needs lookup. [`Registry::global`] exists for
//! programs that want a process-wide singleton.
//!
//! Creating a group under a name that is already registered replaces the
//! previous group; holders of the old `Arc<Group>` keep using it.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::group::Group;
use crate::ports::DataSource;

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

/// Registry of groups by name
#[derive(Default)]
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Create a group and register it under `name`
    pub fn create<S>(&self, name: impl Into<String>, cache_bytes: u64, source: S) -> Arc<Group>
    where
        S: DataSource + 'static,
    {
        self.create_with_source(name, cache_bytes, Arc::new(source))
    }

    /// Like [`create`](Self::create), for a data source that is already shared
    pub fn create_with_source(
        &self,
        name: impl Into<String>,
        cache_bytes: u64,
        source: Arc<dyn DataSource>,
    ) -> Arc<Group> {
        let name = name.into();
        let group = Arc::new(Group::new(name.clone(), cache_bytes, source));

        let replaced = self.groups.write().insert(name.clone(), Arc::clone(&group));
        if replaced.is_some() {
            debug!(group = %name, "replaced existing group");
        }
        info!(group = %name, cache_bytes, "group registered");

        group
    }

    /// Look up a group by name
    pub fn lookup(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Registered group names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered groups, sorted by name
    pub fn groups(&self) -> Vec<Arc<Group>> {
        let mut groups: Vec<Arc<Group>> = self.groups.read().values().cloned().collect();
        groups.sort_by(|a, b| a.name().cmp(b.name()));
        groups
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("groups", &self.names())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
