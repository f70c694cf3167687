//! Announced names.
//!
//! A file can be published under a name other than its local one. The
//! catalog remembers those aliases so the transfer listener can serve them
//! and every UPDATE keeps announcing them.

use crate::{LocalStore, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// The local store plus its announced-name aliases.
pub struct Catalog {
    store: Arc<dyn LocalStore>,
    aliases: RwLock<BTreeMap<String, String>>,
}

impl Catalog {
    /// Creates a catalog with no aliases.
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            aliases: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    /// Makes `local` available under `announced`.
    pub fn alias(&self, announced: &str, local: &str) {
        if announced == local {
            return;
        }
        debug!(announced = %announced, local = %local, "Alias recorded");
        self.aliases
            .write()
            .insert(announced.to_string(), local.to_string());
    }

    /// Drops an alias, returning the local name it pointed to.
    pub fn unalias(&self, announced: &str) -> Option<String> {
        self.aliases.write().remove(announced)
    }

    /// Maps an announced name to a local file that exists.
    #[must_use]
    pub fn resolve(&self, announced: &str) -> Option<String> {
        if let Some(local) = self.aliases.read().get(announced) {
            if self.store.file_exists(local) {
                return Some(local.clone());
            }
        }
        self.store
            .file_exists(announced)
            .then(|| announced.to_string())
    }

    /// Every name this peer can serve: local files plus live aliases.
    ///
    /// Names that cannot travel in an UPDATE are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn announced_names(&self) -> Result<Vec<String>> {
        let mut names: BTreeSet<String> = self.store.list_files()?.into_iter().collect();
        for (announced, local) in self.aliases.read().iter() {
            if self.store.file_exists(local) {
                names.insert(announced.clone());
            }
        }
        Ok(names.into_iter().filter(|name| announceable(name)).collect())
    }
}

fn announceable(name: &str) -> bool {
    match peerdex_protocol::check_filename(name) {
        Ok(()) => true,
        Err(e) => {
            debug!(file = ?name, reason = %e, "Skipping name that cannot be announced");
            false
        }
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("aliases", &*self.aliases.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use pretty_assertions::assert_eq;

    fn catalog_with(files: &[&str]) -> (Catalog, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        for name in files {
            store.write_file(name, name.as_bytes()).unwrap();
        }
        (Catalog::new(store.clone()), store)
    }

    #[test]
    fn resolves_local_names_and_aliases() {
        let (catalog, _) = catalog_with(&["local.txt"]);
        catalog.alias("shared.txt", "local.txt");

        assert_eq!(catalog.resolve("local.txt").as_deref(), Some("local.txt"));
        assert_eq!(catalog.resolve("shared.txt").as_deref(), Some("local.txt"));
        assert_eq!(catalog.resolve("other.txt"), None);
    }

    #[test]
    fn alias_to_missing_file_is_not_served() {
        let (catalog, store) = catalog_with(&["local.txt"]);
        catalog.alias("shared.txt", "local.txt");
        store.remove("local.txt");

        assert_eq!(catalog.resolve("shared.txt"), None);
        assert!(catalog.announced_names().unwrap().is_empty());
    }

    #[test]
    fn announced_names_merge_and_filter() {
        let (catalog, _) = catalog_with(&["a.txt", "b|||c", "notes|", "|draft", "x|y", "z.txt"]);
        catalog.alias("alias.txt", "z.txt");

        assert_eq!(
            catalog.announced_names().unwrap(),
            vec!["a.txt", "alias.txt", "x|y", "z.txt"]
        );
        assert_eq!(catalog.unalias("alias.txt").as_deref(), Some("z.txt"));
    }
}
