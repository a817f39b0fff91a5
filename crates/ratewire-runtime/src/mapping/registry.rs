//! Mapping registry
//!
//! Configurations are addressable by id and by (source system, target
//! system, product line, direction). Key lookups are case-insensitive and
//! fall back to the unscoped key when no product-specific mapping exists.

use crate::registry::SnapshotCell;
use ratewire_core::ast::{MappingConfiguration, MappingKey};
use ratewire_core::CoreError;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct MappingCatalog {
    by_id: BTreeMap<String, Arc<MappingConfiguration>>,
    by_key: BTreeMap<MappingKey, String>,
}

impl MappingCatalog {
    pub fn get(&self, id: &str) -> Option<&Arc<MappingConfiguration>> {
        self.by_id.get(id)
    }

    /// Exact key first, then the same key without product line
    pub fn find(&self, key: &MappingKey) -> Option<&Arc<MappingConfiguration>> {
        let key = normalize(key);
        self.by_key
            .get(&key)
            .or_else(|| self.by_key.get(&key.unscoped()))
            .and_then(|id| self.by_id.get(id))
    }

    pub fn mappings(&self) -> impl Iterator<Item = &Arc<MappingConfiguration>> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn insert(&mut self, config: MappingConfiguration) {
        // A re-registered id may move to another key
        self.remove(&config.id);
        let key = normalize(&config.key());
        if let Some(previous) = self.by_key.insert(key.clone(), config.id.clone()) {
            tracing::warn!(
                mapping_id = %config.id,
                replaced = %previous,
                key = %key,
                "Mapping key already registered, keeping the last definition"
            );
        }
        self.by_id.insert(config.id.clone(), Arc::new(config));
    }

    fn remove(&mut self, id: &str) -> bool {
        match self.by_id.remove(id) {
            Some(config) => {
                let key = normalize(&config.key());
                if self.by_key.get(&key).map(String::as_str) == Some(id) {
                    self.by_key.remove(&key);
                }
                true
            }
            None => false,
        }
    }
}

fn normalize(key: &MappingKey) -> MappingKey {
    MappingKey {
        source_system: key.source_system.to_ascii_lowercase(),
        target_system: key.target_system.to_ascii_lowercase(),
        product_line: key.product_line.as_ref().map(|p| p.to_ascii_lowercase()),
        direction: key.direction,
    }
}

/// Shared handle to the mapping catalog
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    catalog: Arc<SnapshotCell<MappingCatalog>>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<MappingCatalog> {
        self.catalog.load()
    }

    pub fn get(&self, id: &str) -> Option<Arc<MappingConfiguration>> {
        self.snapshot().get(id).cloned()
    }

    pub fn find(&self, key: &MappingKey) -> Option<Arc<MappingConfiguration>> {
        self.snapshot().find(key).cloned()
    }

    /// Register or replace a configuration
    pub fn register(&self, config: MappingConfiguration) -> Result<(), CoreError> {
        config.validate()?;
        tracing::debug!(mapping_id = %config.id, key = %config.key(), "Registering mapping");
        self.catalog.update(|current| {
            let mut next = current.clone();
            next.insert(config);
            (next, ())
        });
        Ok(())
    }

    pub fn remove(&self, id: &str) -> bool {
        self.catalog.update(|current| {
            let mut next = current.clone();
            let removed = next.remove(id);
            (next, removed)
        })
    }

    /// Replace every configuration; invalid ones are rejected individually
    pub fn replace_all(&self, configs: Vec<MappingConfiguration>) -> Vec<CoreError> {
        let mut rejected = Vec::new();
        let mut catalog = MappingCatalog::default();
        for config in configs {
            match config.validate() {
                Ok(()) => catalog.insert(config),
                Err(e) => {
                    tracing::warn!(mapping_id = %config.id, error = %e, "Rejecting mapping");
                    rejected.push(e);
                }
            }
        }
        tracing::info!(mappings = catalog.len(), rejected = rejected.len(), "Mapping catalog replaced");
        self.catalog.store(catalog);
        rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratewire_core::ast::Direction;

    fn mapping(id: &str, product_line: Option<&str>) -> MappingConfiguration {
        let mut config: MappingConfiguration = serde_yaml::from_str(&format!(
            "id: {}\nsource_system: Acme\ntarget_system: canonical\ndirection: to_canonical",
            id
        ))
        .unwrap();
        config.product_line = product_line.map(str::to_string);
        config
    }

    #[test]
    fn test_find_prefers_product_scoped() {
        let registry = MappingRegistry::new();
        registry.register(mapping("generic", None)).unwrap();
        registry.register(mapping("auto_only", Some("auto"))).unwrap();

        let auto = MappingKey::new("acme", "CANONICAL", Some("Auto"), Direction::ToCanonical);
        assert_eq!(registry.find(&auto).unwrap().id, "auto_only");

        let home = MappingKey::new("acme", "canonical", Some("home"), Direction::ToCanonical);
        assert_eq!(registry.find(&home).unwrap().id, "generic");

        let reverse = MappingKey::new("acme", "canonical", None, Direction::FromCanonical);
        assert!(registry.find(&reverse).is_none());
    }

    #[test]
    fn test_remove_and_replace() {
        let registry = MappingRegistry::new();
        registry.register(mapping("generic", None)).unwrap();
        assert!(registry.remove("generic"));
        assert!(registry.get("generic").is_none());

        let mut invalid = mapping("x", None);
        invalid.id = String::new();
        let rejected = registry.replace_all(vec![mapping("a", None), invalid]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(registry.snapshot().len(), 1);
    }
}
