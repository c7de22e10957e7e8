//! In-memory `SchemaRegistry` implementation.
//!
//! Thread-safe via `Arc<RwLock<Inner>>`; cheap to clone and share across
//! iterators and watch tasks.

use crate::error::RegistryError;
use crate::event::EventFingerprint;
use crate::schema::{EventSchema, SchemaRegistry};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

struct Inner {
    /// event name → schema, in registration order
    by_name: IndexMap<String, EventSchema>,
    /// fingerprint hex → event name
    by_fingerprint: HashMap<String, String>,
}

/// Thread-safe in-memory schema registry.
#[derive(Clone)]
pub struct MemoryRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                by_name: IndexMap::new(),
                by_fingerprint: HashMap::new(),
            })),
        }
    }

    /// Register a schema. Event names are unique; a second registration
    /// under the same name is rejected.
    pub fn insert(&self, schema: EventSchema) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().unwrap();
        if inner.by_name.contains_key(&schema.name) {
            return Err(RegistryError::AlreadyExists {
                name: schema.name.clone(),
            });
        }
        if !schema.anonymous {
            inner
                .by_fingerprint
                .insert(schema.fingerprint().as_hex().to_string(), schema.name.clone());
        }
        inner.by_name.insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Register every schema in the iterator. Stops at the first duplicate.
    pub fn extend(
        &self,
        schemas: impl IntoIterator<Item = EventSchema>,
    ) -> Result<usize, RegistryError> {
        let mut count = 0;
        for schema in schemas {
            self.insert(schema)?;
            count += 1;
        }
        Ok(count)
    }

    /// Load schemas from a JSON document: a single schema object or an
    /// array of them. Returns the number of schemas registered.
    pub fn load_file(&self, path: &Path) -> Result<usize, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        let schemas: Vec<EventSchema> = if content.trim_start().starts_with('[') {
            serde_json::from_str(&content)?
        } else {
            vec![serde_json::from_str(&content)?]
        };
        self.extend(schemas)
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry for MemoryRegistry {
    fn get_by_name(&self, name: &str) -> Option<EventSchema> {
        self.inner.read().unwrap().by_name.get(name).cloned()
    }

    fn get_by_fingerprint(&self, fp: &EventFingerprint) -> Option<EventSchema> {
        let inner = self.inner.read().unwrap();
        let name = inner.by_fingerprint.get(fp.as_hex())?;
        inner.by_name.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.inner.read().unwrap().by_name.keys().cloned().collect()
    }
}
