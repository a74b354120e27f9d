use std::collections::HashMap;

use super::{ObjectDef, ObjectKind};

/// The Catalog is the central repository for all named object definitions.
///
/// Names are case-insensitive and unique per object kind.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    objects: HashMap<(ObjectKind, String), ObjectDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(kind: ObjectKind, name: &str) -> (ObjectKind, String) {
        (kind, name.to_lowercase())
    }

    pub fn exists(&self, kind: ObjectKind, name: &str) -> bool {
        self.objects.contains_key(&Self::key(kind, name))
    }

    pub fn get(&self, kind: ObjectKind, name: &str) -> Option<&ObjectDef> {
        self.objects.get(&Self::key(kind, name))
    }

    /// Insert a new definition; returns the definition back if the name is taken
    pub fn insert(&mut self, def: ObjectDef) -> Result<(), ObjectDef> {
        let key = Self::key(def.kind(), def.name());
        if self.objects.contains_key(&key) {
            return Err(def);
        }
        self.objects.insert(key, def);
        Ok(())
    }

    pub fn remove(&mut self, kind: ObjectKind, name: &str) -> Option<ObjectDef> {
        self.objects.remove(&Self::key(kind, name))
    }

    /// All indexes declared over the given table
    pub fn indexes_on(&self, table: &str) -> Vec<&ObjectDef> {
        self.objects
            .values()
            .filter(|def| matches!(def, ObjectDef::Index(idx) if idx.table.eq_ignore_ascii_case(table)))
            .collect()
    }

    /// Names of all objects of a kind, sorted
    pub fn names(&self, kind: ObjectKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .values()
            .filter(|def| def.kind() == kind)
            .map(|def| def.name().to_string())
            .collect();
        names.sort();
        names
    }
}
