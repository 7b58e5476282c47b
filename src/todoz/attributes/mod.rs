//! Attribute maps and patches.
//!
//! A record's state is an [`Attributes`] map. Mutations are expressed as a
//! [`Patch`]: an ordered list of assignments. Order matters because change
//! notifications fire per key in the order the keys were supplied.

use std::collections::BTreeMap;

pub mod value;

pub use value::AttrValue;

/// Attribute holding a todo's text.
pub const TEXT: &str = "text";
/// Attribute holding a todo's completion flag.
pub const DONE: &str = "done";
/// Attribute holding a todo's position key.
pub const ORDER: &str = "order";

/// Mapping from attribute name to value.
pub type Attributes = BTreeMap<String, AttrValue>;

/// An ordered set of attribute assignments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    entries: Vec<(String, AttrValue)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an assignment. Assigning the same key twice keeps the first
    /// position and the last value.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply this patch on top of `base`, returning the merged map.
    pub fn merged_over(&self, base: &Attributes) -> Attributes {
        let mut merged = base.clone();
        for (name, value) in &self.entries {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }
}

impl From<&Attributes> for Patch {
    fn from(attrs: &Attributes) -> Self {
        Self {
            entries: attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for Patch {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut patch = Patch::new();
        for (k, v) in iter {
            patch.insert(k, v);
        }
        patch
    }
}
