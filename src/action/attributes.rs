//! Insertion-ordered string attributes attached to actions and result tables.

use serde::{Deserialize, Serialize};

/// Ordered `key -> value` metadata. Setting an existing key keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set `key` to `value`, replacing any previous value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Join as `key{assignment}value` pairs separated by `delimiter`.
    pub fn join(&self, delimiter: &str, assignment: &str) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}{assignment}{v}"))
            .collect::<Vec<_>>()
            .join(delimiter)
    }

    /// Compact form usable inside file names, e.g. `T=300K-B=1T`.
    pub fn path_string(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", k.replace(' ', ""), v.replace(' ', "")))
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl std::fmt::Display for Attributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.join(", ", "="))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (key, value) in iter {
            attributes.set(key, value);
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_keeps_insertion_order() {
        let mut attrs = Attributes::new();
        attrs.set("T", "300 K");
        attrs.set("B", "1 T");
        attrs.set("T", "310 K");

        let keys: Vec<_> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["T", "B"]);
        assert_eq!(attrs.get("T"), Some("310 K"));
    }

    #[test]
    fn test_join_and_path_string() {
        let attrs: Attributes = [("Gate Voltage", "1 V"), ("T", "4 K")].into_iter().collect();

        assert_eq!(attrs.to_string(), "Gate Voltage=1 V, T=4 K");
        assert_eq!(attrs.join("; ", ": "), "Gate Voltage: 1 V; T: 4 K");
        assert_eq!(attrs.path_string(), "GateVoltage=1V-T=4K");
    }

    #[test]
    fn test_remove() {
        let mut attrs: Attributes = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(attrs.remove("a"), Some("1".to_string()));
        assert_eq!(attrs.remove("a"), None);
        assert!(!attrs.contains("a"));
        assert_eq!(attrs.len(), 1);
    }
}
