//! Read-only hierarchical diagnostics for pipes and policies.

use serde_json::{Map, Value};

/// Collects a hierarchical key/value tree describing a pipe.
///
/// Filters and policies contribute flat entries with
/// [`ProbeContext::add`] and nested scopes with [`ProbeContext::section`].
/// Repeated sections under the same name accumulate into an array, so an
/// ordered filter chain renders as a list.
#[derive(Debug)]
pub struct ProbeContext {
    entries: Map<String, Value>,
}

impl ProbeContext {
    /// Creates a root probe context stamped with the probe time.
    #[must_use]
    pub fn new() -> Self {
        let mut entries = Map::new();
        entries.insert(
            "probed_at".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        Self { entries }
    }

    fn child() -> Self {
        Self { entries: Map::new() }
    }

    /// Adds a flat key/value entry.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Adds a nested section populated by `build`.
    ///
    /// A second section under the same name turns the entry into an array
    /// preserving contribution order.
    pub fn section(&mut self, name: impl Into<String>, build: impl FnOnce(&mut ProbeContext)) {
        let mut child = ProbeContext::child();
        build(&mut child);
        let value = Value::Object(child.entries);

        let name = name.into();
        match self.entries.remove(&name) {
            None => {
                self.entries.insert(name, value);
            }
            Some(Value::Array(mut items)) => {
                items.push(value);
                self.entries.insert(name, Value::Array(items));
            }
            Some(previous) => {
                self.entries.insert(name, Value::Array(vec![previous, value]));
            }
        }
    }

    /// Consumes the probe and returns the collected tree.
    #[must_use]
    pub fn finish(self) -> Value {
        Value::Object(self.entries)
    }
}

impl Default for ProbeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_has_timestamp() {
        let probe = ProbeContext::new();
        let tree = probe.finish();
        assert!(tree.get("probed_at").is_some());
    }

    #[test]
    fn test_add_and_section() {
        let mut probe = ProbeContext::new();
        probe.add("name", "pipe");
        probe.section("policy", |p| {
            p.add("limit", 3);
        });

        let tree = probe.finish();
        assert_eq!(tree["name"], "pipe");
        assert_eq!(tree["policy"]["limit"], 3);
    }

    #[test]
    fn test_repeated_sections_accumulate() {
        let mut probe = ProbeContext::new();
        probe.section("filters", |p| p.add("filter", "first"));
        probe.section("filters", |p| p.add("filter", "second"));
        probe.section("filters", |p| p.add("filter", "third"));

        let tree = probe.finish();
        let filters = tree["filters"].as_array().unwrap();
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[0]["filter"], "first");
        assert_eq!(filters[2]["filter"], "third");
    }
}
