use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Variables produced while configuring packages.
///
/// Seeded from a snapshot (the process environment, or nothing in tests) and
/// never written back to the process by the library itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentContext {
    vars: BTreeMap<String, String>,
    changed: BTreeSet<String>,
}

impl EnvironmentContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            vars: vars.into_iter().collect(),
            changed: BTreeSet::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.vars.insert(key.clone(), value.into());
        self.changed.insert(key);
    }

    /// Put `dir` in front of the colon separated list in `key`, dropping any
    /// other occurrence of it and empty elements.
    pub fn prepend_path(&mut self, key: &str, dir: &str) {
        let mut parts = vec![dir];
        if let Some(current) = self.vars.get(key) {
            parts.extend(current.split(':').filter(|p| !p.is_empty() && *p != dir));
        }
        let value = parts.join(":");
        self.set(key, value);
    }

    /// Variables set or modified since the snapshot, with their values.
    pub fn changed_vars(&self) -> BTreeMap<&str, &str> {
        self.changed
            .iter()
            .filter_map(|k| self.vars.get(k).map(|v| (k.as_str(), v.as_str())))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Shell `export` lines for every changed variable.
    pub fn exports(&self) -> String {
        self.changed_vars()
            .into_iter()
            .map(|(k, v)| format!("export {}='{}'\n", k, v.replace('\'', r"'\''")))
            .collect()
    }

    /// Full variable set, for handing to a child process.
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}

impl Serialize for EnvironmentContext {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.changed_vars().serialize(serializer)
    }
}
