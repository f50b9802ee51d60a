//! Resolved environment variables

use std::collections::BTreeMap;

/// Explicit `name -> value` map of the referenced environment variables.
///
/// Resolved once per supervisor pass and then used for diffing, file
/// generation and the snapshot alike. Unset variables are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvValues {
    values: BTreeMap<String, String>,
}

impl EnvValues {
    /// Read `names` from the process environment
    pub fn from_process<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values = names
            .into_iter()
            .filter_map(|name| {
                let name = name.as_ref();
                std::env::var(name).ok().map(|value| (name.to_string(), value))
            })
            .collect();
        Self { values }
    }

    pub fn from_map(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
