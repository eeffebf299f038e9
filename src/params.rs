//! Typed parameter lookups over TOML tables
//!
//! Used for both hotkey action parameters and the whole configuration file.
//! Keys may be dot-separated paths (`delays.focus_backoff_ms`) that walk into
//! nested tables. A missing key or a value of the wrong type resolves to the
//! caller's default; lookups never fail.

use std::collections::HashMap;
use toml::Value;

/// Wrapper for a TOML table with type-safe accessor methods
#[derive(Debug, Clone, Default)]
pub struct Params(HashMap<String, Value>);

impl Params {
    /// Create a new Params from a HashMap
    pub fn new(map: HashMap<String, Value>) -> Self {
        Params(map)
    }

    /// Create an empty Params (for actions with no parameters)
    pub fn empty() -> Self {
        Params(HashMap::new())
    }

    /// Build from a parsed TOML table
    pub fn from_table(table: toml::Table) -> Self {
        Params(table.into_iter().collect())
    }

    /// Resolve a dot-separated path to a raw value
    ///
    /// A key that itself contains dots (e.g. a quoted TOML key) is matched
    /// before the path is split.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(path) {
            return Some(value);
        }

        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Table(table) => table.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Get a string parameter with a default value
    ///
    /// # Example
    /// ```ignore
    /// let title = params.get_str("lightroom.window_title_contains", "Lightroom");
    /// ```
    pub fn get_str(&self, path: &str, default: &str) -> String {
        self.get(path)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
            .to_string()
    }

    /// Get an integer parameter with a default value
    pub fn get_int(&self, path: &str, default: i64) -> i64 {
        self.get(path)
            .and_then(|v| v.as_integer())
            .unwrap_or(default)
    }

    /// Get a boolean parameter with a default value
    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        self.get(path)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    /// Get a list of strings; non-string items are skipped
    pub fn get_str_list(&self, path: &str) -> Option<Vec<String>> {
        self.get(path).and_then(|v| v.as_array()).map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
    }

    /// Get a nested table as its own Params
    pub fn get_table(&self, path: &str) -> Option<Params> {
        self.get(path)
            .and_then(|v| v.as_table())
            .map(|t| Params::from_table(t.clone()))
    }

    /// Iterate over the top-level entries
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}
