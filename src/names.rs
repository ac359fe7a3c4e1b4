//! Case-insensitive name registry used for workspace variables.

use indexmap::IndexMap;

/// Names compare case-insensitively; the casing first stored is kept.
#[derive(Debug, Clone, Default)]
pub struct NameManager {
    /// Lowercased key to stored display name, in insertion order.
    names: IndexMap<String, String>,
}

impl NameManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str) -> String {
        name.to_lowercase()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(&Self::key(name))
    }

    /// The stored spelling of a name, matched case-insensitively.
    pub fn canonical(&self, name: &str) -> Option<&str> {
        self.names.get(&Self::key(name)).map(String::as_str)
    }

    /// Store a name. Returns `false` if a case-insensitive match exists.
    pub fn add_name(&mut self, name: &str) -> bool {
        let key = Self::key(name);
        if self.names.contains_key(&key) {
            return false;
        }
        self.names.insert(key, name.to_string());
        true
    }

    /// Remove a name, returning the stored spelling.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.names.shift_remove(&Self::key(name))
    }

    /// `name` itself if free, otherwise `name` with its trailing number
    /// bumped (`var` → `var2` → `var3`, `x9` → `x10`) until it is free.
    pub fn generate_unique_name(&self, name: &str) -> String {
        if !self.contains(name) {
            return name.to_string();
        }
        let digits_start = name
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i)
            .unwrap_or(name.len());
        let (base, digits) = name.split_at(digits_start);
        let mut n: u64 = digits.parse().unwrap_or(1);
        loop {
            n += 1;
            let candidate = format!("{}{}", base, n);
            if !self.contains(&candidate) {
                return candidate;
            }
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}
