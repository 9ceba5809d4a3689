//! Case-insensitive response headers

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Header name to one or more values; names compare case-insensitively
/// and keep first-seen order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    entries: IndexMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, keeping any already present under `name`
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Replace every value of `name`
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.entries.insert(name.to_lowercase(), vec![value.into()]);
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.entries.shift_remove(&name.to_lowercase())
    }

    /// All values of `name` joined with `", "`
    pub fn get(&self, name: &str) -> Result<String> {
        self.get_all(name).map(|values| values.join(", "))
    }

    /// The raw values of `name`
    pub fn get_all(&self, name: &str) -> Result<&[String]> {
        self.entries
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .ok_or_else(|| Error::header_not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Lowercased names in first-seen order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: AsRef<str>, V: Into<String>> Extend<(N, V)> for Headers {
    fn extend<I: IntoIterator<Item = (N, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.append(name.as_ref(), value);
        }
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        headers.extend(iter);
        headers
    }
}
