use std::collections::HashMap;
use std::collections::hash_map::Entry;

use glob::Pattern;

use crate::loader::{Outcome, Resource};

/// The outcome of every asset in a finished batch, keyed by asset name.
///
/// `Assets` is built up by the loader while a batch runs and is handed over
/// to the completion callback once every asset has settled.
#[derive(Debug, Clone, Default)]
pub struct Assets {
    map: HashMap<String, Outcome>,
}

impl Assets {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    /// Records the outcome of one asset, replacing an earlier outcome under
    /// the same name.
    pub(crate) fn commit(&mut self, name: String, outcome: Outcome) -> &Outcome {
        match self.map.entry(name) {
            Entry::Occupied(mut entry) => {
                entry.insert(outcome);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(outcome),
        }
    }

    /// Outcome of the asset called `name`, if it was part of the batch.
    pub fn get(&self, name: &str) -> Option<&Outcome> {
        self.map.get(name)
    }

    /// Resource of the asset called `name`, if it loaded.
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.map.get(name).and_then(Outcome::resource)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.map.iter().map(|(name, outcome)| (name.as_str(), outcome))
    }

    /// Iterates over the assets that loaded.
    pub fn loaded(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.iter()
            .filter_map(|(name, outcome)| outcome.resource().map(|res| (name, res)))
    }

    /// Names of the assets that failed to load.
    pub fn absent(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, outcome)| outcome.is_absent())
            .map(|(name, _)| name)
    }

    /// Finds all assets whose names match the given glob pattern.
    pub fn glob(&self, pattern: &str) -> Result<Vec<(&str, &Outcome)>, glob::PatternError> {
        let matcher = Pattern::new(pattern)?;

        let matches: Vec<_> = self
            .iter()
            .filter(|(name, _)| matcher.matches(name))
            .collect();

        Ok(matches)
    }
}

impl IntoIterator for Assets {
    type Item = (String, Outcome);
    type IntoIter = std::collections::hash_map::IntoIter<String, Outcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.into_iter()
    }
}

/// How far along a batch is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
}

impl Progress {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
        }
    }

    pub(crate) fn advance(&mut self) {
        debug_assert!(self.completed < self.total);
        self.completed += 1;
    }

    /// Completed share of the batch, between `0.0` and `1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }

        self.completed as f64 / self.total as f64
    }

    pub fn is_done(&self) -> bool {
        self.completed == self.total
    }
}
