//! Ordered, duplicate-free sets of feature names

use serde::{Deserialize, Serialize};

/// A set of feature identifiers.
///
/// Membership is what selection logic cares about; insertion order is kept so
/// that displays and tie-breaks follow the original column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(Vec<String>);

impl FeatureSet {
    /// Build a set from names, dropping later duplicates.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !out.contains(&name) {
                out.push(name);
            }
        }
        FeatureSet(out)
    }

    pub fn empty() -> Self {
        FeatureSet(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Position of a feature in this set's order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    /// Features present in both sets, in this set's order
    pub fn intersection(&self, other: &FeatureSet) -> FeatureSet {
        FeatureSet(
            self.0
                .iter()
                .filter(|n| other.contains(n))
                .cloned()
                .collect(),
        )
    }

    /// Features present in either set: this set's order, then the other's extras
    pub fn union(&self, other: &FeatureSet) -> FeatureSet {
        let mut out = self.0.clone();
        for name in &other.0 {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        FeatureSet(out)
    }

    pub fn is_subset_of(&self, other: &FeatureSet) -> bool {
        self.0.iter().all(|n| other.contains(n))
    }

    /// Names in this set that are missing from `domain`
    pub fn outside_of(&self, domain: &FeatureSet) -> Vec<String> {
        self.0
            .iter()
            .filter(|n| !domain.contains(n))
            .cloned()
            .collect()
    }

    /// Reorder this set to follow `domain`'s order; names outside `domain` are dropped.
    pub fn ordered_by(&self, domain: &FeatureSet) -> FeatureSet {
        FeatureSet(
            domain
                .iter()
                .filter(|n| self.contains(n))
                .cloned()
                .collect(),
        )
    }
}

impl<S: Into<String>> FromIterator<S> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        FeatureSet::new(iter)
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}
