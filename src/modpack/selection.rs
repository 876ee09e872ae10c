use super::manifest::{Manifest, ManifestEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Paths of the manifest entries the user wants installed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet(BTreeSet<String>);

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry of the manifest
    pub fn all_of(manifest: &Manifest) -> Self {
        manifest.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Drop paths that no manifest entry has
    pub fn retain_known(&self, manifest: &Manifest) -> Self {
        let known: BTreeSet<&str> = manifest.files.iter().map(|f| f.path.as_str()).collect();
        self.0
            .iter()
            .filter(|p| known.contains(p.as_str()))
            .cloned()
            .collect()
    }

    /// Same set without `paths`
    pub fn without<'a>(&self, paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut set = self.0.clone();
        for path in paths {
            set.remove(path);
        }
        Self(set)
    }

    pub fn contains(&self, entry: &ManifestEntry) -> bool {
        self.0.contains(&entry.path)
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
