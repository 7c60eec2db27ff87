//! Application catalog and the lists derived from it.
//!
//! The catalog is loaded once per session from the config daemon and never
//! mutated afterwards; every function here is a pure projection over it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// One launchable application as reported by the config daemon.
///
/// Every field is optional: the daemon makes no promise that a record is
/// complete, and incomplete records are skipped rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppEntry {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "EntryName", default)]
    pub entry_name: Option<String>,
    #[serde(rename = "IconPath", default)]
    pub icon_path: Option<String>,
}

impl AppEntry {
    /// Project into a displayable result, or `None` if a field is missing.
    pub fn project(&self) -> Option<SearchResult> {
        Some(SearchResult {
            name: self.name.clone()?,
            entry_name: self.entry_name.clone()?,
            icon_path: self.icon_path.clone()?,
        })
    }
}

/// `(name, entry_name, icon_path)`. Field order drives the derived ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SearchResult {
    pub name: String,
    pub entry_name: String,
    pub icon_path: String,
}

#[derive(Debug, Clone, Default)]
pub struct AppCatalog {
    entries: Vec<AppEntry>,
}

impl AppCatalog {
    /// Parse the JSON array returned by `get_apps_list`.
    ///
    /// Records that are not objects, or carry non-string fields, are dropped
    /// with a warning. A payload that is not an array at all is an error.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<serde_json::Value> =
            serde_json::from_str(json).context("Application list is not a JSON array")?;

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_value::<AppEntry>(record) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Dropping malformed application record: {}", e),
            }
        }

        debug!("Loaded {} application entries", entries.len());
        Ok(AppCatalog { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        search(&self.entries, query)
    }

    pub fn dock_items(&self, membership: &HashSet<String>) -> Vec<SearchResult> {
        dock_items(&self.entries, membership)
    }
}

/// Case-insensitive prefix search on application names.
///
/// The first entry carrying a given name wins; later entries with the same
/// name are ignored regardless of how they would sort. The result is sorted
/// by `(name, entry_name, icon_path)`. An empty query matches everything.
#[must_use]
pub fn search(catalog: &[AppEntry], query: &str) -> Vec<SearchResult> {
    let query = query.to_lowercase();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut results = Vec::new();

    for entry in catalog {
        let Some(name) = entry.name.as_deref() else {
            continue;
        };
        if seen.contains(name) || !name.to_lowercase().starts_with(&query) {
            continue;
        }
        if let Some(result) = entry.project() {
            seen.insert(name);
            results.push(result);
        }
    }

    results.sort();
    results
}

/// Entries pinned to the dock, in catalog order.
///
/// No deduplication: a catalog listing the same entry twice yields it twice.
#[must_use]
pub fn dock_items(catalog: &[AppEntry], membership: &HashSet<String>) -> Vec<SearchResult> {
    catalog
        .iter()
        .filter(|entry| {
            entry
                .entry_name
                .as_ref()
                .is_some_and(|id| membership.contains(id))
        })
        .filter_map(AppEntry::project)
        .collect()
}

/// Parse the JSON array of entry names returned by `get_dock_items`.
pub fn parse_membership(json: &str) -> Result<HashSet<String>> {
    let names: Vec<String> =
        serde_json::from_str(json).context("Dock item list is not a JSON array of strings")?;
    Ok(names.into_iter().collect())
}
