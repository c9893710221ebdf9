use std::collections::HashMap;

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use parking_lot::RwLock;

use crate::fields::NoteItem;
use crate::schedule::{build_schedule, ScheduledOccurrence};

/// In-memory registry of the currently loaded items. The storage
/// collaborator pushes item updates in; rendering collaborators query
/// windows out. Expansion itself is pure, so concurrent readers need no
/// coordination beyond the item map's lock.
pub struct PlannerService {
    items: RwLock<HashMap<String, NoteItem>>,
}

impl PlannerService {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    pub fn upsert_item(&self, item: NoteItem) {
        let mut items = self.items.write();
        tracing::debug!(path = %item.path, "loaded item");
        items.insert(item.path.clone(), item);
    }

    pub fn remove_item(&self, path: &str) -> bool {
        self.items.write().remove(path).is_some()
    }

    pub fn item(&self, path: &str) -> Result<NoteItem> {
        self.items
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("item not loaded: {path}"))
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.items.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// All loaded items' occurrences inside the window, sorted by start and
    /// then occurrence id.
    pub fn schedule(
        &self,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
    ) -> Vec<ScheduledOccurrence> {
        let items = self.items.read();
        let mut rows: Vec<ScheduledOccurrence> = items
            .values()
            .flat_map(|item| build_schedule(item, window_start, window_end))
            .collect();
        rows.sort();
        rows
    }

    pub fn schedule_for(
        &self,
        path: &str,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
    ) -> Result<Vec<ScheduledOccurrence>> {
        let items = self.items.read();
        let item = items
            .get(path)
            .ok_or_else(|| anyhow!("item not loaded: {path}"))?;
        Ok(build_schedule(item, window_start, window_end))
    }

    /// Record the occurrence's calendar day in the item's completed-dates
    /// list.
    pub fn mark_completed(&self, path: &str, start: NaiveDateTime) -> Result<()> {
        let mut items = self.items.write();
        let item = items
            .get_mut(path)
            .ok_or_else(|| anyhow!("item not loaded: {path}"))?;
        item.push_completed_day(start.date());
        tracing::debug!(path, day = %start.date(), "marked occurrence day complete");
        Ok(())
    }
}

impl Default for PlannerService {
    fn default() -> Self {
        Self::new()
    }
}
