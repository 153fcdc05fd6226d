//! Local mirror of the embedded workbook's state.
//!
//! The mirror is rebuilt purely from inbound events: commands never write to
//! it. A `workbook:loaded` event moves it to loaded and clears any earlier
//! error; a `workbook:error` records the error and marks it unloaded until the
//! next successful load. Variables, bookmarks, selection and fullscreen are
//! tracked independently of that status.
//!
//! Bookmarks keep insertion order and are addressed by id. Updates or deletes
//! for ids the mirror has never seen are ignored, since the remote side is
//! authoritative and events may arrive out of order.

use std::collections::BTreeMap;
use std::sync::RwLock;

use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};
use workbook_protocol::{Bookmark, EventPayload, RemoteError, SelectionInfo};

/// Top-level load status derived from the mirror fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkbookStatus {
    Unloaded,
    Loaded,
    Errored,
}

/// Snapshot of everything the workbook has announced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookState {
    pub loaded: bool,
    pub data_loaded: bool,
    pub error: Option<RemoteError>,
    pub variables: BTreeMap<String, String>,
    pub bookmarks: Vec<Bookmark>,
    pub selected_bookmark_id: Option<String>,
    pub fullscreen_node_id: Option<String>,
    pub selected_element: Option<SelectionInfo>,
    pub page_height: Option<f64>,
    /// Metadata from the last `workbook:loaded`, minus its variables.
    pub workbook: Option<Map<String, Value>>,
}

impl WorkbookState {
    pub fn status(&self) -> WorkbookStatus {
        if self.error.is_some() {
            WorkbookStatus::Errored
        } else if self.loaded {
            WorkbookStatus::Loaded
        } else {
            WorkbookStatus::Unloaded
        }
    }

    pub fn is_workbook_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_data_loaded(&self) -> bool {
        self.data_loaded
    }

    pub fn error(&self) -> Option<&RemoteError> {
        self.error.as_ref()
    }

    pub fn current_variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn workbook_metadata(&self) -> Option<&Map<String, Value>> {
        self.workbook.as_ref()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen_node_id.is_some()
    }

    pub fn bookmark(&self, id: &str) -> Option<&Bookmark> {
        self.bookmarks.iter().find(|b| b.id == id)
    }

    /// Fold one inbound event into the state.
    pub fn apply(&mut self, event: &EventPayload) {
        match event {
            EventPayload::Loaded(loaded) => {
                self.loaded = true;
                self.error = None;
                if let Some(variables) = &loaded.workbook.variables {
                    self.variables = variables.clone();
                }
                self.workbook = Some(loaded.workbook.metadata.clone());
            }
            EventPayload::Error(error) => {
                self.error = Some(error.clone());
                self.loaded = false;
            }
            EventPayload::DataLoaded(_) => self.data_loaded = true,
            EventPayload::VariableChange(change) => {
                self.variables
                    .insert(change.name.clone(), change.value.clone());
            }
            EventPayload::ElementSelect(selection) => {
                self.selected_element = Some(selection.clone());
            }
            EventPayload::ActionOutbound(_) => {}
            EventPayload::Fullscreen(change) => {
                self.fullscreen_node_id = change.node_id.clone();
            }
            EventPayload::PageHeight(page) => self.page_height = Some(page.height),
            EventPayload::BookmarkCreate(bookmark) => self.upsert_bookmark(bookmark),
            EventPayload::BookmarkChange(bookmark) => {
                if self.replace_bookmark(bookmark) {
                    self.selected_bookmark_id = Some(bookmark.id.clone());
                }
            }
            EventPayload::BookmarkUpdate(bookmark) => {
                self.replace_bookmark(bookmark);
            }
            EventPayload::BookmarkDelete(bookmark) => {
                self.bookmarks.retain(|b| b.id != bookmark.id);
                if self.selected_bookmark_id.as_deref() == Some(bookmark.id.as_str()) {
                    self.selected_bookmark_id = None;
                }
            }
        }
    }

    fn upsert_bookmark(&mut self, bookmark: &Bookmark) {
        match self.bookmarks.iter_mut().find(|b| b.id == bookmark.id) {
            Some(existing) => *existing = bookmark.clone(),
            None => self.bookmarks.push(bookmark.clone()),
        }
    }

    /// Replace a known bookmark. Returns false for an unknown id.
    fn replace_bookmark(&mut self, bookmark: &Bookmark) -> bool {
        match self.bookmarks.iter_mut().find(|b| b.id == bookmark.id) {
            Some(existing) => {
                *existing = bookmark.clone();
                true
            }
            None => {
                debug!("Ignoring update for unknown bookmark {}", bookmark.id);
                false
            }
        }
    }
}

/// Thread-safe holder for the single writable [`WorkbookState`] of one embed.
#[derive(Debug, Default)]
pub struct StateMirror {
    state: RwLock<WorkbookState>,
}

impl StateMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn apply(&self, event: &EventPayload) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .apply(event);
    }

    pub(crate) fn reset(&self) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = WorkbookState::default();
    }

    pub fn snapshot(&self) -> WorkbookState {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
