//! The page store: the single owner and writer of the book's page list.
//!
//! Every mutation goes through a [`PageStore`] operation, and every operation
//! ends in one commit that runs [`reconcile_toc`] before the new list becomes
//! visible. Callers therefore never observe a page list whose TOC pages are
//! out of date, and there is no subscription to keep in sync.
//!
//! Operations are all-or-nothing: they compute the next list on a copy and
//! either commit it whole or return an error with the store untouched.
//!
//! Pages are only ever targeted by id. Index-based addressing exists for the
//! drag gesture ([`DragGesture`]), which resolves the dragged index to an id
//! when the gesture starts and commits a single move when it finishes.

use crate::reconcile::{Reconciled, TocSettings, is_toc_page_id, reconcile_toc};
use crate::types::{Document, Page, PageContent, PageId, PageKind, Theme, starter_contents};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("TOC pages are generated from the sections and cannot be {0} by hand")]
    DerivedPage(&'static str),
    #[error("Invalid page edit: {0}")]
    InvalidPatch(String),
    #[error("Position {index} is out of range (the book has {len} pages)")]
    OutOfRange { index: usize, len: usize },
    #[error("No page with id '{0}'")]
    UnknownPage(PageId),
}

/// Gate for destructive operations. Returning `false` cancels.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// TOC pages created and dropped by the most recent commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocChange {
    pub added: Vec<PageId>,
    pub removed: Vec<PageId>,
}

impl TocChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Source of fresh page ids: `{kind}-{seq:x}`.
///
/// The sequence only increases, so an id is never handed out twice by one
/// store. Seeding it from the wall clock keeps ids from a later session clear
/// of earlier ones; collisions with ids already in the book are skipped.
#[derive(Debug, Clone)]
struct IdSource {
    next: u64,
}

impl IdSource {
    fn from_clock() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(1);
        Self { next: millis }
    }

    fn next_for(&mut self, kind: PageKind, taken: &[Page]) -> PageId {
        loop {
            let id = PageId::new(format!("{}-{:x}", kind, self.next));
            self.next += 1;
            if !taken.iter().any(|p| p.id == id) {
                return id;
            }
        }
    }
}

/// Ordered pages plus the current selection.
#[derive(Debug, Clone)]
pub struct PageStore {
    pages: Vec<Page>,
    theme: Theme,
    selected: Option<PageId>,
    settings: TocSettings,
    ids: IdSource,
    version: u64,
    last_toc_change: TocChange,
}

impl PageStore {
    /// Open a store over `doc`, reconciling its TOC pages right away.
    pub fn new(doc: Document, settings: TocSettings) -> Self {
        Self::with_id_seed(doc, settings, IdSource::from_clock().next)
    }

    /// Like [`PageStore::new`] with a fixed id sequence start.
    pub fn with_id_seed(doc: Document, settings: TocSettings, seed: u64) -> Self {
        let mut store = Self {
            pages: Vec::new(),
            theme: doc.theme,
            selected: None,
            settings,
            ids: IdSource { next: seed },
            version: 0,
            last_toc_change: TocChange::default(),
        };
        store.commit(doc.pages);
        store.version = 0;
        store
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn settings(&self) -> &TocSettings {
        &self.settings
    }

    /// Snapshot of the persistent part of the store.
    pub fn document(&self) -> Document {
        Document {
            pages: self.pages.clone(),
            theme: self.theme.clone(),
        }
    }

    /// Bumped by every commit that actually changes pages or theme.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last_toc_change(&self) -> &TocChange {
        &self.last_toc_change
    }

    pub fn position_of(&self, id: &PageId) -> Option<usize> {
        self.pages.iter().position(|p| &p.id == id)
    }

    pub fn page(&self, id: &PageId) -> Option<&Page> {
        self.pages.iter().find(|p| &p.id == id)
    }

    // =====================================================================
    // Selection
    // =====================================================================

    pub fn select(&mut self, id: &PageId) -> Result<(), StoreError> {
        if self.page(id).is_none() {
            return Err(StoreError::UnknownPage(id.clone()));
        }
        self.selected = Some(id.clone());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&PageId> {
        self.selected.as_ref()
    }

    pub fn selected_page(&self) -> Option<&Page> {
        self.selected.as_ref().and_then(|id| self.page(id))
    }

    fn selected_index(&self) -> Option<usize> {
        self.selected.as_ref().and_then(|id| self.position_of(id))
    }

    // =====================================================================
    // Mutations
    // =====================================================================

    /// Append a page with default content for `kind` and select it.
    pub fn add(&mut self, kind: PageKind) -> Result<PageId, StoreError> {
        self.add_content(PageContent::default_for(kind))
    }

    /// Append a page with the given content and select it.
    pub fn add_content(&mut self, content: PageContent) -> Result<PageId, StoreError> {
        if content.kind() == PageKind::Toc {
            return Err(StoreError::DerivedPage("added"));
        }
        let id = self.ids.next_for(content.kind(), &self.pages);
        let mut pages = self.pages.clone();
        pages.push(Page::new(id.clone(), content));
        self.commit(pages);
        self.selected = Some(id.clone());
        Ok(id)
    }

    /// Merge a JSON merge patch into the selected page.
    ///
    /// Returns `Ok(false)` when nothing is selected or the patch changes
    /// nothing. The patch may not touch `id` or `type`; on a TOC page only
    /// `title` and `scale` are editable.
    pub fn update(&mut self, patch: &Value) -> Result<bool, StoreError> {
        let Some(index) = self.selected_index() else {
            return Ok(false);
        };
        let current = &self.pages[index];

        let Value::Object(fields) = patch else {
            return Err(StoreError::InvalidPatch(
                "an edit must be a JSON object".into(),
            ));
        };
        if let Some(key) = fields.keys().find(|k| *k == "id" || *k == "type") {
            return Err(StoreError::InvalidPatch(format!(
                "`{key}` is fixed once a page exists"
            )));
        }
        if current.is_toc() {
            if let Some(key) = fields.keys().find(|k| *k != "title" && *k != "scale") {
                return Err(StoreError::InvalidPatch(format!(
                    "only `title` and `scale` of a TOC page are editable, not `{key}`"
                )));
            }
        }

        let mut value =
            serde_json::to_value(current).map_err(|e| StoreError::InvalidPatch(e.to_string()))?;
        merge_patch(&mut value, patch);
        let updated: Page =
            serde_json::from_value(value).map_err(|e| StoreError::InvalidPatch(e.to_string()))?;
        if updated == *current {
            return Ok(false);
        }

        let mut pages = self.pages.clone();
        pages[index] = updated;
        self.commit(pages);
        Ok(true)
    }

    /// Typed counterpart of [`PageStore::update`]: edit the selected page's
    /// content in place.
    pub fn edit<F>(&mut self, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut PageContent),
    {
        let Some(index) = self.selected_index() else {
            return Ok(false);
        };
        let current = &self.pages[index].content;
        let mut content = current.clone();
        f(&mut content);

        if content.kind() != current.kind() {
            return Err(StoreError::InvalidPatch(
                "a page cannot change its kind".into(),
            ));
        }
        if let (PageContent::Toc(before), PageContent::Toc(after)) = (current, &content) {
            if before.part != after.part {
                return Err(StoreError::DerivedPage("renumbered"));
            }
        }
        if content == *current {
            return Ok(false);
        }

        let mut pages = self.pages.clone();
        pages[index].content = content;
        self.commit(pages);
        Ok(true)
    }

    /// Delete the selected page once `confirm` agrees, clearing the selection.
    ///
    /// Returns the removed page, or `None` when nothing was selected or the
    /// user cancelled.
    pub fn delete(&mut self, confirm: &mut impl Confirm) -> Result<Option<Page>, StoreError> {
        let Some(index) = self.selected_index() else {
            return Ok(None);
        };
        let page = &self.pages[index];
        if page.is_toc() {
            return Err(StoreError::DerivedPage("deleted"));
        }
        let label = if page.title().trim().is_empty() {
            page.kind().to_string()
        } else {
            page.title().trim().to_string()
        };
        if !confirm.confirm(&format!("Delete page \"{label}\"?")) {
            return Ok(None);
        }

        let mut pages = self.pages.clone();
        let removed = pages.remove(index);
        self.selected = None;
        self.commit(pages);
        Ok(Some(removed))
    }

    /// Move the page at `from` so it ends up at `to`.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<bool, StoreError> {
        let id = self
            .pages
            .get(from)
            .map(|p| p.id.clone())
            .ok_or(StoreError::OutOfRange {
                index: from,
                len: self.pages.len(),
            })?;
        self.move_page(&id, to)
    }

    /// Move the page with `id` so it ends up at index `to`, keeping the
    /// relative order of everything else.
    ///
    /// Returns `false` when the resulting list is unchanged, which is also
    /// the case for TOC pages: the reconciler puts them straight back.
    pub fn move_page(&mut self, id: &PageId, to: usize) -> Result<bool, StoreError> {
        let from = self
            .position_of(id)
            .ok_or_else(|| StoreError::UnknownPage(id.clone()))?;
        if to >= self.pages.len() {
            return Err(StoreError::OutOfRange {
                index: to,
                len: self.pages.len(),
            });
        }
        if from == to {
            return Ok(false);
        }

        let before = self.version;
        let mut pages = self.pages.clone();
        let page = pages.remove(from);
        pages.insert(to, page);
        self.commit(pages);
        Ok(self.version != before)
    }

    pub fn set_theme(&mut self, theme: Theme) -> bool {
        if theme == self.theme {
            return false;
        }
        self.theme = theme;
        self.version += 1;
        true
    }

    /// Replace the whole book (load or import). The selection survives only
    /// if its page is still there.
    pub fn replace_document(&mut self, doc: Document) {
        if doc.theme != self.theme {
            self.theme = doc.theme;
            self.version += 1;
        }
        self.commit(doc.pages);
        if self.selected_index().is_none() {
            self.selected = None;
        }
    }

    /// Wipe the book and start over from the starter pages, once confirmed.
    pub fn reset_to_starter(&mut self, confirm: &mut impl Confirm) -> bool {
        if !confirm.confirm("Replace the whole book with the starter pages?") {
            return false;
        }
        let mut pages = Vec::new();
        for content in starter_contents() {
            let id = self.ids.next_for(content.kind(), &pages);
            pages.push(Page::new(id, content));
        }
        self.selected = None;
        if self.theme != Theme::default() {
            self.theme = Theme::default();
            self.version += 1;
        }
        self.commit(pages);
        true
    }

    /// Reconcile `pages` and make the result current.
    fn commit(&mut self, pages: Vec<Page>) {
        let pages = self.reassign_colliding_ids(pages);
        let pages = match reconcile_toc(&pages, &self.settings) {
            Reconciled::Unchanged => {
                self.last_toc_change = TocChange::default();
                pages
            }
            Reconciled::Updated {
                pages,
                added,
                removed,
            } => {
                self.last_toc_change = TocChange { added, removed };
                pages
            }
        };
        if pages != self.pages {
            self.pages = pages;
            self.version += 1;
        }
    }

    /// Give fresh ids to content pages that repeat an earlier page's id or
    /// sit on an id the reconciler reserves for TOC pages.
    fn reassign_colliding_ids(&mut self, mut pages: Vec<Page>) -> Vec<Page> {
        for i in 0..pages.len() {
            let page = &pages[i];
            let collides = !page.is_toc()
                && (is_toc_page_id(&page.id) || pages[..i].iter().any(|p| p.id == page.id));
            if collides {
                let fresh = self.ids.next_for(page.kind(), &pages);
                pages[i].id = fresh;
            }
        }
        pages
    }
}

/// RFC 7386 JSON merge patch: objects merge key by key, `null` removes a key,
/// anything else replaces the target.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(fields) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(map) = target {
                for (key, value) in fields {
                    if value.is_null() {
                        map.remove(key);
                    } else {
                        merge_patch(map.entry(key.clone()).or_insert(Value::Null), value);
                    }
                }
            }
        }
        _ => *target = patch.clone(),
    }
}

/// A two-phase drag reorder.
///
/// `start` records which page is being dragged (by id), `enter` records the
/// current drop target, `finish` commits one move. Nothing reaches the store
/// before `finish`.
#[derive(Debug, Clone, Default)]
pub struct DragGesture {
    source: Option<PageId>,
    target: Option<usize>,
}

impl DragGesture {
    pub fn start(&mut self, store: &PageStore, index: usize) -> Result<(), StoreError> {
        let page = store.pages().get(index).ok_or(StoreError::OutOfRange {
            index,
            len: store.pages().len(),
        })?;
        self.source = Some(page.id.clone());
        self.target = None;
        Ok(())
    }

    pub fn enter(&mut self, index: usize) {
        if self.source.is_some() {
            self.target = Some(index);
        }
    }

    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    pub fn cancel(&mut self) {
        self.source = None;
        self.target = None;
    }

    /// Commit the gesture. A drag that never entered a target changes nothing.
    pub fn finish(&mut self, store: &mut PageStore) -> Result<bool, StoreError> {
        let source = self.source.take();
        let target = self.target.take();
        match (source, target) {
            (Some(id), Some(to)) => store.move_page(&id, to),
            _ => Ok(false),
        }
    }
}
