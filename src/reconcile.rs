//! TOC reconciliation: keep the physical TOC pages in step with the sections.
//!
//! The store calls [`reconcile_toc`] after every mutation of the page list.
//! It computes the TOC pages the current sections require and merges them
//! against the TOC pages already present:
//!
//! 1. Split the list into TOC pages and content pages.
//! 2. Build entries from the content pages and paginate them; zero entries
//!    means zero TOC pages.
//! 3. Generate one TOC record per chunk with the deterministic id
//!    `toc-{part}`. A record whose id already exists keeps that page's
//!    `title` and `scale`; new ones get the default titles.
//! 4. Splice the records in front of the first `section` or `recipe` page
//!    (at the end if there is none).
//! 5. Compare the candidate with the current list position by position. When
//!    nothing differs the result is [`Reconciled::Unchanged`] and callers must
//!    not write, otherwise the write would trigger another pass.
//!
//! Running the reconciler on its own output is always `Unchanged`.

use crate::toc::{build_toc_items, split_toc_into_parts};
use crate::types::{Page, PageContent, PageId, PageKind, TocPage};
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// How TOC pages are sized and titled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocSettings {
    /// Maximum entries on one TOC page.
    pub max_per_page: NonZeroUsize,
    /// Default title of the first TOC page.
    pub first_title: String,
    /// Default title of every following TOC page.
    pub continuation_title: String,
}

impl TocSettings {
    /// Title given to a newly generated TOC page.
    pub fn default_title(&self, part: u32) -> String {
        if part <= 1 {
            self.first_title.clone()
        } else {
            self.continuation_title.clone()
        }
    }
}

impl Default for TocSettings {
    fn default() -> Self {
        Self {
            max_per_page: NonZeroUsize::new(12).unwrap_or(NonZeroUsize::MIN),
            first_title: "Sumário".to_string(),
            continuation_title: "Sumário (continuação)".to_string(),
        }
    }
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// The page list already matches; leave it alone.
    Unchanged,
    /// The page list must be replaced with `pages`.
    Updated {
        pages: Vec<Page>,
        /// TOC pages created by this pass.
        added: Vec<PageId>,
        /// TOC pages dropped by this pass.
        removed: Vec<PageId>,
    },
}

impl Reconciled {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Reconciled::Unchanged)
    }

    /// The reconciled list, falling back to `current` when nothing changed.
    pub fn into_pages(self, current: Vec<Page>) -> Vec<Page> {
        match self {
            Reconciled::Unchanged => current,
            Reconciled::Updated { pages, .. } => pages,
        }
    }
}

/// Deterministic id of the TOC page rendering chunk `part`.
pub fn toc_page_id(part: u32) -> PageId {
    PageId::new(format!("toc-{part}"))
}

/// Whether `id` has the shape of a generated TOC page id.
pub fn is_toc_page_id(id: &PageId) -> bool {
    id.as_str()
        .strip_prefix("toc-")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Number of TOC pages the given pages require.
pub fn required_toc_pages(pages: &[Page], max_per_page: NonZeroUsize) -> usize {
    let items = build_toc_items(pages);
    if items.is_empty() {
        0
    } else {
        split_toc_into_parts(&items, max_per_page).len()
    }
}

/// Where TOC pages go in a list without TOC pages: in front of the first
/// section or recipe, or at the end.
pub fn insertion_point(content: &[Page]) -> usize {
    content
        .iter()
        .position(|p| matches!(p.kind(), PageKind::Section | PageKind::Recipe))
        .unwrap_or(content.len())
}

/// Compute the page list with its TOC pages brought up to date.
pub fn reconcile_toc(pages: &[Page], settings: &TocSettings) -> Reconciled {
    let (existing_toc, content): (Vec<&Page>, Vec<&Page>) = pages.iter().partition(|p| p.is_toc());

    let existing: HashMap<&PageId, &TocPage> = existing_toc
        .iter()
        .filter_map(|page| match &page.content {
            PageContent::Toc(toc) => Some((&page.id, toc)),
            _ => None,
        })
        .collect();

    let mut candidate: Vec<Page> = content.into_iter().cloned().collect();
    let required = required_toc_pages(&candidate, settings.max_per_page);

    let generated: Vec<Page> = (1..=required as u32)
        .map(|part| {
            let id = toc_page_id(part);
            let (title, scale) = match existing.get(&id) {
                Some(previous) => (previous.title.clone(), previous.scale),
                None => (settings.default_title(part), None),
            };
            Page::new(id, PageContent::Toc(TocPage { title, part, scale }))
        })
        .collect();

    if same_layout(pages, &candidate_with(&candidate, &generated)) {
        return Reconciled::Unchanged;
    }

    let added: Vec<PageId> = generated
        .iter()
        .filter(|p| !existing.contains_key(&p.id))
        .map(|p| p.id.clone())
        .collect();
    let removed: Vec<PageId> = existing_toc
        .iter()
        .filter(|p| !generated.iter().any(|g| g.id == p.id))
        .map(|p| p.id.clone())
        .collect();

    let at = insertion_point(&candidate);
    candidate.splice(at..at, generated);

    Reconciled::Updated {
        pages: candidate,
        added,
        removed,
    }
}

/// Convenience wrapper: the reconciled list itself.
pub fn reconciled_pages(pages: Vec<Page>, settings: &TocSettings) -> Vec<Page> {
    reconcile_toc(&pages, settings).into_pages(pages)
}

fn candidate_with<'a>(content: &'a [Page], generated: &'a [Page]) -> Vec<&'a Page> {
    let at = insertion_point(content);
    content[..at]
        .iter()
        .chain(generated)
        .chain(&content[at..])
        .collect()
}

/// Position-by-position comparison on `(id, kind)`, plus `part` for TOC pages
/// so a stale part number never survives a pass.
fn same_layout(current: &[Page], candidate: &[&Page]) -> bool {
    current.len() == candidate.len()
        && current
            .iter()
            .zip(candidate)
            .all(|(a, b)| a.id == b.id && a.kind() == b.kind() && toc_part(a) == toc_part(b))
}

fn toc_part(page: &Page) -> Option<u32> {
    match &page.content {
        PageContent::Toc(toc) => Some(toc.part),
        _ => None,
    }
}
