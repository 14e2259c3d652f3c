//! Table-of-contents derivation: the builder and the paginator.
//!
//! Both are pure functions over the page list. The reconciler
//! ([`crate::reconcile`]) decides how many physical TOC pages exist from their
//! output, and the TOC renderer calls them again at render time to fill each
//! page, so entries are never stored on the TOC pages themselves.
//!
//! ```text
//! pages ──build_toc_items──▶ [TocItem] ──split_toc_into_parts──▶ [[TocItem]]
//!                                                                 one chunk per TOC page
//! ```

use crate::types::{Page, PageContent, TocItem};
use std::num::NonZeroUsize;

/// Derive TOC entries from the page list.
///
/// Emits one entry per `section` page whose trimmed title is non-empty, in
/// page order. Untitled sections are skipped so half-filled dividers don't
/// show up in the TOC. Identical titles are kept as separate entries, each
/// pointing at its own page. TOC pages in the input contribute nothing.
pub fn build_toc_items(pages: &[Page]) -> Vec<TocItem> {
    pages
        .iter()
        .filter_map(|page| match &page.content {
            PageContent::Section(section) => {
                let title = section.title.trim();
                (!title.is_empty()).then(|| TocItem {
                    title: title.to_string(),
                    page_id: page.id.clone(),
                })
            }
            _ => None,
        })
        .collect()
}

/// Split entries into chunks of at most `max_per_page`, preserving order.
///
/// Never yields an empty chunk, except that zero entries yield a single empty
/// chunk (`[[]]`). Whether that chunk becomes a physical page is the
/// reconciler's call.
pub fn split_toc_into_parts(items: &[TocItem], max_per_page: NonZeroUsize) -> Vec<Vec<TocItem>> {
    if items.is_empty() {
        return vec![Vec::new()];
    }
    items
        .chunks(max_per_page.get())
        .map(<[TocItem]>::to_vec)
        .collect()
}

/// Entries shown on TOC page `part` (1-based), computed from the current pages.
///
/// Returns an empty list for a part that no longer exists.
pub fn entries_for_part(pages: &[Page], part: u32, max_per_page: NonZeroUsize) -> Vec<TocItem> {
    let content: Vec<Page> = pages.iter().filter(|p| !p.is_toc()).cloned().collect();
    let items = build_toc_items(&content);
    let index = match (part as usize).checked_sub(1) {
        Some(i) => i,
        None => return Vec::new(),
    };
    split_toc_into_parts(&items, max_per_page)
        .into_iter()
        .nth(index)
        .unwrap_or_default()
}
