//! Shared test utilities: page builders and page-list extractors.
//!
//! Builders take explicit ids so assertions can compare whole layouts:
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let pages = with_cover(sections(3));
//! assert_eq!(ids(&pages), vec!["cover", "s1", "s2", "s3"]);
//! ```

use crate::types::{
    CoverPage, IntroPage, Page, PageContent, PageKind, RecipePage, SectionPage, TocItem, TocPage,
};

// =========================================================================
// Page builders
// =========================================================================

pub fn cover(id: &str) -> Page {
    Page::new(
        id,
        PageContent::Cover(CoverPage {
            title: "Livro".to_string(),
            ..CoverPage::default()
        }),
    )
}

pub fn intro(id: &str) -> Page {
    Page::new(
        id,
        PageContent::Intro(IntroPage {
            title: "Introdução".to_string(),
            text: "Olá".to_string(),
        }),
    )
}

pub fn section(id: &str, title: &str) -> Page {
    Page::new(
        id,
        PageContent::Section(SectionPage {
            title: title.to_string(),
            ..SectionPage::default()
        }),
    )
}

pub fn recipe(id: &str, title: &str) -> Page {
    Page::new(
        id,
        PageContent::Recipe(RecipePage {
            title: title.to_string(),
            ..RecipePage::default()
        }),
    )
}

pub fn toc(id: &str, part: u32, title: &str) -> Page {
    Page::new(
        id,
        PageContent::Toc(TocPage {
            title: title.to_string(),
            part,
            scale: None,
        }),
    )
}

pub fn page_of(id: &str, kind: PageKind) -> Page {
    Page::new(id, PageContent::default_for(kind))
}

/// `count` titled sections with ids `s1..` and titles `Section 1..`.
pub fn sections(count: usize) -> Vec<Page> {
    (1..=count)
        .map(|i| section(&format!("s{i}"), &format!("Section {i}")))
        .collect()
}

/// Prepend a cover with id `cover`.
pub fn with_cover(mut pages: Vec<Page>) -> Vec<Page> {
    pages.insert(0, cover("cover"));
    pages
}

// =========================================================================
// Extractors
// =========================================================================

pub fn ids(pages: &[Page]) -> Vec<&str> {
    pages.iter().map(|p| p.id.as_str()).collect()
}

pub fn kinds(pages: &[Page]) -> Vec<PageKind> {
    pages.iter().map(Page::kind).collect()
}

pub fn toc_pages(pages: &[Page]) -> Vec<&Page> {
    pages.iter().filter(|p| p.is_toc()).collect()
}

pub fn toc_titles(pages: &[Page]) -> Vec<&str> {
    toc_pages(pages).into_iter().map(Page::title).collect()
}

pub fn toc_parts(pages: &[Page]) -> Vec<u32> {
    pages
        .iter()
        .filter_map(|p| match &p.content {
            PageContent::Toc(t) => Some(t.part),
            _ => None,
        })
        .collect()
}

pub fn item_titles(items: &[TocItem]) -> Vec<&str> {
    items.iter().map(|i| i.title.as_str()).collect()
}

/// Find a page by id. Panics with the available ids on miss.
pub fn find<'a>(pages: &'a [Page], id: &str) -> &'a Page {
    pages
        .iter()
        .find(|p| p.id.as_str() == id)
        .unwrap_or_else(|| panic!("page '{id}' not found. Available: {:?}", ids(pages)))
}

// =========================================================================
// In-place edits (bypassing the store)
// =========================================================================

pub fn set_title(pages: &mut [Page], id: &str, title: &str) {
    let page = pages
        .iter_mut()
        .find(|p| p.id.as_str() == id)
        .unwrap_or_else(|| panic!("page '{id}' not found"));
    page.content.set_title(title);
}

pub fn set_toc_title(pages: &mut [Page], id: &str, title: &str) {
    let page = pages
        .iter_mut()
        .find(|p| p.id.as_str() == id)
        .unwrap_or_else(|| panic!("TOC page '{id}' not found"));
    assert!(page.is_toc(), "page '{id}' is not a TOC page");
    page.content.set_title(title);
}
