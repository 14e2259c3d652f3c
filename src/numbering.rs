//! Printable page numbers.
//!
//! Every page except the cover gets a 1-based number in list order. The same
//! map feeds the on-screen footer and the numbers printed next to TOC
//! entries, so the two always agree; there is no separate print-time pass.

use crate::types::{Page, PageId};
use std::collections::HashMap;

/// Shown wherever a page has no printable number.
pub const NO_NUMBER: &str = "--";

/// Map from page id to its printable page number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageNumbers {
    numbers: HashMap<PageId, u32>,
}

impl PageNumbers {
    /// The page's number, or `None` for non-printable (or unknown) pages.
    pub fn get(&self, id: &PageId) -> Option<u32> {
        self.numbers.get(id).copied()
    }

    /// The page's number as display text, [`NO_NUMBER`] when it has none.
    pub fn label(&self, id: &PageId) -> String {
        self.get(id)
            .map(|n| n.to_string())
            .unwrap_or_else(|| NO_NUMBER.to_string())
    }

    pub fn contains(&self, id: &PageId) -> bool {
        self.numbers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

/// Assign sequential printable numbers, skipping non-printable kinds.
pub fn printable_page_numbers(pages: &[Page]) -> PageNumbers {
    let numbers = pages
        .iter()
        .filter(|page| page.kind().is_printable())
        .zip(1u32..)
        .map(|(page, number)| (page.id.clone(), number))
        .collect();
    PageNumbers { numbers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    #[test]
    fn cover_gets_no_number_and_next_page_is_one() {
        let pages = vec![cover("c"), intro("i"), section("s", "Massas")];
        let numbers = printable_page_numbers(&pages);
        assert_eq!(numbers.get(&"c".into()), None);
        assert_eq!(numbers.get(&"i".into()), Some(1));
        assert_eq!(numbers.get(&"s".into()), Some(2));
        assert_eq!(numbers.len(), 2);
    }

    #[test]
    fn cover_in_the_middle_is_skipped_too() {
        let pages = vec![intro("i"), cover("c"), recipe("r", "Pão")];
        let numbers = printable_page_numbers(&pages);
        assert_eq!(numbers.get(&"r".into()), Some(2));
        assert!(!numbers.contains(&"c".into()));
    }

    #[test]
    fn label_uses_placeholder_for_unnumbered_pages() {
        let pages = vec![cover("c"), intro("i")];
        let numbers = printable_page_numbers(&pages);
        assert_eq!(numbers.label(&"c".into()), NO_NUMBER);
        assert_eq!(numbers.label(&"missing".into()), NO_NUMBER);
        assert_eq!(numbers.label(&"i".into()), "1");
    }

    #[test]
    fn toc_pages_are_numbered() {
        let pages = vec![cover("c"), toc("toc-1", 1, "Sumário"), section("s", "A")];
        let numbers = printable_page_numbers(&pages);
        assert_eq!(numbers.get(&"toc-1".into()), Some(1));
        assert_eq!(numbers.get(&"s".into()), Some(2));
    }

    #[test]
    fn empty_list_has_no_numbers() {
        assert!(printable_page_numbers(&[]).is_empty());
    }
}
