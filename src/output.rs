//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Pages are listed by position and title first. The id, which commands take
//! as an argument, follows as indented context, the same two-level pattern
//! for every entity:
//!
//! ```text
//! Pages
//! 000   -- cover    Livro de Receitas
//!     Id: cover-18c2f
//! 001    1 toc      Sumário
//!     Id: toc-1
//! 002    2 section  Café da manhã
//!     Id: section-18c30
//! ```
//!
//! ## TOC
//!
//! ```text
//! Sumário (toc-1, part 1)
//!     Café da manhã ........ 2
//!     Almoço ............... 5
//! ```
//!
//! ## Reconciliation and saving
//!
//! ```text
//! TOC pages added: toc-2
//! Saved ebook-receitas
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::numbering::printable_page_numbers;
use crate::persist::SaveOutcome;
use crate::reconcile::TocSettings;
use crate::store::TocChange;
use crate::toc::entries_for_part;
use crate::types::{Page, PageContent, PageId};

/// Width the TOC dot leaders pad entries to.
const TOC_LINE_WIDTH: usize = 40;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 0-based position as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Display title, with a marker for pages that have none.
fn display_title(page: &Page) -> &str {
    match page.title().trim() {
        "" => "(untitled)",
        title => title,
    }
}

fn join_ids(ids: &[PageId]) -> String {
    ids.iter()
        .map(PageId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Page list
// ============================================================================

/// Format the page list: position, printable number, kind, and title.
pub fn format_page_list(pages: &[Page]) -> Vec<String> {
    let numbers = printable_page_numbers(pages);
    let mut lines = vec!["Pages".to_string()];
    if pages.is_empty() {
        lines.push(format!("{}(empty)", indent(1)));
        return lines;
    }
    for (pos, page) in pages.iter().enumerate() {
        lines.push(format!(
            "{} {:>4} {:<8} {}",
            format_index(pos),
            numbers.label(&page.id),
            page.kind().as_str(),
            display_title(page)
        ));
        lines.push(format!("{}Id: {}", indent(1), page.id));
        match &page.content {
            PageContent::Intro(intro) if !intro.text.trim().is_empty() => {
                let first = intro.text.lines().next().unwrap_or_default();
                lines.push(format!("{}Text: {}", indent(1), truncate_desc(first, 40)));
            }
            PageContent::Recipe(recipe) => {
                let ingredients: usize = recipe.ingredient_groups.iter().map(|g| g.items.len()).sum();
                lines.push(format!(
                    "{}{} ingredients, {} steps",
                    indent(1),
                    ingredients,
                    recipe.steps.len()
                ));
            }
            _ => {}
        }
    }
    lines
}

pub fn print_page_list(pages: &[Page]) {
    for line in format_page_list(pages) {
        println!("{}", line);
    }
}

/// One-line summary of a single page.
pub fn format_page_line(page: &Page) -> String {
    format!("{} {} ({})", page.kind(), page.id, display_title(page))
}

// ============================================================================
// Table of contents
// ============================================================================

/// Format every TOC page with the entries it shows and their page numbers.
pub fn format_toc(pages: &[Page], settings: &TocSettings) -> Vec<String> {
    let numbers = printable_page_numbers(pages);
    let mut lines = Vec::new();
    for page in pages {
        let PageContent::Toc(toc) = &page.content else {
            continue;
        };
        lines.push(format!("{} ({}, part {})", toc.title, page.id, toc.part));
        let entries = entries_for_part(pages, toc.part, settings.max_per_page);
        if entries.is_empty() {
            lines.push(format!("{}(no entries)", indent(1)));
        }
        for entry in entries {
            let label = numbers.label(&entry.page_id);
            let used = entry.title.chars().count() + label.chars().count() + 2;
            let dots = ".".repeat(TOC_LINE_WIDTH.saturating_sub(used).max(3));
            lines.push(format!("{}{} {} {}", indent(1), entry.title, dots, label));
        }
    }
    if lines.is_empty() {
        lines.push("No titled sections, no table of contents".to_string());
    }
    lines
}

pub fn print_toc(pages: &[Page], settings: &TocSettings) {
    for line in format_toc(pages, settings) {
        println!("{}", line);
    }
}

// ============================================================================
// Reconciliation and saving
// ============================================================================

/// Format the TOC pages a change created or dropped. Empty when neither.
pub fn format_toc_change(change: &TocChange) -> Vec<String> {
    let mut lines = Vec::new();
    if !change.added.is_empty() {
        lines.push(format!("TOC pages added: {}", join_ids(&change.added)));
    }
    if !change.removed.is_empty() {
        lines.push(format!("TOC pages removed: {}", join_ids(&change.removed)));
    }
    lines
}

pub fn print_toc_change(change: &TocChange) {
    for line in format_toc_change(change) {
        println!("{}", line);
    }
}

pub fn format_save_outcome(outcome: SaveOutcome, key: &str) -> String {
    match outcome {
        SaveOutcome::Saved => format!("Saved {key}"),
        SaveOutcome::Unchanged => format!("No changes to save in {key}"),
        SaveOutcome::Pending => format!("Save of {key} pending"),
        SaveOutcome::Idle => "Nothing to save".to_string(),
    }
}

pub fn print_save_outcome(outcome: SaveOutcome, key: &str) {
    println!("{}", format_save_outcome(outcome, key));
}
