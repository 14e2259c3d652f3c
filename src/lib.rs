//! # Recipe Book
//!
//! The editing model of a multi-page recipe e-book: cover, intro, table of
//! contents, section dividers, recipes, shopping list, and legend, exported
//! to a paginated document.
//!
//! # Architecture: Derived Table of Contents
//!
//! The table of contents is never authored. It is derived from the titled
//! section pages every time the page list changes:
//!
//! ```text
//! pages ──► build_toc_items ──► split_toc_into_parts ──► reconcile_toc ──► pages'
//!  (sections)    (entries)          (chunks per page)      (TOC pages spliced in)
//! ```
//!
//! TOC pages hold only their title, display scale, and part number. Their
//! entries are recomputed at render time, so they cannot go stale. The
//! reconciler gives TOC pages deterministic ids (`toc-1`, `toc-2`, ...) and
//! carries user edits over to the page with the same id, which makes
//! reconciling a reconciled list a no-op.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Pages, page kinds, per-kind payloads, theme, document |
//! | [`toc`] | TOC entry builder and paginator |
//! | [`numbering`] | Printable page numbers (the cover is unnumbered) |
//! | [`reconcile`] | Brings the generated TOC pages in line with the sections |
//! | [`store`] | Single-writer page store: add, edit, delete, reorder, select |
//! | [`persist`] | Storage record, autosave debouncing, import/export |
//! | [`ai`] | Validation boundary for generated recipe, intro and shopping content |
//! | [`render`] | Maud HTML for every page kind, screen vs print, exporters |
//! | [`config`] | `config.toml` loading, validation, stock defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Reconcile On Commit
//!
//! Every [`store::PageStore`] mutation ends in one commit that runs the
//! reconciler before the new list becomes visible. No caller ever observes a
//! page list whose TOC pages disagree with its sections, and there is no
//! second pass that could fire twice.
//!
//! ## Content-Driven TOC Sizing
//!
//! The number of TOC pages is `ceil(titled sections / max entries per page)`,
//! and zero when there are no titled sections. A book without sections has
//! no empty table of contents.
//!
//! ## Print Markup Has No Editor Chrome
//!
//! Rendering takes a [`render::RenderMode`]. Print mode never emits the
//! badges and selection outline of the editor view, so the exporter gets
//! clean pages without a filtering step.

pub mod ai;
pub mod config;
pub mod numbering;
pub mod output;
pub mod persist;
pub mod reconcile;
pub mod render;
pub mod store;
pub mod toc;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
