//! HTML rendering and export of the book.
//!
//! Every page becomes one A4 `section.page`. Footers and TOC entries read
//! their numbers from the same [`PageNumbers`] map, computed once per render
//! over the same page list, so the two can never disagree.
//!
//! ## Render modes
//!
//! - [`RenderMode::Screen`]: the editor view. Adds chrome marked
//!   `screen-only` (kind/id badges and the selection outline).
//! - [`RenderMode::Print`]: what the rasterizer receives. Chrome is never
//!   emitted, so nothing has to be filtered out afterwards.
//!
//! TOC pages store no entries. Their contents are derived here from the live
//! section pages via [`entries_for_part`].
//!
//! ## Export
//!
//! [`Exporter`] is the seam to whatever turns HTML into a file (a headless
//! browser printing to PDF, for instance). [`HtmlExporter`] writes the print
//! markup as a standalone HTML file. [`export_book`] renders in print mode and
//! runs the exporter under an [`InFlight`] guard.

use crate::ai::InFlight;
use crate::numbering::{PageNumbers, printable_page_numbers};
use crate::reconcile::TocSettings;
use crate::store::PageStore;
use crate::toc::entries_for_part;
use crate::types::{
    CoverPage, Document, ImagePosition, IntroPage, LegendPage, Page, PageContent, PageId,
    RecipePage, SectionPage, ShoppingPage, Theme, TocPage,
};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Parser, html as md_html};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CSS_STATIC: &str = include_str!("../static/book.css");

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("An export is already in progress")]
    Busy,
    #[error("Exporter failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Screen,
    Print,
}

impl RenderMode {
    fn is_screen(self) -> bool {
        self == RenderMode::Screen
    }
}

/// Per-render state shared by all page renderers.
struct RenderContext<'a> {
    pages: &'a [Page],
    numbers: PageNumbers,
    settings: &'a TocSettings,
    mode: RenderMode,
    selected: Option<&'a PageId>,
}

/// Render a whole book as a standalone HTML document.
pub fn render_book(doc: &Document, mode: RenderMode, settings: &TocSettings) -> Markup {
    render_document(&doc.pages, &doc.theme, mode, settings, None)
}

/// Render the store's book, highlighting the selected page in screen mode.
pub fn render_store(store: &PageStore, mode: RenderMode) -> Markup {
    render_document(
        store.pages(),
        store.theme(),
        mode,
        store.settings(),
        store.selected(),
    )
}

fn render_document(
    pages: &[Page],
    theme: &Theme,
    mode: RenderMode,
    settings: &TocSettings,
    selected: Option<&PageId>,
) -> Markup {
    let ctx = RenderContext {
        pages,
        numbers: printable_page_numbers(pages),
        settings,
        mode,
        selected,
    };
    let title = pages
        .iter()
        .find_map(|p| match &p.content {
            PageContent::Cover(cover) => Some(cover.title.as_str()),
            _ => None,
        })
        .unwrap_or("Livro de Receitas");
    let css = format!("{}\n\n{}", generate_theme_css(theme), CSS_STATIC);
    let content = html! {
        main.book {
            @for page in pages {
                (render_page(&ctx, page))
            }
        }
    };
    base_document(title, &css, mode, content)
}

fn base_document(title: &str, css: &str, mode: RenderMode, content: Markup) -> Markup {
    let body_class = match mode {
        RenderMode::Screen => "screen",
        RenderMode::Print => "print",
    };
    html! {
        (DOCTYPE)
        html lang="pt-BR" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(css)) }
            }
            body class=(body_class) {
                (content)
            }
        }
    }
}

/// CSS custom properties for the book theme.
pub fn generate_theme_css(theme: &Theme) -> String {
    format!(
        r#":root {{
    --color-bg: {bg};
    --color-text: {text};
    --color-accent: {accent};
}}"#,
        bg = theme.bg,
        text = theme.text,
        accent = theme.accent,
    )
}

fn render_page(ctx: &RenderContext, page: &Page) -> Markup {
    let kind = page.kind();
    let selected = ctx.mode.is_screen() && ctx.selected == Some(&page.id);
    let mut classes = format!("page page-{kind}");
    if selected {
        classes.push_str(" selected");
    }
    let body = match &page.content {
        PageContent::Cover(cover) => render_cover(cover),
        PageContent::Intro(intro) => render_intro(intro),
        PageContent::Toc(toc) => render_toc(ctx, toc),
        PageContent::Legend(legend) => render_legend(legend),
        PageContent::Section(section) => render_section(section),
        PageContent::Shopping(shopping) => render_shopping(shopping),
        PageContent::Recipe(recipe) => render_recipe(recipe),
    };
    html! {
        section class=(classes) id=(page.id.as_str()) data-kind=(kind.as_str()) {
            @if ctx.mode.is_screen() {
                span.page-badge.screen-only { (kind) " · " (page.id) }
            }
            (body)
            @if let Some(number) = ctx.numbers.get(&page.id) {
                footer.page-number { (number) }
            }
        }
    }
}

fn markdown(text: &str) -> PreEscaped<String> {
    let parser = Parser::new(text);
    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    PreEscaped(out)
}

fn render_cover(cover: &CoverPage) -> Markup {
    html! {
        @if let Some(image) = &cover.image {
            img.cover-image src=(image) alt="";
        }
        h1 { (cover.title) }
        @if !cover.subtitle.is_empty() {
            p.cover-subtitle { (cover.subtitle) }
        }
        @if !cover.author.is_empty() {
            p.cover-author { (cover.author) }
        }
    }
}

fn render_intro(intro: &IntroPage) -> Markup {
    html! {
        h2 { (intro.title) }
        div.intro-text { (markdown(&intro.text)) }
    }
}

fn render_toc(ctx: &RenderContext, toc: &TocPage) -> Markup {
    let entries = entries_for_part(ctx.pages, toc.part, ctx.settings.max_per_page);
    let style = toc.scale.map(|scale| format!("--toc-scale: {scale}"));
    html! {
        h2 { (toc.title) }
        ol.toc-entries style=[style] {
            @for entry in &entries {
                li.toc-entry {
                    a.toc-title href={ "#" (entry.page_id) } { (entry.title) }
                    span.toc-dots {}
                    span.toc-page { (ctx.numbers.label(&entry.page_id)) }
                }
            }
        }
    }
}

fn render_legend(legend: &LegendPage) -> Markup {
    html! {
        h2 { (legend.title) }
        dl.legend-items {
            @for item in &legend.items {
                dt { (item.symbol) }
                dd { (item.label) }
            }
        }
    }
}

fn render_section(section: &SectionPage) -> Markup {
    let t = &section.typography;
    let vars: Vec<String> = [
        ("--title-size", t.title_size.map(|v| format!("{v}pt"))),
        ("--subtitle-size", t.subtitle_size.map(|v| format!("{v}pt"))),
        ("--offset-y", t.offset_y.map(|v| format!("{v}mm"))),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| format!("{name}: {v}")))
    .collect();
    let style = (!vars.is_empty()).then(|| vars.join("; "));
    html! {
        div.section-heading style=[style] {
            h2 { (section.title) }
            @if !section.subtitle.is_empty() {
                p { (section.subtitle) }
            }
        }
    }
}

fn render_shopping(shopping: &ShoppingPage) -> Markup {
    html! {
        h2 { (shopping.title) }
        @for category in &shopping.categories {
            div.shopping-category {
                h3 { (category.name) }
                ul {
                    @for line in category.lines() {
                        li { (line) }
                    }
                }
            }
        }
    }
}

fn render_recipe(recipe: &RecipePage) -> Markup {
    let position = recipe.layout.image_position;
    let style = recipe.layout.font_scale.map(|scale| format!("--font-scale: {scale}"));
    let image = recipe
        .image
        .as_deref()
        .filter(|_| position != ImagePosition::Hidden);
    html! {
        div class={ "recipe layout-" (position.as_str()) } style=[style] {
            h2 { (recipe.title) }
            @if !recipe.description.is_empty() {
                p.recipe-description { (recipe.description) }
            }
            @if !recipe.servings.is_empty() || !recipe.prep_time.is_empty() {
                div.recipe-meta {
                    @if !recipe.servings.is_empty() {
                        span.servings { "Rendimento: " (recipe.servings) }
                    }
                    @if !recipe.prep_time.is_empty() {
                        span.prep-time { "Preparo: " (recipe.prep_time) }
                    }
                }
            }
            div.recipe-body {
                @if let Some(src) = image {
                    img.recipe-image src=(src) alt=(recipe.title);
                }
                div.recipe-text {
                    @for group in &recipe.ingredient_groups {
                        div.ingredient-group {
                            @if !group.title.is_empty() {
                                h3 { (group.title) }
                            }
                            ul {
                                @for item in &group.items {
                                    li { (item) }
                                }
                            }
                        }
                    }
                    ol.steps {
                        @for step in &recipe.steps {
                            li { (step) }
                        }
                    }
                }
            }
            @if let Some(n) = &recipe.nutrition {
                div.nutrition {
                    span { "Calorias: " (n.calories) }
                    span { "Proteínas: " (n.protein) }
                    span { "Carboidratos: " (n.carbs) }
                    span { "Gorduras: " (n.fat) }
                }
            }
            @if !recipe.tips.is_empty() {
                p.tips { (recipe.tips) }
            }
        }
    }
}

// ============================================================================
// Export
// ============================================================================

/// Turns rendered print markup into an output file.
pub trait Exporter {
    /// Write `html` to `dest`, returning the path actually written.
    fn export(&mut self, html: &str, dest: &Path) -> Result<PathBuf, ExportError>;
}

/// Writes the print markup as a standalone HTML file.
#[derive(Debug, Default)]
pub struct HtmlExporter;

impl Exporter for HtmlExporter {
    fn export(&mut self, html: &str, dest: &Path) -> Result<PathBuf, ExportError> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, html)?;
        Ok(dest.to_path_buf())
    }
}

/// Render in print mode and hand the result to `exporter`.
pub fn export_book(
    doc: &Document,
    settings: &TocSettings,
    exporter: &mut impl Exporter,
    guard: &InFlight,
    dest: &Path,
) -> Result<PathBuf, ExportError> {
    let _ticket = guard.try_begin().ok_or(ExportError::Busy)?;
    let markup = render_book(doc, RenderMode::Print, settings);
    exporter.export(&markup.into_string(), dest)
}
