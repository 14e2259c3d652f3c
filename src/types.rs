//! Page model shared by the store, the reconciler, persistence and rendering.
//!
//! A [`Page`] is a stable [`PageId`] plus a [`PageContent`], a closed sum type
//! over the seven page kinds. In JSON the `type` tag, the `id` and the
//! kind-specific fields live side by side in one camelCase object:
//!
//! ```json
//! { "id": "section-18c2f", "type": "section", "title": "Breakfast", "subtitle": "" }
//! ```
//!
//! Every payload field has a default, so records written by older versions
//! (or trimmed by hand) still load.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable page identity.
///
/// Assigned once when the page is created and never recomputed from content.
/// Selection, scroll targeting and TOC reconciliation all match on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The tag of a [`PageContent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Cover,
    Intro,
    Toc,
    Legend,
    Section,
    Shopping,
    Recipe,
}

impl PageKind {
    pub const ALL: [PageKind; 7] = [
        PageKind::Cover,
        PageKind::Intro,
        PageKind::Toc,
        PageKind::Legend,
        PageKind::Section,
        PageKind::Shopping,
        PageKind::Recipe,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Cover => "cover",
            PageKind::Intro => "intro",
            PageKind::Toc => "toc",
            PageKind::Legend => "legend",
            PageKind::Section => "section",
            PageKind::Shopping => "shopping",
            PageKind::Recipe => "recipe",
        }
    }

    /// Whether pages of this kind receive a printable page number.
    pub fn is_printable(self) -> bool {
        !matches!(self, PageKind::Cover)
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<&str> = PageKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown page kind '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

/// One unit of the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    #[serde(flatten)]
    pub content: PageContent,
}

impl Page {
    pub fn new(id: impl Into<PageId>, content: PageContent) -> Self {
        Self {
            id: id.into(),
            content,
        }
    }

    pub fn kind(&self) -> PageKind {
        self.content.kind()
    }

    pub fn title(&self) -> &str {
        self.content.title()
    }

    pub fn is_toc(&self) -> bool {
        self.kind() == PageKind::Toc
    }
}

impl From<String> for PageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind-specific payload of a page, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PageContent {
    Cover(CoverPage),
    Intro(IntroPage),
    Toc(TocPage),
    Legend(LegendPage),
    Section(SectionPage),
    Shopping(ShoppingPage),
    Recipe(RecipePage),
}

impl PageContent {
    /// Fresh content for a newly added page of the given kind.
    pub fn default_for(kind: PageKind) -> Self {
        match kind {
            PageKind::Cover => PageContent::Cover(CoverPage {
                title: "Livro de Receitas".to_string(),
                ..CoverPage::default()
            }),
            PageKind::Intro => PageContent::Intro(IntroPage {
                title: "Introdução".to_string(),
                ..IntroPage::default()
            }),
            PageKind::Toc => PageContent::Toc(TocPage::default()),
            PageKind::Legend => PageContent::Legend(LegendPage {
                title: "Legenda".to_string(),
                items: vec![
                    LegendItem::new("V", "Vegetariano"),
                    LegendItem::new("SG", "Sem glúten"),
                    LegendItem::new("SL", "Sem lactose"),
                ],
            }),
            PageKind::Section => PageContent::Section(SectionPage {
                title: "Nova Seção".to_string(),
                ..SectionPage::default()
            }),
            PageKind::Shopping => PageContent::Shopping(ShoppingPage {
                title: "Lista de Compras".to_string(),
                categories: vec![
                    ShoppingCategory::new("Hortifruti", ""),
                    ShoppingCategory::new("Mercearia", ""),
                    ShoppingCategory::new("Laticínios", ""),
                ],
            }),
            PageKind::Recipe => PageContent::Recipe(RecipePage {
                title: "Nova Receita".to_string(),
                ..RecipePage::default()
            }),
        }
    }

    pub fn kind(&self) -> PageKind {
        match self {
            PageContent::Cover(_) => PageKind::Cover,
            PageContent::Intro(_) => PageKind::Intro,
            PageContent::Toc(_) => PageKind::Toc,
            PageContent::Legend(_) => PageKind::Legend,
            PageContent::Section(_) => PageKind::Section,
            PageContent::Shopping(_) => PageKind::Shopping,
            PageContent::Recipe(_) => PageKind::Recipe,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            PageContent::Cover(p) => &p.title,
            PageContent::Intro(p) => &p.title,
            PageContent::Toc(p) => &p.title,
            PageContent::Legend(p) => &p.title,
            PageContent::Section(p) => &p.title,
            PageContent::Shopping(p) => &p.title,
            PageContent::Recipe(p) => &p.title,
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        match self {
            PageContent::Cover(p) => p.title = title,
            PageContent::Intro(p) => p.title = title,
            PageContent::Toc(p) => p.title = title,
            PageContent::Legend(p) => p.title = title,
            PageContent::Section(p) => p.title = title,
            PageContent::Shopping(p) => p.title = title,
            PageContent::Recipe(p) => p.title = title,
        }
    }
}

/// Pages of a freshly started book, in order. TOC pages are left out: the
/// reconciler derives them from the section.
pub fn starter_contents() -> Vec<PageContent> {
    vec![
        PageContent::default_for(PageKind::Cover),
        PageContent::Intro(IntroPage {
            title: "Introdução".to_string(),
            text: "Receitas da família, reunidas num só lugar.".to_string(),
        }),
        PageContent::default_for(PageKind::Legend),
        PageContent::Section(SectionPage {
            title: "Café da manhã".to_string(),
            ..SectionPage::default()
        }),
        PageContent::default_for(PageKind::Recipe),
        PageContent::default_for(PageKind::Shopping),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoverPage {
    pub title: String,
    pub subtitle: String,
    pub author: String,
    /// Data URL or path of the cover picture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntroPage {
    pub title: String,
    /// Body text, rendered as markdown.
    pub text: String,
}

/// A generated table-of-contents page.
///
/// Only `title` and `scale` are user-editable. `part` is owned by the
/// reconciler, and the entries themselves are never stored here: they are
/// recomputed from the section pages at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TocPage {
    pub title: String,
    /// 1-based index of the TOC chunk this page renders.
    pub part: u32,
    /// Display-scale override for the entry list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,
}

impl Default for TocPage {
    fn default() -> Self {
        Self {
            title: String::new(),
            part: 1,
            scale: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LegendPage {
    pub title: String,
    pub items: Vec<LegendItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LegendItem {
    pub symbol: String,
    pub label: String,
}

impl LegendItem {
    pub fn new(symbol: &str, label: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            label: label.to_string(),
        }
    }
}

/// A chapter divider. Its trimmed title becomes a TOC entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SectionPage {
    pub title: String,
    pub subtitle: String,
    pub typography: SectionTypography,
}

/// Font sizes (rem) and vertical offset (%) knobs for a section divider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SectionTypography {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_y: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShoppingPage {
    pub title: String,
    pub categories: Vec<ShoppingCategory>,
}

/// A named block of shopping items, one item per line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShoppingCategory {
    pub name: String,
    pub items: String,
}

impl ShoppingCategory {
    pub fn new(name: &str, items: &str) -> Self {
        Self {
            name: name.to_string(),
            items: items.to_string(),
        }
    }

    /// Non-blank item lines, trimmed.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.items.lines().map(str::trim).filter(|l| !l.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecipePage {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub servings: String,
    pub prep_time: String,
    pub ingredient_groups: Vec<IngredientGroup>,
    pub steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<Nutrition>,
    pub tips: String,
    pub layout: RecipeLayout,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IngredientGroup {
    /// Group heading, e.g. "Massa" or "Cobertura". Empty for a single list.
    pub title: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Nutrition {
    pub calories: String,
    pub protein: String,
    pub carbs: String,
    pub fat: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecipeLayout {
    pub image_position: ImagePosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_scale: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePosition {
    #[default]
    Top,
    Left,
    Right,
    Hidden,
}

impl ImagePosition {
    pub fn as_str(self) -> &'static str {
        match self {
            ImagePosition::Top => "top",
            ImagePosition::Left => "left",
            ImagePosition::Right => "right",
            ImagePosition::Hidden => "hidden",
        }
    }
}

/// Book-wide colors, persisted next to the pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub bg: String,
    pub text: String,
    pub accent: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            bg: "#fffaf3".to_string(),
            text: "#2b2b2b".to_string(),
            accent: "#c0392b".to_string(),
        }
    }
}

/// The whole book: what gets stored, imported and exported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub pages: Vec<Page>,
    #[serde(default)]
    pub theme: Theme,
}

/// One table-of-contents entry, derived from a titled section page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TocItem {
    pub title: String,
    pub page_id: PageId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_serializes_flat_with_type_tag() {
        let page = Page::new(
            "section-1",
            PageContent::Section(SectionPage {
                title: "Breakfast".to_string(),
                ..SectionPage::default()
            }),
        );
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["id"], "section-1");
        assert_eq!(json["type"], "section");
        assert_eq!(json["title"], "Breakfast");
        assert!(json.get("typography").is_some());
    }

    #[test]
    fn page_deserializes_with_missing_payload_fields() {
        let page: Page =
            serde_json::from_str(r#"{"id":"r1","type":"recipe","title":"Bolo"}"#).unwrap();
        assert_eq!(page.kind(), PageKind::Recipe);
        assert_eq!(page.title(), "Bolo");
        match page.content {
            PageContent::Recipe(r) => {
                assert!(r.steps.is_empty());
                assert_eq!(r.layout.image_position, ImagePosition::Top);
            }
            other => panic!("expected recipe, got {other:?}"),
        }
    }

    #[test]
    fn toc_page_defaults_to_first_part() {
        let page: Page = serde_json::from_str(r#"{"id":"toc-1","type":"toc"}"#).unwrap();
        assert_eq!(page.content, PageContent::Toc(TocPage::default()));
    }

    #[test]
    fn recipe_fields_use_camel_case() {
        let content = PageContent::Recipe(RecipePage {
            prep_time: "40 min".to_string(),
            ingredient_groups: vec![IngredientGroup {
                title: String::new(),
                items: vec!["2 ovos".to_string()],
            }],
            ..RecipePage::default()
        });
        let json = serde_json::to_value(Page::new("r", content)).unwrap();
        assert_eq!(json["prepTime"], "40 min");
        assert_eq!(json["ingredientGroups"][0]["items"][0], "2 ovos");
    }

    #[test]
    fn unknown_page_type_is_rejected() {
        let result: Result<Page, _> = serde_json::from_str(r#"{"id":"x","type":"poster"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn page_kind_parses_case_insensitively() {
        assert_eq!("Recipe".parse::<PageKind>(), Ok(PageKind::Recipe));
        assert_eq!(" toc ".parse::<PageKind>(), Ok(PageKind::Toc));
        let err = "poster".parse::<PageKind>().unwrap_err();
        assert!(err.contains("shopping"));
    }

    #[test]
    fn only_cover_is_unprintable() {
        let unprintable: Vec<PageKind> = PageKind::ALL
            .into_iter()
            .filter(|k| !k.is_printable())
            .collect();
        assert_eq!(unprintable, vec![PageKind::Cover]);
    }

    #[test]
    fn default_content_matches_requested_kind() {
        for kind in PageKind::ALL {
            assert_eq!(PageContent::default_for(kind).kind(), kind);
        }
    }

    #[test]
    fn set_title_updates_every_kind() {
        for kind in PageKind::ALL {
            let mut content = PageContent::default_for(kind);
            content.set_title("Renamed");
            assert_eq!(content.title(), "Renamed");
        }
    }

    #[test]
    fn shopping_lines_skip_blanks() {
        let cat = ShoppingCategory::new("Feira", "tomate\n\n  alface  \n");
        assert_eq!(cat.lines().collect::<Vec<_>>(), vec!["tomate", "alface"]);
    }

    #[test]
    fn starter_has_no_toc_pages() {
        assert!(starter_contents().iter().all(|c| c.kind() != PageKind::Toc));
    }
}
