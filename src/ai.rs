//! Boundary to the text-generation backend.
//!
//! The backend is a collaborator behind [`TextGenerator`]: it takes a prompt
//! and a target [`ContentSchema`] and returns a raw string. Models wrap JSON
//! in code fences, prepend chatter, or stop halfway through an object, so
//! nothing it returns is trusted. [`parse_response`] extracts the object,
//! checks the required fields, and only then builds typed page content.
//!
//! [`generate_into`] ties it together under an [`InFlight`] guard. A failure
//! at any step leaves the store untouched.

use crate::store::{PageStore, StoreError};
use crate::types::{
    IngredientGroup, IntroPage, PageContent, PageId, PageKind, RecipePage, ShoppingPage,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cell::Cell;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("Generated {schema} is not usable: {message}")]
    Malformed {
        schema: ContentSchema,
        message: String,
    },
    #[error("Generated {schema} is missing required fields: {}", .missing.join(", "))]
    Invalid {
        schema: ContentSchema,
        missing: Vec<String>,
    },
    #[error("Text generation failed: {0}")]
    Backend(String),
    #[error("A generation is already in progress")]
    Busy,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the generator was asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentSchema {
    Recipe,
    IntroText,
    ShoppingList,
}

impl ContentSchema {
    pub const ALL: [ContentSchema; 3] = [
        ContentSchema::Recipe,
        ContentSchema::IntroText,
        ContentSchema::ShoppingList,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentSchema::Recipe => "recipe",
            ContentSchema::IntroText => "intro",
            ContentSchema::ShoppingList => "shopping",
        }
    }

    /// Kind of page the content becomes.
    pub fn page_kind(self) -> PageKind {
        match self {
            ContentSchema::Recipe => PageKind::Recipe,
            ContentSchema::IntroText => PageKind::Intro,
            ContentSchema::ShoppingList => PageKind::Shopping,
        }
    }

    /// Top-level JSON fields that must be present and non-empty.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            ContentSchema::Recipe => &["title", "ingredientGroups", "steps"],
            ContentSchema::ShoppingList => &["categories"],
            ContentSchema::IntroText => &[],
        }
    }
}

impl fmt::Display for ContentSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ContentSchema::ALL
            .into_iter()
            .find(|schema| schema.as_str() == wanted)
            .ok_or_else(|| format!("unknown content type '{s}' (expected recipe, intro or shopping)"))
    }
}

/// The generation backend.
pub trait TextGenerator {
    fn generate(&mut self, prompt: &str, schema: ContentSchema) -> Result<String, AiError>;
}

// ============================================================================
// Response parsing
// ============================================================================

/// The JSON object inside a raw response.
///
/// A fenced code block wins over the surrounding prose, so braces in the
/// chatter around it are ignored. Without a fence the first `{` that starts
/// a complete object is used. When nothing parses, the span from the first
/// `{` to the last `}` is returned so the caller can report why.
pub fn extract_json(raw: &str) -> Option<&str> {
    fenced_bodies(raw)
        .find_map(first_object)
        .or_else(|| first_object(raw))
        .or_else(|| brace_span(raw))
}

fn fenced_bodies(raw: &str) -> impl Iterator<Item = &str> {
    raw.split("```")
        .skip(1)
        .step_by(2)
        .map(|block| match block.split_once('\n') {
            Some((tag, body)) if !tag.trim_start().starts_with('{') => body,
            _ => block,
        })
}

fn first_object(text: &str) -> Option<&str> {
    text.match_indices('{').find_map(|(start, _)| {
        let rest = &text[start..];
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(_))) => Some(&rest[..stream.byte_offset()]),
            _ => None,
        }
    })
}

fn brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Drop a surrounding ``` fence (with or without a language tag).
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.split_once('\n').map_or("", |(_, body)| body);
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Turn a raw generator response into page content of the requested schema.
pub fn parse_response(raw: &str, schema: ContentSchema) -> Result<PageContent, AiError> {
    match schema {
        ContentSchema::IntroText => parse_intro(raw),
        ContentSchema::Recipe => {
            let obj = parse_object(raw, schema)?;
            let recipe: RecipePage = decode(obj, schema)?;
            Ok(PageContent::Recipe(recipe))
        }
        ContentSchema::ShoppingList => {
            let obj = parse_object(raw, schema)?;
            let mut page: ShoppingPage = decode(obj, schema)?;
            if page.title.trim().is_empty() {
                page.title = "Lista de Compras".to_string();
            }
            Ok(PageContent::Shopping(page))
        }
    }
}

fn parse_intro(raw: &str) -> Result<PageContent, AiError> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(AiError::Invalid {
            schema: ContentSchema::IntroText,
            missing: vec!["text".to_string()],
        });
    }
    Ok(PageContent::Intro(IntroPage {
        title: "Introdução".to_string(),
        text: text.to_string(),
    }))
}

/// Extract, parse, normalize and check the JSON object of a response.
fn parse_object(raw: &str, schema: ContentSchema) -> Result<Map<String, Value>, AiError> {
    let malformed = |message: String| AiError::Malformed { schema, message };
    let json = extract_json(raw).ok_or_else(|| malformed("no JSON object found".into()))?;
    let value: Value = serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;
    let Value::Object(mut obj) = value else {
        return Err(malformed("expected a JSON object".into()));
    };

    normalize(schema, &mut obj);

    let missing: Vec<String> = schema
        .required_fields()
        .iter()
        .filter(|field| !is_present(obj.get(**field)))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AiError::Invalid { schema, missing });
    }
    Ok(obj)
}

/// Deserialize a checked object, naming the first field whose shape is wrong.
fn decode<T: DeserializeOwned>(obj: Map<String, Value>, schema: ContentSchema) -> Result<T, AiError> {
    serde_json::from_value(Value::Object(obj.clone())).map_err(|e| {
        let culprit = obj.iter().find(|(key, value)| {
            let single = Map::from_iter([((*key).clone(), (*value).clone())]);
            serde_json::from_value::<T>(Value::Object(single)).is_err()
        });
        let message = match culprit {
            Some((key, _)) => format!("field `{key}` has the wrong shape ({e})"),
            None => format!("unexpected field shape ({e})"),
        };
        AiError::Malformed { schema, message }
    })
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// Coerce the loose shapes models tend to produce into the stored ones.
fn normalize(schema: ContentSchema, obj: &mut Map<String, Value>) {
    match schema {
        ContentSchema::Recipe => {
            if !is_present(obj.get("ingredientGroups")) {
                if let Some(Value::Array(items)) = obj.remove("ingredients") {
                    let group = IngredientGroup {
                        title: String::new(),
                        items: items.iter().map(scalar_text).collect(),
                    };
                    if let Ok(group) = serde_json::to_value(group) {
                        obj.insert("ingredientGroups".into(), Value::Array(vec![group]));
                    }
                }
            }
            for key in ["servings", "prepTime"] {
                stringify_scalar(obj, key);
            }
            if let Some(Value::Object(nutrition)) = obj.get_mut("nutrition") {
                for key in ["calories", "protein", "carbs", "fat"] {
                    stringify_scalar(nutrition, key);
                }
            }
        }
        ContentSchema::ShoppingList => {
            if let Some(Value::Array(categories)) = obj.get_mut("categories") {
                for category in categories.iter_mut().filter_map(Value::as_object_mut) {
                    let joined = match category.get("items") {
                        Some(Value::Array(items)) => {
                            items.iter().map(scalar_text).collect::<Vec<_>>().join("\n")
                        }
                        _ => continue,
                    };
                    category.insert("items".into(), Value::String(joined));
                }
            }
        }
        ContentSchema::IntroText => {}
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn stringify_scalar(obj: &mut Map<String, Value>, key: &str) {
    if let Some(value @ (Value::Number(_) | Value::Bool(_))) = obj.get(key) {
        let text = value.to_string();
        obj.insert(key.to_string(), Value::String(text));
    }
}

// ============================================================================
// Single-flight guard
// ============================================================================

/// Allows one long-running operation at a time.
#[derive(Debug, Default)]
pub struct InFlight {
    busy: Cell<bool>,
}

/// Held while an operation runs; releases the guard on drop.
#[derive(Debug)]
pub struct InFlightTicket<'a> {
    busy: &'a Cell<bool>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another ticket is alive.
    pub fn try_begin(&self) -> Option<InFlightTicket<'_>> {
        if self.busy.replace(true) {
            return None;
        }
        Some(InFlightTicket { busy: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }
}

impl Drop for InFlightTicket<'_> {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

/// Generate content and add it to the store as a new page.
pub fn generate_into(
    store: &mut PageStore,
    generator: &mut impl TextGenerator,
    guard: &InFlight,
    prompt: &str,
    schema: ContentSchema,
) -> Result<PageId, AiError> {
    let _ticket = guard.try_begin().ok_or(AiError::Busy)?;
    let raw = generator.generate(prompt, schema)?;
    let content = parse_response(&raw, schema)?;
    Ok(store.add_content(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::TocSettings;
    use crate::test_helpers::*;
    use crate::types::Document;

    /// Canned responses, recording the prompts it saw.
    struct MockGenerator {
        response: Result<String, String>,
        prompts: Vec<(String, ContentSchema)>,
    }

    impl MockGenerator {
        fn replying(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                prompts: Vec::new(),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                response: Err(message.to_string()),
                prompts: Vec::new(),
            }
        }
    }

    impl TextGenerator for MockGenerator {
        fn generate(&mut self, prompt: &str, schema: ContentSchema) -> Result<String, AiError> {
            self.prompts.push((prompt.to_string(), schema));
            self.response.clone().map_err(AiError::Backend)
        }
    }

    fn store() -> PageStore {
        let doc = Document {
            pages: with_cover(sections(1)),
            ..Document::default()
        };
        PageStore::new(doc, TocSettings::default())
    }

    const RECIPE: &str = r#"{"title":"Bolo de cenoura","ingredientGroups":[{"title":"Massa","items":["3 cenouras","2 xícaras de açúcar"]}],"steps":["Bata","Asse"],"servings":8}"#;

    // =========================================================================
    // Extraction
    // =========================================================================

    #[test]
    fn extract_json_skips_fences_and_prose() {
        let raw = format!("Claro! Aqui está:\n```json\n{RECIPE}\n```\nBom apetite.");
        assert_eq!(extract_json(&raw), Some(RECIPE));
    }

    #[test]
    fn extract_json_ignores_braces_in_prose() {
        let raw = format!("Aqui está {{sua receita}}:\n```json\n{RECIPE}\n```");
        assert_eq!(extract_json(&raw), Some(RECIPE));

        let raw = format!("Use {{duas}} formas. {RECIPE} Fim {{ok}}");
        assert_eq!(extract_json(&raw), Some(RECIPE));
    }

    #[test]
    fn braces_in_prose_still_parse() {
        let raw = format!("Aqui está {{sua receita}}:\n```json\n{RECIPE}\n```");
        let content = parse_response(&raw, ContentSchema::Recipe).unwrap();
        assert_eq!(content.title(), "Bolo de cenoura");
    }

    #[test]
    fn extract_json_without_object() {
        assert_eq!(extract_json("no braces here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn strip_fences_variants() {
        assert_eq!(strip_fences("```\nOlá\n```"), "Olá");
        assert_eq!(strip_fences("```markdown\nOlá mundo\n```  "), "Olá mundo");
        assert_eq!(strip_fences("  texto simples "), "texto simples");
    }

    // =========================================================================
    // Schema validation
    // =========================================================================

    #[test]
    fn recipe_parses_and_stringifies_numbers() {
        let content = parse_response(&format!("```json\n{RECIPE}\n```"), ContentSchema::Recipe).unwrap();
        let PageContent::Recipe(recipe) = content else {
            panic!("expected recipe, got {content:?}");
        };
        assert_eq!(recipe.title, "Bolo de cenoura");
        assert_eq!(recipe.servings, "8");
        assert_eq!(recipe.ingredient_groups[0].items.len(), 2);
        assert_eq!(recipe.steps, vec!["Bata", "Asse"]);
    }

    #[test]
    fn legacy_ingredients_become_one_group() {
        let raw = r#"{"title":"Pão","ingredients":["farinha","água"],"steps":["Sove"]}"#;
        let PageContent::Recipe(recipe) = parse_response(raw, ContentSchema::Recipe).unwrap() else {
            panic!("expected recipe");
        };
        assert_eq!(recipe.ingredient_groups.len(), 1);
        assert_eq!(recipe.ingredient_groups[0].title, "");
        assert_eq!(recipe.ingredient_groups[0].items, vec!["farinha", "água"]);
    }

    #[test]
    fn missing_fields_are_all_listed() {
        let err = parse_response(r#"{"title":"  ","steps":[]}"#, ContentSchema::Recipe).unwrap_err();
        match err {
            AiError::Invalid { schema, missing } => {
                assert_eq!(schema, ContentSchema::Recipe);
                assert_eq!(missing, vec!["title", "ingredientGroups", "steps"]);
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn invalid_error_message_names_fields() {
        let err = parse_response(r#"{"title":"x"}"#, ContentSchema::Recipe).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Generated recipe is missing required fields: ingredientGroups, steps"
        );
    }

    #[test]
    fn truncated_object_is_malformed() {
        let err = parse_response(r#"{"title":"Bolo","steps":["a""#, ContentSchema::Recipe).unwrap_err();
        assert!(matches!(err, AiError::Malformed { .. }), "{err:?}");
    }

    #[test]
    fn wrong_field_shape_is_malformed() {
        let raw = r#"{"title":"Bolo","ingredientGroups":"tudo","steps":["a"]}"#;
        let err = parse_response(raw, ContentSchema::Recipe).unwrap_err();
        assert!(matches!(err, AiError::Malformed { .. }), "{err:?}");
        assert!(err.to_string().contains("ingredientGroups"), "{err}");

        let raw = r#"{"title":"Bolo","ingredientGroups":[{"title":"","items":["ovo"]}],"steps":"misture tudo"}"#;
        let err = parse_response(raw, ContentSchema::Recipe).unwrap_err();
        assert!(matches!(err, AiError::Malformed { .. }), "{err:?}");
        assert!(err.to_string().contains("`steps`"), "{err}");
    }

    #[test]
    fn shopping_list_accepts_item_arrays() {
        let raw = r#"Lista: {"categories":[{"name":"Feira","items":["tomate","alface"]}]}"#;
        let PageContent::Shopping(page) = parse_response(raw, ContentSchema::ShoppingList).unwrap() else {
            panic!("expected shopping list");
        };
        assert_eq!(page.title, "Lista de Compras");
        assert_eq!(page.categories[0].lines().collect::<Vec<_>>(), vec!["tomate", "alface"]);
    }

    #[test]
    fn shopping_list_requires_categories() {
        let err = parse_response(r#"{"title":"Compras"}"#, ContentSchema::ShoppingList).unwrap_err();
        assert!(matches!(err, AiError::Invalid { ref missing, .. } if missing == &["categories"]));
    }

    #[test]
    fn intro_is_plain_text() {
        let content = parse_response("```\nReceitas da vovó.\n```", ContentSchema::IntroText).unwrap();
        assert_eq!(content.kind(), PageKind::Intro);
        let PageContent::Intro(intro) = content else { unreachable!() };
        assert_eq!(intro.text, "Receitas da vovó.");
    }

    #[test]
    fn blank_intro_is_rejected() {
        let err = parse_response("```\n   \n```", ContentSchema::IntroText).unwrap_err();
        assert!(matches!(err, AiError::Invalid { .. }));
    }

    #[test]
    fn schema_from_str() {
        assert_eq!("Recipe".parse::<ContentSchema>().unwrap(), ContentSchema::Recipe);
        assert_eq!("shopping".parse::<ContentSchema>().unwrap(), ContentSchema::ShoppingList);
        assert!("poem".parse::<ContentSchema>().is_err());
    }

    // =========================================================================
    // Guard and store integration
    // =========================================================================

    #[test]
    fn guard_allows_one_ticket_at_a_time() {
        let guard = InFlight::new();
        let ticket = guard.try_begin().unwrap();
        assert!(guard.is_busy());
        assert!(guard.try_begin().is_none());
        drop(ticket);
        assert!(!guard.is_busy());
        assert!(guard.try_begin().is_some());
    }

    #[test]
    fn generate_into_adds_page() {
        let mut store = store();
        let mut generator = MockGenerator::replying(RECIPE);
        let guard = InFlight::new();

        let id = generate_into(&mut store, &mut generator, &guard, "bolo", ContentSchema::Recipe).unwrap();

        assert_eq!(store.page(&id).unwrap().title(), "Bolo de cenoura");
        assert_eq!(generator.prompts, vec![("bolo".to_string(), ContentSchema::Recipe)]);
        assert!(!guard.is_busy());
    }

    #[test]
    fn failed_generation_leaves_store_untouched() {
        let guard = InFlight::new();
        for mut generator in [
            MockGenerator::replying("desculpe, não sei"),
            MockGenerator::replying(r#"{"title":"Só título"}"#),
            MockGenerator::failing("timeout"),
        ] {
            let mut store = store();
            let before = store.pages().to_vec();
            let version = store.version();
            assert!(generate_into(&mut store, &mut generator, &guard, "x", ContentSchema::Recipe).is_err());
            assert_eq!(store.pages(), before.as_slice());
            assert_eq!(store.version(), version);
            assert!(!guard.is_busy());
        }
    }

    #[test]
    fn busy_guard_rejects_without_calling_backend() {
        let mut store = store();
        let mut generator = MockGenerator::replying(RECIPE);
        let guard = InFlight::new();
        let _held = guard.try_begin().unwrap();

        let err = generate_into(&mut store, &mut generator, &guard, "x", ContentSchema::Recipe).unwrap_err();
        assert!(matches!(err, AiError::Busy));
        assert!(generator.prompts.is_empty());
    }
}
