use clap::{Parser, Subcommand};
use recipe_book::ai::{self, AiError, ContentSchema, InFlight, TextGenerator};
use recipe_book::config::{self, BookConfig};
use recipe_book::persist::{self, Autosave, FileStorage, SaveOutcome};
use recipe_book::reconcile::TocSettings;
use recipe_book::render::{self, HtmlExporter};
use recipe_book::store::{DragGesture, PageStore};
use recipe_book::types::{Document, PageContent, PageId, PageKind, Theme};
use recipe_book::output;
use serde_json::json;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser)]
#[command(name = "recipe-book")]
#[command(about = "Edit a multi-page recipe e-book from the command line")]
#[command(long_about = "\
Edit a multi-page recipe e-book from the command line

The book is a list of pages: cover, intro, table of contents, legend,
section dividers, recipes, and a shopping list. Table-of-contents pages
are generated from the titled section pages and kept in sync after every
change; they cannot be added or deleted by hand.

Pages are addressed by id (see 'recipe-book list'). Positions for 'move'
are 0-based, as shown in the list.

Run 'recipe-book gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory holding the stored book
    #[arg(long, default_value = ".recipe-book", global = true)]
    data_dir: PathBuf,

    /// Directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new book from the starter pages
    Init {
        /// Overwrite an existing book without asking
        #[arg(long)]
        yes: bool,
    },
    /// List pages with position, page number, kind, and title
    List,
    /// Show the table of contents pages and their entries
    Toc,
    /// Add a page (cover, intro, legend, section, shopping, recipe)
    Add {
        kind: PageKind,
        /// Title for the new page
        #[arg(long)]
        title: Option<String>,
    },
    /// Change a page's title
    SetTitle { id: String, title: String },
    /// Apply a JSON merge patch to a page
    Edit { id: String, patch: String },
    /// Move the page at one position to another
    Move { from: usize, to: usize },
    /// Delete a page
    Delete {
        id: String,
        /// Delete without asking
        #[arg(long)]
        yes: bool,
    },
    /// Change theme colors
    Theme {
        #[arg(long)]
        bg: Option<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        accent: Option<String>,
    },
    /// Replace the book with a JSON export file
    Import { file: PathBuf },
    /// Write the book to a JSON file
    Export { file: PathBuf },
    /// Validate a generated recipe, intro, or shopping list and add it as a page
    Ingest {
        schema: ContentSchema,
        /// Read the response from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Render the book as printable HTML
    Render {
        #[arg(long, default_value = "book.html")]
        output: PathBuf,
    },
    /// Replace the book with the starter pages
    Reset {
        /// Reset without asking
        #[arg(long)]
        yes: bool,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

/// The loaded book and everything needed to save it again.
struct Session {
    config: BookConfig,
    settings: TocSettings,
    storage: FileStorage,
    autosave: Autosave,
    store: PageStore,
    existed: bool,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self, Box<dyn std::error::Error>> {
        let config = config::load_config(&cli.config_dir)?;
        let settings = config.toc_settings()?;
        let storage = FileStorage::new(&cli.data_dir);
        let mut autosave = Autosave::new(config.storage.key.clone(), config.autosave.debounce_ms);

        let stored = persist::load(&storage, autosave.key())?;
        let existed = stored.is_some();
        let store = match stored {
            Some(doc) => {
                autosave.mark_saved(&doc)?;
                let store = PageStore::new(doc.clone(), settings.clone());
                if store.document() != doc {
                    autosave.note_change(now_ms());
                }
                store
            }
            None => {
                let mut store = PageStore::new(Document::default(), settings.clone());
                starter(&mut store, &config, &mut |_: &str| true);
                autosave.note_change(now_ms());
                store
            }
        };
        autosave.observe(store.version(), now_ms());

        Ok(Self {
            config,
            settings,
            storage,
            autosave,
            store,
            existed,
        })
    }

    /// Save whatever changed and report it.
    fn finish(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.autosave.observe(self.store.version(), now_ms());
        let outcome = self
            .autosave
            .flush(&self.store.document(), &mut self.storage)?;
        if outcome != SaveOutcome::Idle {
            output::print_save_outcome(outcome, self.autosave.key());
        }
        Ok(())
    }
}

/// Hands a response that was produced elsewhere to the ingest path.
struct ReplayGenerator {
    response: String,
}

impl TextGenerator for ReplayGenerator {
    fn generate(&mut self, _prompt: &str, _schema: ContentSchema) -> Result<String, AiError> {
        Ok(std::mem::take(&mut self.response))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mut session = Session::open(&cli)?;
    let store = &mut session.store;

    match cli.command {
        Command::Init { yes } => {
            if session.existed && !starter(store, &session.config, &mut confirmer(yes)) {
                println!("Cancelled");
                return Ok(());
            }
            println!("Started a new book with {} pages", store.pages().len());
            output::print_page_list(store.pages());
        }
        Command::List => {
            output::print_page_list(store.pages());
            return Ok(());
        }
        Command::Toc => {
            output::print_toc(store.pages(), &session.settings);
            return Ok(());
        }
        Command::Add { kind, title } => {
            let mut content = PageContent::default_for(kind);
            if let Some(title) = title {
                content.set_title(title);
            }
            let id = store.add_content(content)?;
            output::print_toc_change(store.last_toc_change());
            print_added(store, &id);
        }
        Command::SetTitle { id, title } => {
            store.select(&PageId::from(id))?;
            let changed = store.update(&json!({ "title": title }))?;
            report_edit(store, changed);
        }
        Command::Edit { id, patch } => {
            let patch: serde_json::Value = serde_json::from_str(&patch)?;
            store.select(&PageId::from(id))?;
            let changed = store.update(&patch)?;
            report_edit(store, changed);
        }
        Command::Move { from, to } => {
            let mut gesture = DragGesture::default();
            gesture.start(store, from)?;
            gesture.enter(to);
            if gesture.finish(store)? {
                println!("Moved page {from} to {to}");
                output::print_toc_change(store.last_toc_change());
            } else {
                println!("Nothing moved");
            }
        }
        Command::Delete { id, yes } => {
            store.select(&PageId::from(id))?;
            match store.delete(&mut confirmer(yes))? {
                Some(page) => {
                    println!("Deleted {}", output::format_page_line(&page));
                    output::print_toc_change(store.last_toc_change());
                }
                None => {
                    println!("Cancelled");
                    return Ok(());
                }
            }
        }
        Command::Theme { bg, text, accent } => {
            let current = store.theme().clone();
            let theme = Theme {
                bg: bg.unwrap_or(current.bg),
                text: text.unwrap_or(current.text),
                accent: accent.unwrap_or(current.accent),
            };
            if store.set_theme(theme) {
                println!("Theme updated");
            } else {
                println!("Theme unchanged");
            }
            let theme = store.theme();
            println!("    bg: {}  text: {}  accent: {}", theme.bg, theme.text, theme.accent);
        }
        Command::Import { file } => {
            let doc = persist::import_file(&file)?;
            store.replace_document(doc);
            println!("Imported {} pages from {}", store.pages().len(), file.display());
            output::print_toc_change(store.last_toc_change());
        }
        Command::Export { file } => {
            persist::export_file(&file, &store.document())?;
            println!("Exported {} pages to {}", store.pages().len(), file.display());
            return Ok(());
        }
        Command::Ingest { schema, file } => {
            let response = read_input(file.as_deref())?;
            let mut generator = ReplayGenerator { response };
            let guard = InFlight::new();
            let prompt = format!("ingest {schema}");
            let id = ai::generate_into(store, &mut generator, &guard, &prompt, schema)?;
            print_added(store, &id);
        }
        Command::Render { output: dest } => {
            let written = render::export_book(
                &store.document(),
                &session.settings,
                &mut HtmlExporter,
                &InFlight::new(),
                &dest,
            )?;
            println!("Rendered {} pages to {}", store.pages().len(), written.display());
            return Ok(());
        }
        Command::Reset { yes } => {
            if !starter(store, &session.config, &mut confirmer(yes)) {
                println!("Cancelled");
                return Ok(());
            }
            println!("Book reset to {} starter pages", store.pages().len());
        }
        Command::GenConfig => {}
    }

    session.finish()
}

/// Reset to the starter pages in the configured theme.
fn starter(
    store: &mut PageStore,
    config: &BookConfig,
    confirm: &mut impl FnMut(&str) -> bool,
) -> bool {
    if !store.reset_to_starter(confirm) {
        return false;
    }
    store.set_theme(Theme::from(&config.theme));
    true
}

/// Confirmation that asks on stdin unless `yes` was given.
fn confirmer(yes: bool) -> impl FnMut(&str) -> bool {
    move |prompt: &str| yes || ask(prompt)
}

fn ask(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .is_ok_and(|_| matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes" | "s" | "sim"))
}

fn read_input(file: Option<&Path>) -> io::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn print_added(store: &PageStore, id: &PageId) {
    if let Some(page) = store.page(id) {
        println!("Added {}", output::format_page_line(page));
    }
}

fn report_edit(store: &PageStore, changed: bool) {
    match (changed, store.selected_page()) {
        (true, Some(page)) => {
            println!("Updated {}", output::format_page_line(page));
            output::print_toc_change(store.last_toc_change());
        }
        _ => println!("No changes"),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
