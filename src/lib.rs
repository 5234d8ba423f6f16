pub mod annotations;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod search;
pub mod session;
pub mod store;
pub mod ui;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

use crate::annotations::default_annotations_path;
use crate::config::{ReviewConfig, default_config_path, default_data_dir};
use crate::logging::LogTarget;
use crate::model::types::{ConversationKey, Message};
use crate::search::engine::Resolution;
use crate::search::query::{DisplayItem, FilterParams, Scope};
use crate::session::{DataSources, ReviewSession};
use crate::ui::colors::{KeywordList, RowColorPolicy};
use crate::ui::components::theme::ThemePalette;
use crate::ui::table::DisplayModel;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "chatfx",
    version,
    about = "Search, filter and tag exported messaging data for investigative review"
)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Annotations database (defaults to `<data dir>/annotations.db`)
    #[arg(long, global = true)]
    pub annotations: Option<PathBuf>,

    /// Override data dir (annotations and logs)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Normalized message export(s), JSON Lines
    #[arg(long = "messages", short = 'm', required = true, num_args = 1..)]
    pub messages: Vec<PathBuf>,

    /// Media manifest mapping content ids to file paths (JSON object)
    #[arg(long)]
    pub media: Option<PathBuf>,
}

impl SourceArgs {
    fn into_sources(self) -> DataSources {
        DataSources {
            messages: self.messages,
            media: self.media,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive review TUI
    Tui {
        #[command(flatten)]
        sources: SourceArgs,

        /// Render once and exit (headless-friendly)
        #[arg(long, default_value_t = false)]
        once: bool,
    },
    /// Resolve one search and print the rows
    Search {
        #[command(flatten)]
        sources: SourceArgs,

        /// Free text, matched case-insensitively
        #[arg(long, short = 't', default_value = "")]
        text: String,

        /// Match whole words only
        #[arg(long)]
        whole_word: bool,

        /// Search every conversation regardless of scope
        #[arg(long)]
        all: bool,

        /// Conversation label (`alice <-> bob` or a group id); default all
        #[arg(long, default_value = "all")]
        scope: String,

        /// Inclusive start date, YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Inclusive end date, YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Keyword list name from the config, for highlighting
        #[arg(long)]
        keywords: Option<String>,

        /// Emit JSON instead of text rows
        #[arg(long)]
        json: bool,
    },
    /// Tag a message
    Tag {
        #[command(flatten)]
        sources: SourceArgs,
        msg_id: String,
        tag: String,
    },
    /// Remove a tag from a message
    Untag {
        #[command(flatten)]
        sources: SourceArgs,
        msg_id: String,
        tag: String,
    },
    /// Set (or with an empty string, clear) a conversation note
    Note {
        #[command(flatten)]
        sources: SourceArgs,
        /// Conversation label (`alice <-> bob` or a group id)
        conversation: String,
        note: String,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "chatfx", &mut std::io::stdout());
        return Ok(());
    }

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = ReviewConfig::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let annotations_path = cli.annotations.clone().unwrap_or_else(|| {
        if cli.data_dir.is_some() {
            data_dir.join("annotations.db")
        } else {
            default_annotations_path()
        }
    });

    let target = match cli.command {
        Commands::Tui { .. } => LogTarget::File,
        _ => LogTarget::Stderr,
    };
    let _log_guard = logging::init(&config, target, &data_dir.join("logs"));

    match cli.command {
        Commands::Tui { sources, once } => {
            let session = ReviewSession::open(config, sources.into_sources(), &annotations_path)
                .context("opening review")?;
            ui::tui::run_tui(&session, once)
        }
        Commands::Search {
            sources,
            text,
            whole_word,
            all,
            scope,
            from,
            to,
            keywords,
            json,
        } => {
            let keyword_list = match keywords {
                Some(name) => match config.keyword_list(&name) {
                    Some(list) => Some(KeywordList::from_config(list)),
                    None => bail!("unknown keyword list '{name}'"),
                },
                None => None,
            };
            let Some(scope) = Scope::parse(&scope) else {
                bail!("invalid conversation label '{scope}'");
            };
            let policy = RowColorPolicy::from_config(&config).with_keywords(keyword_list);
            let params = FilterParams::new()
                .with_text(&text)
                .whole_word(whole_word)
                .search_all(all)
                .scope(scope)
                .dates(from, to)
                .keyword_list(policy.keywords.as_ref().map(|k| k.name.clone()));
            let session = ReviewSession::open(config, sources.into_sources(), &annotations_path)
                .context("opening review")?;
            let resolution = session.search(&params);
            let mut out = std::io::stdout().lock();
            if json {
                print_json(&mut out, &session, &params, &policy, &resolution)
            } else {
                print_rows(&mut out, &session, policy, resolution)
            }
        }
        Commands::Tag {
            sources,
            msg_id,
            tag,
        } => {
            let session = ReviewSession::open(config, sources.into_sources(), &annotations_path)
                .context("opening review")?;
            let added = session
                .tag(&msg_id, &tag)
                .with_context(|| format!("tagging {msg_id}"))?;
            println!(
                "{} '{tag}' on {msg_id}",
                if added { "added" } else { "already tagged" }
            );
            Ok(())
        }
        Commands::Untag {
            sources,
            msg_id,
            tag,
        } => {
            let session = ReviewSession::open(config, sources.into_sources(), &annotations_path)
                .context("opening review")?;
            let removed = session
                .untag(&msg_id, &tag)
                .with_context(|| format!("untagging {msg_id}"))?;
            println!(
                "{} '{tag}' on {msg_id}",
                if removed { "removed" } else { "not tagged" }
            );
            Ok(())
        }
        Commands::Note {
            sources,
            conversation,
            note,
        } => {
            let key = ConversationKey::parse_label(&conversation)
                .with_context(|| format!("invalid conversation label '{conversation}'"))?;
            let session = ReviewSession::open(config, sources.into_sources(), &annotations_path)
                .context("opening review")?;
            if session.store.read().messages(&key).is_none() {
                bail!("no conversation '{}' in the loaded data", key.label());
            }
            session.note(&key, &note).context("saving note")?;
            println!("note saved for {}", key.label());
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

fn print_rows(
    out: &mut impl Write,
    session: &ReviewSession,
    policy: RowColorPolicy,
    resolution: Resolution,
) -> Result<()> {
    let mut model = DisplayModel::new(Default::default(), policy);
    model.replace(resolution.list);
    let store = session.store.read();
    let theme = ThemePalette::dark();
    for row in 0..model.row_count() {
        if model.is_selectable(row) {
            writeln!(out, "{}", model.row_text(&store, &theme, row).join("\t"))?;
        } else if let Some(DisplayItem::Header { label, .. }) = model.item(row) {
            writeln!(out, "== {label} ==")?;
        }
    }
    writeln!(out, "{} messages", model.message_count())?;
    Ok(())
}

#[derive(Serialize)]
struct JsonRow<'a> {
    conversation: String,
    index: usize,
    highlight: &'static str,
    note: Option<&'a str>,
    #[serde(flatten)]
    message: &'a Message,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    count: usize,
    source: &'static str,
    scope: String,
    text: &'a str,
    rows: Vec<JsonRow<'a>>,
}

fn print_json(
    out: &mut impl Write,
    session: &ReviewSession,
    params: &FilterParams,
    policy: &RowColorPolicy,
    resolution: &Resolution,
) -> Result<()> {
    let store = session.store.read();
    let mut rows = Vec::with_capacity(resolution.list.count());
    let mut row_index = 0usize;
    for item in resolution.list.items() {
        if let DisplayItem::Message { key, index } = item
            && let Some(message) = store.message(key, *index)
        {
            rows.push(JsonRow {
                conversation: key.label(),
                index: *index,
                highlight: policy.classify(key, message, row_index).color_name(),
                note: store.note(key),
                message,
            });
        }
        row_index += 1;
    }
    let output = JsonOutput {
        count: resolution.list.count(),
        source: resolution.source.as_str(),
        scope: params.scope.label(),
        text: params.text(),
        rows,
    };
    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}
