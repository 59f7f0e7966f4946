use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docsite_assist::conversation::Sender;
use docsite_assist::panel::FilePreferenceStore;
use docsite_assist::render::TextRenderer;
use docsite_assist::selection::{Rect, ScrollOffset, SelectionSnapshot, SelectionTrigger};
use docsite_assist::{AssistConfig, DispatchClient, Widget, WidgetDriver, WidgetEvent};

/// Approximate width of one selected character, for synthetic rectangles
const CHAR_WIDTH_PX: f64 = 8.0;

#[derive(Parser)]
#[command(name = "docsite-assist")]
#[command(author, version, about = "Headless harness for the documentation site assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the configuration
    #[arg(long, global = true)]
    backend: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// The question
        question: String,

        /// Passage to scope the question to, as if highlighted on the page
        #[arg(short, long)]
        selection: Option<String>,
    },

    /// Interactive session: lines are typed into the open input
    ///
    /// Commands: /select TEXT, /ask, /cancel, /clear, /panel, /theme, /quit
    Chat,

    /// Print the effective configuration
    Config {
        /// Also write it to the configuration file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "docsite_assist=debug"
    } else {
        "docsite_assist=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &cli.config {
        Some(path) => AssistConfig::load_from(path)?,
        None => AssistConfig::load()?,
    };
    if let Some(url) = cli.backend {
        config.backend.base_url = url;
    }

    match cli.command {
        Commands::Ask {
            question,
            selection,
        } => run_ask(&config, &question, selection.as_deref()).await?,
        Commands::Chat => run_chat(config).await?,
        Commands::Config { save } => {
            let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
            print!("{}", rendered);
            if save {
                match &cli.config {
                    Some(path) => config.save_to(path)?,
                    None => config.save()?,
                }
                eprintln!("Configuration saved");
            }
        }
    }

    Ok(())
}

fn build_widget(config: &AssistConfig) -> Result<Widget> {
    let store = FilePreferenceStore::default_location()?;
    tracing::debug!("preferences at {}", store.path().display());
    Ok(Widget::new(config, Box::new(store), None))
}

fn snapshot_for(text: &str) -> SelectionSnapshot {
    let width = text.chars().count() as f64 * CHAR_WIDTH_PX;
    SelectionSnapshot::new(text, vec![Rect::new(0.0, 0.0, width, 16.0)])
}

async fn run_ask(config: &AssistConfig, question: &str, selection: Option<&str>) -> Result<()> {
    let mut widget = build_widget(config)?;
    let client = DispatchClient::http(&config.backend);

    if let Some(text) = selection {
        let now = std::time::Instant::now();
        widget.observe_selection(
            SelectionTrigger::PointerUp,
            snapshot_for(text),
            ScrollOffset::default(),
            now,
        );
        if let Some(at) = widget.next_deadline() {
            widget.tick(at);
        }
        if widget.selection().active().is_none() {
            tracing::warn!("selection does not qualify; asking without it");
        }
    }

    if !widget.send(&client, question).await {
        anyhow::bail!("Nothing to send");
    }

    if let Some(reply) = widget
        .conversation()
        .messages()
        .iter()
        .rev()
        .find(|m| m.sender() == Sender::Assistant)
    {
        println!("{}", reply.text());
        if !reply.sources().is_empty() {
            println!("\nSources:");
            for source in reply.sources() {
                println!("- {}", source.label());
            }
        }
    }

    Ok(())
}

async fn run_chat(config: AssistConfig) -> Result<()> {
    let mut config = config;
    config.panel.initially_open = true;

    let widget = build_widget(&config)?;
    let client = DispatchClient::http(&config.backend);
    let (events_tx, events_rx) = docsite_assist::widget::channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut popover_open = false;

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            };

            let command = line.trim().to_string();
            let events = match command.as_str() {
                "/quit" => break,
                "/ask" => {
                    popover_open = true;
                    vec![WidgetEvent::AskAiClicked]
                }
                "/cancel" => {
                    popover_open = false;
                    vec![WidgetEvent::PopoverCancelled]
                }
                "/clear" => {
                    popover_open = false;
                    vec![WidgetEvent::SelectionCleared]
                }
                "/panel" => vec![WidgetEvent::PanelToggled],
                "/theme" => vec![WidgetEvent::ColorModeToggled],
                cmd if cmd.starts_with("/select") => {
                    popover_open = false;
                    let text = cmd.trim_start_matches("/select").trim();
                    vec![WidgetEvent::Selection {
                        trigger: SelectionTrigger::PointerUp,
                        snapshot: snapshot_for(text),
                        scroll: ScrollOffset::default(),
                    }]
                }
                _ if popover_open => {
                    popover_open = false;
                    vec![
                        WidgetEvent::PopoverInput(line),
                        WidgetEvent::PopoverSubmitted,
                    ]
                }
                _ => vec![WidgetEvent::PanelInput(line), WidgetEvent::PanelSubmitted],
            };

            for event in events {
                if events_tx.send(event).is_err() {
                    return;
                }
            }
        }

        let _ = events_tx.send(WidgetEvent::Shutdown);
    });

    let driver = WidgetDriver::new(widget, client, TextRenderer::new(std::io::stdout()), events_rx);
    driver.run().await?;
    Ok(())
}
