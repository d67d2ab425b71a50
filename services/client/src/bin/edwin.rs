//! services/client/src/bin/edwin.rs
//!
//! The `edwin` command: drives the study panel against a Canvas page from the terminal.

use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use client_lib::{
    adapters::{HtmlPage, HttpBackend, JsonFileStore},
    config::Config,
    console::ConsoleView,
    error::ClientError,
};
use edwin_core::controller::Panel;
use edwin_core::domain::{ExplainMode, MaterialId, PdfUpload};
use edwin_core::{ClientState, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "edwin", version, about = "Course study assistant for Canvas pages")]
struct Cli {
    #[command(flatten)]
    page: PageArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct PageArgs {
    /// Canvas page the command acts on.
    #[arg(long, env = "EDWIN_PAGE_URL", global = true)]
    url: Option<String>,

    /// Saved HTML of the page. Without it the page is downloaded.
    #[arg(long, env = "EDWIN_PAGE_HTML", global = true)]
    html: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the panel on a page: health check, new conversation, progress and auto-sync.
    Page,
    /// Sync the page content now, ignoring the cooldown and the auto-sync setting.
    Sync,
    /// Ask Edwin a question about the course.
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Summarize the page, or generate practice questions from it.
    Explain {
        #[arg(long)]
        practice: bool,
    },
    /// Take a quiz on an uploaded material, or a course-wide exam.
    Quiz {
        /// Material to quiz on. Lists the catalogue when omitted.
        #[arg(long, conflicts_with = "exam")]
        material: Option<String>,
        /// Number of exam questions.
        #[arg(long)]
        exam: Option<u32>,
        #[arg(long, default_value = "Mixed")]
        difficulty: String,
    },
    /// Show the progress dashboard.
    Progress {
        #[arg(long)]
        mastery: bool,
        #[arg(long)]
        insights: bool,
    },
    #[command(subcommand)]
    Materials(MaterialsCommand),
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand)]
enum MaterialsCommand {
    List,
    Upload { file: PathBuf },
    Delete { id: String },
    DeleteAll,
    /// Import course files from Canvas with a personal API token.
    SyncCanvas {
        #[arg(long, env = "EDWIN_CANVAS_TOKEN")]
        token: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    AutoSync {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
    ClearHistory,
}

fn material_id(raw: &str) -> MaterialId {
    raw.parse::<i64>()
        .map(MaterialId::Number)
        .unwrap_or_else(|_| MaterialId::Text(raw.to_string()))
}

async fn load_page(args: &PageArgs, http: &reqwest::Client) -> Result<HtmlPage, ClientError> {
    let url = args
        .url
        .as_deref()
        .ok_or_else(|| ClientError::Internal("a page --url is required".to_string()))?;
    match &args.html {
        Some(path) => HtmlPage::from_file(url, path).await,
        None => HtmlPage::fetch(http, url).await,
    }
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let cli = Cli::parse();
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!(backend = %config.backend_url, "Configuration loaded");

    // --- 2. Initialize Adapters ---
    let http = reqwest::Client::new();
    let settings = config.client_settings();
    let backend = Arc::new(
        HttpBackend::new(config.backend_url.clone(), settings.timeouts.clone())
            .with_http_client(http.clone()),
    );
    let store = Arc::new(JsonFileStore::open(&config.store_path)?);
    info!(path = %store.path().display(), "Local storage opened");

    // --- 3. Build the Shared State and the Panel ---
    let state = Arc::new(ClientState::new(
        Arc::new(settings),
        store,
        backend,
        Arc::new(SystemClock),
    ));
    let panel = Panel::new(state, Arc::new(ConsoleView::new()));

    // --- 4. Dispatch ---
    match cli.command {
        Command::Settings(command) => settings_command(&panel, command),
        command => {
            let page = load_page(&cli.page, &http).await?;
            page_command(&panel, &page, command).await
        }
    }
}

fn settings_command(panel: &Panel, command: SettingsCommand) -> Result<(), ClientError> {
    match command {
        SettingsCommand::Show => {
            let auto_sync = if panel.settings.auto_sync_enabled()? { "on" } else { "off" };
            println!("Auto-sync: {}", auto_sync);
            println!("{}", panel.sync.status_line());
            let token = if panel.settings.saved_canvas_token()?.is_some() { "saved" } else { "not set" };
            println!("Canvas token: {}", token);
        }
        SettingsCommand::AutoSync { state } => panel.settings.set_auto_sync(state == "on")?,
        SettingsCommand::ClearHistory => {
            panel.sync.clear_history()?;
            println!("{}", panel.sync.status_line());
        }
    }
    Ok(())
}

async fn page_command(panel: &Panel, page: &HtmlPage, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Page => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });
            let load = panel.on_page_load(page, &cancel).await?;
            info!(online = load.online, course_id = ?load.course_id, sync = ?load.sync, "Page loaded");
        }
        Command::Sync => {
            let outcome = panel.sync.sync_now(page).await;
            info!(?outcome, "Manual sync finished");
        }
        Command::Ask { question } => {
            panel.chat.send_message(page, &question.join(" ")).await?;
        }
        Command::Explain { practice } => {
            let mode = if practice { ExplainMode::Practice } else { ExplainMode::Explain };
            panel.explain.explain(page, mode).await?;
        }
        Command::Quiz { material, exam, difficulty } => {
            quiz_command(panel, page, material, exam, &difficulty).await?;
        }
        Command::Progress { mastery, insights } => {
            panel.progress.refresh_progress(page).await?;
            if mastery {
                panel.progress.load_mastery(page).await?;
            }
            if insights {
                if let Some(report) = panel.progress.insights(page).await? {
                    let pretty = serde_json::to_string_pretty(&report)
                        .map_err(|e| ClientError::Internal(e.to_string()))?;
                    println!("{}", pretty);
                }
            }
        }
        Command::Materials(command) => materials_command(panel, page, command).await?,
        Command::Settings(command) => settings_command(panel, command)?,
    }
    Ok(())
}

async fn materials_command(panel: &Panel, page: &HtmlPage, command: MaterialsCommand) -> Result<(), ClientError> {
    match command {
        MaterialsCommand::List => {
            panel.materials.list(page).await?;
        }
        MaterialsCommand::Upload { file } => {
            let data = tokio::fs::read(&file).await?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let upload = PdfUpload {
                file_name,
                data: Bytes::from(data),
            };
            panel.materials.upload_pdf(page, Some(&upload)).await?;
        }
        MaterialsCommand::Delete { id } => {
            let id = material_id(&id);
            match panel.materials.find(page, &id).await? {
                Some(material) => {
                    panel.materials.delete(page, &material).await?;
                }
                None => warn!(%id, "No such material"),
            }
        }
        MaterialsCommand::DeleteAll => {
            panel.materials.delete_all(page).await?;
        }
        MaterialsCommand::SyncCanvas { token } => {
            let token = match token {
                Some(token) => token,
                None => panel.settings.saved_canvas_token()?.unwrap_or_default(),
            };
            panel.settings.sync_canvas_materials(page, &token).await?;
        }
    }
    Ok(())
}

async fn quiz_command(
    panel: &Panel,
    page: &HtmlPage,
    material: Option<String>,
    exam: Option<u32>,
    difficulty: &str,
) -> Result<(), ClientError> {
    let started = match (material, exam) {
        (_, Some(questions)) => panel.quiz.start_exam(page, questions, difficulty).await?,
        (Some(id), None) => {
            let Some(material) = panel.materials.find(page, &material_id(&id)).await? else {
                warn!(%id, "No such material");
                return Ok(());
            };
            let (descriptor, _) = panel.quiz.add_for_material(&material)?;
            panel.quiz.start_quiz(page, &descriptor).await?
        }
        (None, None) => {
            for material in panel.materials.list(page).await? {
                panel.quiz.add_for_material(&material)?;
            }
            for entry in panel.quiz.catalogue()? {
                let done = if entry.completed { "done" } else { "" };
                let material = entry
                    .descriptor
                    .material_id
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                println!("  {:>6}  {}  {}", material, entry.descriptor.topic, done);
            }
            return Ok(());
        }
    };
    if started {
        play(panel).await?;
    }
    Ok(())
}

/// Reads answers from stdin: a letter answers, `n`/`p` move, `r` reviews, `q` quits.
async fn play(panel: &Panel) -> Result<(), ClientError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim().to_ascii_lowercase();
        match input.as_str() {
            "n" | "" => panel.quiz.next().await?,
            "p" => panel.quiz.previous(),
            "r" => panel.quiz.review(),
            "q" => break,
            answer => {
                let mut chars = answer.chars();
                match (chars.next(), chars.next()) {
                    (Some(letter @ 'a'..='z'), None) => {
                        if let Err(e) = panel.quiz.submit_answer((letter as u8 - b'a') as usize) {
                            println!("{}", e);
                        }
                    }
                    _ => println!("Answer with a letter, or n, p, r, q"),
                }
            }
        }
        if panel.quiz.session().map_or(true, |s| s.is_finished()) {
            break;
        }
    }
    panel.quiz.close();
    Ok(())
}
