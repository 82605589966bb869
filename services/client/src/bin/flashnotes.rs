//! services/client/src/bin/flashnotes.rs

use clap::{Parser, Subcommand};
use client_lib::{
    adapters::{HttpBackendClient, SqliteDocumentStore},
    app::{AppSession, AppState},
    config::Config,
    error::ClientError,
};
use flashnotes_core::domain::{MessageRole, RawFile};
use flashnotes_core::ports::PortError;
use rand::seq::SliceRandom;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flashnotes", about = "Upload documents and study them through chat, summaries and quizzes.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload one or more files (PDF, PPTX or TXT)
    Upload { files: Vec<PathBuf> },
    /// List all stored documents
    List,
    /// Show one stored document
    Show { id: i64 },
    /// Delete one stored document
    Delete { id: i64 },
    /// Delete every stored document
    Clear,
    /// Chat about a document (interactive; 'exit' to stop)
    Chat { id: i64 },
    /// Generate a summary of a document
    Summary { id: i64 },
    /// Take a quiz generated from a document
    Quiz { id: i64 },
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // --- 2. Open the Local Document Store ---
    let store = Arc::new(SqliteDocumentStore::open(&config.database_path).await?);
    info!(path = %config.database_path.display(), "document store opened");

    // --- 3. Build the Backend Adapter & Shared AppState ---
    let backend = Arc::new(
        HttpBackendClient::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
        .map_err(|e| ClientError::Internal(format!("failed to build HTTP client: {e}")))?,
    );
    let state = Arc::new(AppState {
        store,
        extractor: backend.clone(),
        ingest: backend.clone(),
        chat: backend.clone(),
        study: backend,
        config,
    });

    // --- 4. Run the Command ---
    let mut session = AppSession::new(state.clone());
    if let Err(e) = run(cli.command, &state, &mut session).await {
        match e {
            ClientError::Port(port_error) => {
                error!(detail = %port_error, "command failed");
                eprintln!("Error: {}", port_error.user_message());
                std::process::exit(1);
            }
            other => return Err(other),
        }
    }
    Ok(())
}

async fn run(
    command: Command,
    state: &Arc<AppState>,
    session: &mut AppSession,
) -> Result<(), ClientError> {
    match command {
        Command::Upload { files } => upload(files, state, session).await,
        Command::List => list(state).await,
        Command::Show { id } => show(id, state).await,
        Command::Delete { id } => {
            let next = session.delete_document(id).await?;
            println!("Deleted document {id}.");
            if let Some(next) = next {
                println!("Document {next} is now active.");
            }
            Ok(())
        }
        Command::Clear => {
            session.clear_documents().await?;
            println!("All documents deleted.");
            Ok(())
        }
        Command::Chat { id } => chat(id, session).await,
        Command::Summary { id } => {
            session.select_document(id).await?;
            let summary = session.summarize().await?;
            println!("{summary}");
            session.close().await;
            Ok(())
        }
        Command::Quiz { id } => quiz(id, session).await,
    }
}

async fn upload(
    paths: Vec<PathBuf>,
    state: &Arc<AppState>,
    session: &mut AppSession,
) -> Result<(), ClientError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ClientError::Internal(format!("'{}' has no file name", path.display())))?;
        let content = tokio::fs::read(path).await?;
        files.push(RawFile {
            media_type: media_type_for(path).to_string(),
            name,
            content: content.into(),
        });
    }

    let pipeline = state.upload_pipeline();
    let mut progress = pipeline.subscribe_progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = progress.borrow().clone();
            if let Some(file) = snapshot.current_file {
                println!("[{:>3}%] extracting {file}", snapshot.percent);
            }
        }
    });

    let result = pipeline.upload(files).await;
    reporter.abort();
    let records = result?;

    println!("Uploaded {} document(s):", records.len());
    for record in &records {
        println!(
            "  {:>4}  {}  ({}, {} bytes)",
            record.id,
            record.title,
            record.media_kind.as_str(),
            record.size_bytes
        );
    }
    // The first new record becomes the active document, mirroring what the
    // document list does after an upload.
    session.select_document(records[0].id).await?;
    Ok(())
}

async fn list(state: &Arc<AppState>) -> Result<(), ClientError> {
    let mut records = state.store.get_all().await?;
    records.sort_unstable_by_key(|record| record.id);
    if records.is_empty() {
        println!("No documents stored. Use 'flashnotes upload' to add some.");
        return Ok(());
    }
    for record in records {
        println!(
            "{:>4}  {}  ({}, {} bytes, uploaded {})",
            record.id,
            record.title,
            record.media_kind.as_str(),
            record.size_bytes,
            record.created_at.format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}

async fn show(id: i64, state: &Arc<AppState>) -> Result<(), ClientError> {
    let record = state
        .store
        .get_by_id(id)
        .await?
        .ok_or_else(|| PortError::Validation(format!("No document with id {id}")))?;

    println!("id:        {}", record.id);
    println!("title:     {}", record.title);
    println!("kind:      {}", record.media_kind.as_str());
    println!("size:      {} bytes", record.size_bytes);
    println!("uploaded:  {}", record.created_at);
    let text = record.extracted_text.trim();
    if text.is_empty() {
        println!("text:      (none extracted; this document cannot drive chat, summary or quiz)");
    } else {
        let excerpt: String = text.chars().take(400).collect();
        let ellipsis = if text.chars().count() > 400 { "…" } else { "" };
        println!("text:      {excerpt}{ellipsis}");
    }
    Ok(())
}

async fn chat(id: i64, session: &mut AppSession) -> Result<(), ClientError> {
    let record = session.select_document(id).await?;
    println!("Chatting about '{}'. Type 'exit' to stop.", record.title);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query == "exit" || query == "quit" {
            break;
        }
        match session.ask(query).await {
            Ok(message) => {
                println!("{}", message.content);
                if !message.sources.is_empty() {
                    println!("  sources: {}", message.sources.join(", "));
                }
            }
            Err(e) => eprintln!("Error: {}", e.user_message()),
        }
    }

    let turns = session
        .messages()
        .iter()
        .filter(|message| message.role == MessageRole::User)
        .count();
    info!(document = id, turns, "chat session ended");
    session.close().await;
    Ok(())
}

async fn quiz(id: i64, session: &mut AppSession) -> Result<(), ClientError> {
    let record = session.select_document(id).await?;
    let questions = session.quiz().await?;
    println!(
        "Quiz on '{}': {} question(s).\n",
        record.title,
        questions.len()
    );

    let mut rng = rand::rng();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut correct = 0usize;
    for (number, mut question) in questions.into_iter().enumerate() {
        question.options.shuffle(&mut rng);
        println!("{}. {}", number + 1, question.question);
        for (index, option) in question.options.iter().enumerate() {
            println!("   {}) {}", letter(index), option);
        }

        let picked = loop {
            print!("answer> ");
            std::io::stdout().flush()?;
            let Some(line) = lines.next_line().await? else {
                println!();
                return Ok(());
            };
            let answer = line.trim().to_lowercase();
            let index = question
                .options
                .iter()
                .enumerate()
                .find(|(index, _)| answer == letter(*index).to_string())
                .map(|(index, _)| index);
            match index {
                Some(index) => break index,
                None => println!("Pick one of the listed letters."),
            }
        };

        if question.options[picked] == question.correct_option {
            correct += 1;
            println!("Correct!\n");
        } else {
            println!("Not quite. The answer was: {}\n", question.correct_option);
        }
    }

    println!("Score: {correct} correct.");
    session.close().await;
    Ok(())
}

fn letter(index: usize) -> char {
    (b'a' + index as u8) as char
}

fn media_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("pptx") => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        Some("txt") | Some("md") | Some("text") => "text/plain",
        _ => "application/octet-stream",
    }
}
