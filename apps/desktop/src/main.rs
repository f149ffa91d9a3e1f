use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    AssistantClient, ClientConfig, ClientEvent, ClientHandle, DocumentUpload, UploadState,
    PDF_MEDIA_TYPE,
};
use shared::domain::Role;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;

mod config;

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the answering service; overrides client.toml and env.
    #[arg(long)]
    server_url: Option<String>,
    /// Upload this PDF before entering the prompt loop.
    #[arg(long)]
    upload: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    tracing::debug!(?settings, "resolved settings");

    let client = AssistantClient::new(
        ClientConfig::new(settings.server_url).with_upload_path(settings.upload_path),
    );
    spawn_event_printer(client.subscribe_events());

    if let Some(path) = args.upload.as_deref() {
        if let Err(err) = upload_document(client.as_ref(), path).await {
            eprintln!("upload error: {err:#}");
        }
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    print_prompt().await?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line == "/quit" {
            break;
        }
        if line == "/upload" {
            eprintln!("usage: /upload <path>");
        } else if let Some(path) = line.strip_prefix("/upload ") {
            if let Err(err) = upload_document(client.as_ref(), Path::new(path.trim())).await {
                eprintln!("upload error: {err:#}");
            }
        } else if let Err(err) = client.submit(&line).await {
            eprintln!("error: {err}");
        }
        print_prompt().await?;
    }

    Ok(())
}

fn spawn_event_printer(mut events: broadcast::Receiver<ClientEvent>) {
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ClientEvent::MessageAppended(message) if message.role == Role::Assistant => {
                    println!("LLM: {}", message.text);
                }
                ClientEvent::UploadStateChanged(UploadState::InProgress { percent }) => {
                    println!("uploading... {percent}%");
                }
                ClientEvent::UploadStateChanged(UploadState::Failed { message }) => {
                    println!("upload failed: {message}");
                }
                ClientEvent::Error(message) => {
                    eprintln!("error: {message}");
                }
                _ => {}
            }
        }
    });
}

async fn upload_document(client: &AssistantClient, path: &Path) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let media_type = if filename.to_ascii_lowercase().ends_with(".pdf") {
        PDF_MEDIA_TYPE
    } else {
        "application/octet-stream"
    };

    client
        .select_document(DocumentUpload {
            filename,
            media_type: media_type.to_string(),
            bytes,
        })
        .await?;
    println!("document ingested");
    Ok(())
}

async fn print_prompt() -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    Ok(())
}
