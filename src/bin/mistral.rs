//! `mistral` command-line client

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use mistral_client::config::ConfigLoader;
use mistral_client::{
    CancellationToken, ChatCompletionRequest, ChatMessage, ClientConfig, EmbeddingRequest,
    FilePurpose, ListFilesParams, MistralClient, MistralError, UploadFileRequest,
};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

/// Command-line client for the Mistral AI API
#[derive(Parser)]
#[command(name = "mistral", version)]
struct Cli {
    /// API key (defaults to MISTRAL_API_KEY or the key named in the settings file)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// End-to-end request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Settings file to read instead of the default locations
    #[arg(long, global = true, env = "MISTRAL_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a chat message
    Chat {
        /// User message
        prompt: String,

        #[arg(short, long, default_value = "mistral-small-latest")]
        model: String,

        /// Optional system prompt
        #[arg(short, long)]
        system: Option<String>,

        #[arg(short, long)]
        temperature: Option<f64>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Print the answer as it is generated (Ctrl-C stops it)
        #[arg(long)]
        stream: bool,
    },

    /// Embed one or more strings
    Embed {
        #[arg(required = true)]
        input: Vec<String>,

        #[arg(short, long, default_value = "mistral-embed")]
        model: String,
    },

    /// Inspect and manage models
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },

    /// Upload, inspect and download files
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },
}

#[derive(Subcommand)]
enum ModelsAction {
    /// List available models
    List,
    /// Show one model
    Get { id: String },
    /// Delete a fine-tuned model
    Delete { id: String },
}

#[derive(Subcommand)]
enum FilesAction {
    /// List uploaded files
    List {
        #[arg(long)]
        purpose: Option<FilePurpose>,
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 0)]
        page_size: u32,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Upload a local file
    Upload {
        path: PathBuf,
        #[arg(long)]
        purpose: Option<FilePurpose>,
    },
    /// Show a file's metadata
    Get { id: String },
    /// Delete a file
    Delete { id: String },
    /// Download a file's content
    Download {
        id: String,
        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = build_client(&cli)?;

    match cli.command {
        Command::Chat {
            prompt,
            model,
            system,
            temperature,
            max_tokens,
            stream,
        } => {
            let mut messages = Vec::new();
            if let Some(system) = system {
                messages.push(ChatMessage::system(system));
            }
            messages.push(ChatMessage::user(prompt));

            let mut request = ChatCompletionRequest::new(model, messages);
            request.temperature = temperature;
            request.max_tokens = max_tokens;

            if stream {
                stream_chat(&client, &request).await?;
            } else {
                let response = client.chat(&request).await?;
                println!("{}", response.content().unwrap_or_default());
            }
        }
        Command::Embed { input, model } => {
            let response = client
                .embeddings(&EmbeddingRequest::new(model, input))
                .await?;
            for (i, vector) in response.vectors().iter().enumerate() {
                let preview: Vec<String> = vector.iter().take(4).map(|v| format!("{v:.4}")).collect();
                println!("[{i}] dims={} [{}, ...]", vector.len(), preview.join(", "));
            }
        }
        Command::Models { action } => match action {
            ModelsAction::List => {
                for model in client.list_models().await?.data {
                    println!("{}\t{}", model.id, model.owned_by);
                }
            }
            ModelsAction::Get { id } => print_json(&client.get_model(&id).await?)?,
            ModelsAction::Delete { id } => print_json(&client.delete_model(&id).await?)?,
        },
        Command::Files { action } => run_files(&client, action).await?,
    }

    Ok(())
}

fn build_client(cli: &Cli) -> Result<MistralClient> {
    let _ = dotenvy::dotenv();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::from_path(path)?,
        None => ConfigLoader::new()?,
    };

    let mut config = match &cli.api_key {
        Some(key) => ClientConfig::from_settings_with_key(loader.settings(), key.clone())?,
        None => ClientConfig::from_settings(loader.settings())?,
    };
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url.clone());
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    Ok(MistralClient::with_config(config)?)
}

async fn stream_chat(client: &MistralClient, request: &ChatCompletionRequest) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut stream = client.chat_stream(request, cancel);
    let mut stdout = std::io::stdout();

    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => {
                if let Some(content) = chunk.content() {
                    write!(stdout, "{content}")?;
                    stdout.flush()?;
                }
            }
            Err(MistralError::Cancelled) => {
                eprintln!("\n[interrupted]");
                return Ok(());
            }
            Err(e) => {
                println!();
                return Err(e.into());
            }
        }
    }

    println!();
    Ok(())
}

async fn run_files(client: &MistralClient, action: FilesAction) -> Result<()> {
    match action {
        FilesAction::List {
            purpose,
            page,
            page_size,
            search,
        } => {
            let params = ListFilesParams {
                page,
                page_size,
                purpose,
                search,
            };
            for file in client.list_files(Some(&params)).await?.data {
                println!(
                    "{}\t{}\t{}\t{}",
                    file.id, file.purpose, file.bytes, file.filename
                );
            }
        }
        FilesAction::Upload { path, purpose } => {
            let content = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                bail!("Cannot derive a file name from {}", path.display());
            };

            let mut request = UploadFileRequest::new(content, filename);
            request.purpose = purpose;
            print_json(&client.upload_file(request).await?)?;
        }
        FilesAction::Get { id } => print_json(&client.get_file(&id).await?)?,
        FilesAction::Delete { id } => print_json(&client.delete_file(&id).await?)?,
        FilesAction::Download { id, output } => {
            let mut body = client.download_file(&id).await?;
            let mut sink: Box<dyn tokio::io::AsyncWrite + Unpin> = match &output {
                Some(path) => Box::new(
                    tokio::fs::File::create(path)
                        .await
                        .with_context(|| format!("Failed to create {}", path.display()))?,
                ),
                None => Box::new(tokio::io::stdout()),
            };

            while let Some(bytes) = body.next().await {
                sink.write_all(&bytes?).await?;
            }
            sink.flush().await?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
