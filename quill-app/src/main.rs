//! Quill host binary.

mod config;
mod credentials;
mod trace;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use quill_llm::{CompletionRequest, EmbeddingOutcome, ModelClient, StreamChunk};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "quill", version, about = "Quill editor assistant host")]
struct Cli {
    /// Path to config.toml (default: ~/.quill/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stream a completion for an instruction prompt to stdout.
    Complete {
        prompt: String,
        #[arg(long, default_value_t = 256)]
        max_tokens: u32,
        #[arg(long, default_value_t = 0.0)]
        temperature: f32,
        /// Stop sequence; may be given multiple times.
        #[arg(long)]
        stop: Vec<String>,
    },
    /// Embed a text and print the vector size and token usage.
    Embed { text: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let cfg = config::QuillConfig::load(cli.config).await?;

    let client = ModelClient::new(
        Arc::new(credentials::HostCredentials::new(
            cfg.keys.openai_api_key.clone(),
        )),
        Arc::new(config::ConfigSettings::new(cfg.clone())),
        Arc::new(trace::OutputChannel),
        &cfg.general.base_url,
    );

    match cli.command {
        Command::Complete {
            prompt,
            max_tokens,
            temperature,
            stop,
        } => {
            let mut request =
                CompletionRequest::new(prompt, max_tokens).with_temperature(temperature);
            if !stop.is_empty() {
                request = request.with_stop(stop);
            }

            let mut stream = client.stream_completion(request).await?;
            let mut out = std::io::stdout();
            while let Some(chunk) = stream.next().await {
                match chunk? {
                    StreamChunk::Delta { content } => {
                        out.write_all(content.as_bytes())?;
                        out.flush()?;
                    }
                    StreamChunk::Done => break,
                }
            }
            out.write_all(b"\n")?;
            Ok(())
        }
        Command::Embed { text } => match client.generate_embedding(&text).await {
            EmbeddingOutcome::Success {
                embedding,
                total_tokens,
            } => {
                println!("embedding: {} dims, {total_tokens} tokens", embedding.len());
                Ok(())
            }
            EmbeddingOutcome::Error { message } => Err(anyhow::anyhow!(
                "embedding failed: {}",
                message.unwrap_or_default()
            )),
        },
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(v) => v,
        Err(_) => EnvFilter::new("info,quill_app=debug,quill_llm=debug"),
    };
    let log_format = std::env::var("QUILL_LOG_FORMAT")
        .unwrap_or_else(|_| "compact".to_string())
        .to_ascii_lowercase();

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .init();
        }
        "pretty" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .pretty()
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .compact()
                .init();
        }
        other => {
            return Err(anyhow::anyhow!(
                "unsupported QUILL_LOG_FORMAT={other:?}; expected one of: json, pretty, compact"
            ));
        }
    }

    Ok(())
}
