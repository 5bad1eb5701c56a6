//! Advocate - terminal chat client for a streaming legal assistant backend.
//!
//! This is the entry point for the `advocate` binary.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use advocate::app::App;
use advocate::{handler, tui, ui};
use advocate::{Config, InvokeClient, StreamMode};

const LOG_ENV: &str = "ADVOCATE_LOG";
const DEFAULT_LOG_FILTER: &str = "advocate=debug,warn";

/// Advocate - chat with a streaming legal assistant from the terminal.
#[derive(Parser, Debug)]
#[command(name = "advocate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Backend invoke endpoint (overrides ADVOCATE_ENDPOINT and the config file).
    #[arg(long)]
    endpoint: Option<String>,

    /// How streamed response bodies are read: replace or events.
    #[arg(long, value_enum)]
    stream_mode: Option<StreamMode>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the chat interface (default)
    Chat,
    /// Send one message and print the reply
    Ask {
        /// Your message
        message: String,
    },
    /// Show the effective configuration, or save new values
    Config {
        /// Endpoint to save
        #[arg(long)]
        endpoint: Option<String>,
        /// Stream mode to save
        #[arg(long, value_enum)]
        stream_mode: Option<StreamMode>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Chat) => {
            if cli.debug {
                init_file_logging()?;
            }
            let config = effective_config(cli.endpoint, cli.stream_mode)?;
            run_tui(&config).await
        }
        Some(Commands::Ask { message }) => {
            if cli.debug {
                init_stderr_logging();
            }
            let config = effective_config(cli.endpoint, cli.stream_mode)?;
            let client = InvokeClient::from_config(&config)?;
            match client.ask(message).await {
                Ok(reply) => {
                    println!("{}", reply);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Config { endpoint, stream_mode }) => {
            if cli.debug {
                init_stderr_logging();
            }
            if endpoint.is_none() && stream_mode.is_none() {
                show_config(&effective_config(cli.endpoint, cli.stream_mode)?)
            } else {
                // a broken file is replaced rather than blocking the fix
                let saved = Config::load_or_new()?.with_overrides(endpoint, stream_mode);
                saved.save()?;
                println!("Saved configuration to {}", Config::get_config_path()?.display());
                Ok(())
            }
        }
    }
}

/// File, then `ADVOCATE_ENDPOINT`, then command line flags.
fn effective_config(endpoint: Option<String>, stream_mode: Option<StreamMode>) -> Result<Config> {
    Ok(Config::load()?.with_env().with_overrides(endpoint, stream_mode))
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// The terminal owns stderr while the TUI runs, so logs go to a file.
fn init_file_logging() -> Result<()> {
    let dir = Config::config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("advocate.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run_tui(config: &Config) -> Result<()> {
    let client = InvokeClient::from_config(config)?;
    tracing::info!(endpoint = client.endpoint(), mode = client.mode().as_str(), "starting chat");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(client, events.sender());

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event),
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

fn show_config(config: &Config) -> Result<()> {
    println!("Config file:     {}", Config::get_config_path()?.display());
    println!("Endpoint:        {}", config.endpoint());
    println!("Stream mode:     {}", config.stream_mode().as_str());
    match config.connect_timeout_secs {
        Some(secs) => println!("Connect timeout: {}s", secs),
        None => println!("Connect timeout: none"),
    }
    Ok(())
}
