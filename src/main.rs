//! Chat Supervisor - lifecycle management for line-oriented chatbot processes.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chat_supervisor::cli::format_outbound;
use chat_supervisor::config::{ChatConfig, ConfigLoader, LoadedConfig};
use chat_supervisor::display::{self, TerminalObserver};
use chat_supervisor::supervisor::{ChannelObserver, ChatSupervisor, ObserverEvent, STATUS_EXITED};

#[derive(Parser)]
#[command(
    name = "chat-supervisor",
    about = "Run a line-oriented chatbot executable under supervision",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a supervisor config file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chatbot and chat with it on the terminal.
    Chat(ChatArgs),
    /// Print the effective configuration.
    Config,
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Args, Debug, Default)]
struct ChatArgs {
    /// Chat executable, relative to the resource root unless absolute.
    #[arg(short, long)]
    executable: Option<String>,
    /// Directory relative paths are resolved against.
    #[arg(long)]
    resource_root: Option<PathBuf>,
    /// Chatbot config file passed as `-config`.
    #[arg(long)]
    bot_config: Option<PathBuf>,
    /// Corpus file passed as `-c`.
    #[arg(short, long)]
    corpus: Option<PathBuf>,
    /// Enable animated letter-by-letter printing.
    #[arg(long)]
    anim: bool,
    /// Conversations the context remains active (2-4).
    #[arg(long)]
    cmem: Option<u8>,
    /// Do not pass `-intro`.
    #[arg(long)]
    no_intro: bool,
    /// Number of answers to return.
    #[arg(short = 't', long)]
    top_answers: Option<u32>,
    /// Enable context handling.
    #[arg(long)]
    context: bool,
    /// Enable developer mode.
    #[arg(long)]
    dev: bool,
    /// Seconds to wait for a graceful exit before killing the chatbot.
    #[arg(long)]
    terminate_timeout: Option<u64>,
    /// Print status changes.
    #[arg(long)]
    show_status: bool,
}

impl ChatArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut ChatConfig) {
        if let Some(executable) = &self.executable {
            config.executable.clone_from(executable);
        }
        if let Some(root) = &self.resource_root {
            config.resource_root = Some(root.clone());
        }
        if let Some(path) = &self.bot_config {
            config.process.config_file.clone_from(path);
        }
        if let Some(path) = &self.corpus {
            config.process.corpus_file.clone_from(path);
        }
        if let Some(cmem) = self.cmem {
            config.process.cmem = Some(cmem);
        }
        if let Some(top) = self.top_answers {
            config.process.top_answers = Some(top);
        }
        if let Some(secs) = self.terminate_timeout {
            config.terminate_timeout_secs = secs;
        }
        config.process.anim |= self.anim;
        config.process.context |= self.context;
        config.process.dev |= self.dev;
        if self.no_intro {
            config.process.intro = false;
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn loader(path: Option<PathBuf>) -> ConfigLoader {
    path.map_or_else(ConfigLoader::discover, ConfigLoader::explicit)
}

/// Whether an observer event means the chat process is gone.
fn ends_session(event: &ObserverEvent) -> bool {
    matches!(event, ObserverEvent::Status(status) if status == STATUS_EXITED)
}

async fn run_chat(config: ChatConfig, show_status: bool) -> ExitCode {
    let terminal = TerminalObserver::new(show_status);
    let (tx, mut events) = mpsc::unbounded_channel();
    let mut supervisor =
        ChatSupervisor::new(config.session_options(), Arc::new(ChannelObserver::new(tx)));

    let started = supervisor
        .start(&config.process, Path::new(&config.executable))
        .await;
    if started.is_err() {
        while let Ok(event) = events.try_recv() {
            terminal.show(&event);
        }
        return ExitCode::FAILURE;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                terminal.show(&event);
                if ends_session(&event) || supervisor.state().is_closed() {
                    tracing::info!(state = ?supervisor.state(), "Chat process is gone");
                    break;
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let Some(message) = format_outbound(&line, &config.message_tag) else {
                        continue;
                    };
                    display::print_user_message(line.trim());
                    // Failures arrive as observer events.
                    let _ = supervisor.send(&message).await;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read terminal input");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    let stats = supervisor.stats();
    tracing::info!(
        responses = stats.responses,
        messages_sent = stats.messages_sent,
        "Chat session finished"
    );

    let outcome = supervisor.terminate().await;
    while let Ok(event) = events.try_recv() {
        terminal.show(&event);
    }
    match outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = loader(cli.config);
    let LoadedConfig { mut config, path } = match loader.load() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Chat(args) => {
            args.apply(&mut config);
            tracing::info!(
                executable = %config.executable,
                corpus = %config.process.corpus_file.display(),
                "Starting chat supervisor"
            );
            run_chat(config, args.show_status).await
        }
        Commands::Config => {
            match path {
                Some(path) => println!("# Loaded from {}", path.display()),
                None => println!("# No config file found, showing defaults"),
            }
            match toml::to_string_pretty(&config) {
                Ok(text) => {
                    print!("{text}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Failed to render config: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
