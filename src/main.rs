//! school-tools-mcp: JSON-RPC tool server and chat front-ends
//!
//! `serve` runs the HTTP server; `chat` and `agent` are terminal
//! conversations that call it.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use school_tools_mcp::assistant::keyword::{CLEARED, GREETING};
use school_tools_mcp::assistant::{ChatContext, KeywordRouter, ModelRouter, OllamaModel};
use school_tools_mcp::client::{McpClient, RestClient, ToolBackend};
use school_tools_mcp::config::{self, Config, TransportKind};
use school_tools_mcp::mcp::server::McpServer;
use school_tools_mcp::mcp::transport::{self, AppState, SessionLimits};
use school_tools_mcp::tools;

/// JSON-RPC tool server for school absences and lunch menus.
///
/// Run `serve` in one terminal, then `chat` or `agent` in another.
#[derive(Parser, Debug)]
#[command(name = "school-tools-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP tool server
    Serve {
        /// Interface to bind (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Chat with the keyword-matching assistant
    Chat {
        /// Binding to call the tools through (overrides the config file)
        #[arg(long, value_enum)]
        transport: Option<TransportKind>,
    },

    /// Chat with the language-model assistant
    Agent,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(cfg: &Config, host: Option<String>, port: Option<u16>) -> Result<(), Box<dyn Error>> {
    let mut server_cfg = cfg.server.clone();
    if let Some(host) = host {
        server_cfg.host = host;
    }
    if let Some(port) = port {
        server_cfg.port = port;
    }

    let dispatcher = tools::builtin_dispatcher()?;
    info!(tools = dispatcher.registry().len(), "Tool registry ready");

    let server = McpServer::new(dispatcher).strict(server_cfg.strict_lifecycle);
    let state = AppState::with_limits(server, SessionLimits::from_config(&server_cfg));
    transport::serve(state, &server_cfg.listen_addr()).await?;
    Ok(())
}

/// Reads the next non-command line; `None` means the conversation is over.
async fn next_input(lines: &mut Lines<BufReader<Stdin>>) -> Option<String> {
    print!("You: ");
    let _ = std::io::stdout().flush();

    match lines.next_line().await {
        Ok(Some(line)) => {
            let line = line.trim().to_string();
            if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
                None
            } else {
                Some(line)
            }
        }
        Ok(None) => None,
        Err(e) => {
            error!(error = %e, "Failed to read input");
            None
        }
    }
}

async fn chat(cfg: &Config, transport: Option<TransportKind>) -> Result<(), Box<dyn Error>> {
    let backend: Box<dyn ToolBackend> = match transport.unwrap_or(cfg.client.transport) {
        TransportKind::Rpc => Box::new(McpClient::from_config(&cfg.client)?),
        TransportKind::Rest => Box::new(RestClient::from_config(&cfg.client)?),
    };
    let mut router = KeywordRouter::new(backend);
    let mut ctx = ChatContext::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("\nAssistant: {GREETING}\n");
    while let Some(input) = next_input(&mut lines).await {
        if input == "/clear" {
            ctx.reset();
            println!("\nAssistant: {CLEARED}\n");
            continue;
        }
        if input.is_empty() && !ctx.is_awaiting() {
            continue;
        }

        let reply = router.respond(&mut ctx, &input).await;
        println!("\nAssistant: {reply}\n");
    }
    router.close().await;
    Ok(())
}

async fn agent(cfg: &Config) -> Result<(), Box<dyn Error>> {
    let model = OllamaModel::from_config(&cfg.model);
    info!(model = %cfg.model.model, url = %cfg.model.base_url, "Using language model");

    let backend = McpClient::from_config(&cfg.client)?;
    let mut router = ModelRouter::new(model, Box::new(backend));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("\nAgent ready (type 'exit' to quit)\n");
    while let Some(input) = next_input(&mut lines).await {
        if input.is_empty() || input == "/clear" {
            continue;
        }

        let reply = router.run(&input).await;
        println!("\nAgent: {reply}\n");
    }
    router.close().await;
    Ok(())
}

/// Entry point for school-tools-mcp.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nConfig was read from: {}", default_path.display());
                }
            }
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    // Display GPL license notice (required by GPLv3 Section 5d)
    eprintln!(
        "school-tools-mcp {}  Copyright (C) 2026  The Embedded Society",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!("This is free software, licensed under GPL-3.0-or-later.");
    eprintln!("Source: {}", env!("CARGO_PKG_REPOSITORY"));
    eprintln!();

    info!(version = env!("CARGO_PKG_VERSION"), command = ?args.command, "Starting school-tools-mcp");

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        match args.command {
            Command::Serve { host, port } => serve(&cfg, host, port).await,
            Command::Chat { transport } => chat(&cfg, transport).await,
            Command::Agent => agent(&cfg).await,
        }
    });

    match result {
        Ok(()) => {
            info!("Shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Fatal error");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
