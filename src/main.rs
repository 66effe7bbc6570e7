use clap::{Parser, Subcommand};
use std::path::Path;
use std::process::ExitCode;

use relay_bot::infrastructure::adapters::ConsoleTransport;
use relay_bot::{Config, ModuleRegistry, RuntimeService};

#[derive(Parser)]
#[command(name = "relay-bot")]
#[command(about = "A chat bot runtime with pluggable modules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot on the console transport
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_bot(&cli.config),
        Commands::Version => {
            println!("relay-bot v{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Commands::InitConfig => init_config(&cli.config),
    }
}

fn run_bot(config_path: &str) -> ExitCode {
    // A config that cannot be read or parsed is the one fatal startup error.
    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Can't load {}, please fix it: {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Starting relay-bot as {} for {}", config.irc.nick, config.irc.server);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = rt.block_on(async {
        let channel = config.irc.channels.first().cloned().unwrap_or_else(|| "#console".to_string());
        let transport = ConsoleTransport::new(config.irc.nick.clone()).with_channel(channel);
        let runtime = RuntimeService::bootstrap(&config, transport, ModuleRegistry::builtin())?;
        runtime.run().await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("relay-bot stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_config(config_path: &str) -> ExitCode {
    if Path::new(config_path).exists() {
        println!("Config already exists at {}", config_path);
        return ExitCode::SUCCESS;
    }

    let written = Config::default()
        .to_yaml()
        .map_err(|e| e.to_string())
        .and_then(|yaml| std::fs::write(config_path, yaml).map_err(|e| e.to_string()));

    match written {
        Ok(()) => {
            println!("Wrote default config to {}", config_path);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to write {}: {}", config_path, e);
            ExitCode::FAILURE
        }
    }
}
