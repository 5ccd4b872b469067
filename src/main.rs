use std::io;
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use sonar_mcp::commands::call::{self, CallArgs};
use sonar_mcp::commands::config::{self, ConfigArgs};
use sonar_mcp::commands::{serve, tools};
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit: ",
    env!("SONAR_GIT_SHA"),
    ", built: ",
    env!("SONAR_BUILD_TS"),
    ")"
);

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  sonar-mcp serve\n  sonar-mcp call sonar_search --params '{\"query\": \"rust 2024 edition\", \"depth\": \"quick\"}'\n  echo '{\"topic\": \"post-quantum cryptography\"}' | sonar-mcp call sonar_research --dry-run\n  sonar-mcp config check\n  sonar-mcp completion bash > ~/.local/share/bash-completion/completions/sonar-mcp";

const CALL_HELP_EXAMPLES: &str = "Examples:\n  sonar-mcp call sonar_ask --params '{\"question\": \"How does OAuth 2.0 work?\"}'\n  sonar-mcp call sonar_reason --dry-run --params '{\"problem\": \"Pick a database for IoT sensor data\"}'";

#[derive(Debug, Parser)]
#[command(
    name = "sonar-mcp",
    about = "MCP server for web search and research with Perplexity Sonar",
    version = VERSION,
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Serve the tools over MCP stdio")]
    Serve,
    #[command(about = "Run one tool locally and print its output", after_help = CALL_HELP_EXAMPLES)]
    Call(CallArgs),
    #[command(about = "Print the tool catalog as JSON")]
    Tools,
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "sonar-mcp", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "sonar-mcp", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "sonar-mcp", &mut io::stdout()),
    }
}

/// Logs go to stderr; stdout carries the MCP stream and command output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sonar_mcp=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Serve => serve::run().await,
        Commands::Call(args) => call::run(args).await,
        Commands::Tools => tools::run(),
        Commands::Config(args) => config::run(args),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }
}
