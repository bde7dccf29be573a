use clap::{Parser, Subcommand};

mod commands;
use commands::{
    handle_config_command, handle_keywords_command, handle_rules_command, handle_store_command,
    load_config, ConfigCommands, KeywordsCommands, RulesCommands, StoreCommands,
};

#[derive(Parser)]
#[command(name = "admit-cli")]
#[command(about = "Admit CLI - Operator tool for the admission gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file used by store commands
    #[arg(long, global = true, env = "ADMIT_CONFIG", default_value = "config/config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration Management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Rate limit rule inspection
    #[command(subcommand)]
    Rules(RulesCommands),

    /// Banned keyword list inspection
    #[command(subcommand)]
    Keywords(KeywordsCommands),

    /// Seed and inspect store records
    #[command(subcommand)]
    Store(StoreCommands),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config(command) => handle_config_command(command)?,
        Commands::Rules(command) => handle_rules_command(command)?,
        Commands::Keywords(command) => handle_keywords_command(command)?,
        Commands::Store(command) => {
            let config = load_config(&cli.config)?;
            handle_store_command(command, &config).await?;
        }
    }

    Ok(())
}
