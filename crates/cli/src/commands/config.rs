use admit_core::config::AppConfig;
use clap::Subcommand;
use std::path::Path;

use super::utils::{print_error, print_info, print_success, CliError, CliResult};

pub const SAMPLE_CONFIG: &str = r#"# Admission Gateway Configuration
# Every value below is the compiled default. Override any field with
# ADMIT__<SECTION>__<FIELD>, e.g. ADMIT__STORE__URL=redis://redis:6379/0

[server]
bind_address = "0.0.0.0"
bind_port = 19892
request_timeout_seconds = 5
max_concurrent_requests = 1024

[store]
# "redis" or "memory"
backend = "redis"
url = "redis://127.0.0.1:6379/0"
key_prefix = "star:"

[audit]
keywords_path = "data/keywords.txt"

[quota]
rules_path = "data/limit.json"

[policy]
# 401 or 429
invalid_session_status = 401
# 429 or 403
entitlement_denied_status = 429

[logging]
level = "info"
format = "pretty"
"#;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        #[arg(short, long, default_value = "config/config.toml")]
        file: String,
    },

    /// Show the effective configuration (file plus environment overrides)
    Show {
        #[arg(short, long, default_value = "config/config.toml")]
        file: String,

        /// Show the store URL, which may contain credentials
        #[arg(long)]
        show_sensitive: bool,
    },

    /// Generate a sample configuration file
    Generate {
        #[arg(short, long, default_value = "config/config.toml")]
        output: String,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn handle_config_command(command: ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Validate { file } => validate_config(&file),
        ConfigCommands::Show { file, show_sensitive } => show_config(&file, show_sensitive),
        ConfigCommands::Generate { output, force } => generate_config(&output, force),
    }
}

pub fn load_config(file: &str) -> CliResult<AppConfig> {
    AppConfig::from_file(file).map_err(|e| CliError::Config(e.to_string()))
}

fn validate_config(file: &str) -> CliResult<()> {
    if !Path::new(file).exists() {
        print_error(&format!("Configuration file not found: {file}"));
        return Err(CliError::Config(format!("File not found: {file}")));
    }

    print_info(&format!("Loading configuration from {file}..."));
    let config = load_config(file)?;

    print_info("Validating configuration...");
    config.validate().map_err(CliError::Config)?;

    print_success("Configuration is valid!");

    println!("Configuration Summary:");
    println!("  Server: {}:{}", config.server.bind_address, config.server.bind_port);
    println!("  Store: {}", config.store.backend);
    println!("  Keywords: {}", config.audit.keywords_path);
    println!("  Rules: {}", config.quota.rules_path);
    println!(
        "  Policy: invalid session -> {}, entitlement denied -> {}",
        config.policy.invalid_session_status, config.policy.entitlement_denied_status
    );

    Ok(())
}

fn show_config(file: &str, show_sensitive: bool) -> CliResult<()> {
    let config = load_config(file)?;

    println!("Configuration from {file}:");

    println!("\n[Server]");
    println!("  Bind Address: {}", config.server.bind_address);
    println!("  Bind Port: {}", config.server.bind_port);
    println!("  Request Timeout: {}s", config.server.request_timeout_seconds);
    println!("  Max Concurrent Requests: {}", config.server.max_concurrent_requests);

    println!("\n[Store]");
    println!("  Backend: {}", config.store.backend);
    if show_sensitive {
        println!("  URL: {}", config.store.url);
    } else {
        println!("  URL: [hidden - use --show-sensitive to reveal]");
    }
    println!("  Key Prefix: {}", config.store.key_prefix);

    println!("\n[Audit]");
    println!("  Keywords: {}", config.audit.keywords_path);

    println!("\n[Quota]");
    println!("  Rules: {}", config.quota.rules_path);

    println!("\n[Policy]");
    println!("  Invalid Session Status: {}", config.policy.invalid_session_status);
    println!("  Entitlement Denied Status: {}", config.policy.entitlement_denied_status);

    println!("\n[Logging]");
    println!("  Level: {}", config.logging.level);
    println!("  Format: {}", config.logging.format);

    Ok(())
}

fn generate_config(output: &str, force: bool) -> CliResult<()> {
    if Path::new(output).exists() && !force {
        return Err(CliError::Config(format!(
            "File {output} already exists. Use --force to overwrite."
        )));
    }

    if let Some(parent) = Path::new(output).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, SAMPLE_CONFIG)?;

    print_success(&format!("Sample configuration generated: {output}"));
    print_info("Remember to:");
    print_info("  1. Point store.url at your redis instance");
    print_info("  2. Provide the keyword list and rate limit rule files");

    Ok(())
}
