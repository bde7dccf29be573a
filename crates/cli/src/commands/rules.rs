use admit_core::quota::{RateLimitRule, RateLimitRuleSet};
use clap::Subcommand;
use prettytable::{row, Table};

use super::utils::{print_info, print_success, CliResult};

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Validate every rule in a rule document and list them
    Check {
        #[arg(short, long, default_value = "data/limit.json")]
        file: String,
    },

    /// Show which rule applies to a tier and model
    Resolve {
        #[arg(short, long, default_value = "data/limit.json")]
        file: String,

        #[arg(short, long)]
        tier: String,

        #[arg(short, long)]
        model: String,
    },

    /// Parse a single rule string such as "5/1h"
    Parse { rule: String },
}

pub fn handle_rules_command(command: RulesCommands) -> CliResult<()> {
    match command {
        RulesCommands::Check { file } => check_rules(&file),
        RulesCommands::Resolve { file, tier, model } => resolve_rule(&file, &tier, &model),
        RulesCommands::Parse { rule } => parse_rule(&rule),
    }
}

fn check_rules(file: &str) -> CliResult<()> {
    print_info(&format!("Loading rules from {file}..."));
    let rules = RateLimitRuleSet::from_file(file)?;

    let mut table = Table::new();
    table.add_row(row!["Tier", "Model", "Rule", "Max Requests", "Window"]);

    for (tier, model, raw) in rules.entries() {
        let rule = RateLimitRule::parse(raw)?;
        table.add_row(row![tier, model, raw, rule.max_count, describe_window(&rule)]);
    }

    table.printstd();
    print_success(&format!("{} rules valid", rules.len()));
    Ok(())
}

fn resolve_rule(file: &str, tier: &str, model: &str) -> CliResult<()> {
    let rules = RateLimitRuleSet::from_file(file)?;
    let tier = tier.trim().to_lowercase();

    match rules.resolve(&tier, model) {
        Some(raw) => {
            let rule = RateLimitRule::parse(raw)?;
            println!(
                "{tier} / {model}: {raw} ({} requests per {})",
                rule.max_count,
                describe_window(&rule)
            );
        }
        None => println!("{tier} / {model}: no rate limit configured, requests are denied"),
    }

    Ok(())
}

fn parse_rule(rule: &str) -> CliResult<()> {
    let parsed = RateLimitRule::parse(rule)?;
    println!("max requests: {}", parsed.max_count);
    println!("window: {} ({}s)", describe_window(&parsed), parsed.window.as_secs());
    Ok(())
}

/// Largest whole unit that divides the window evenly.
fn describe_window(rule: &RateLimitRule) -> String {
    let secs = rule.window.as_secs();
    match secs {
        s if s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s % 3600 == 0 => format!("{}h", s / 3600),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}
