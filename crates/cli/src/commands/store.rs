use admit_core::{
    config::AppConfig,
    quota::{QuotaTracker, RateLimitRuleSet},
    store::{self, keys, KeyValueStore},
};
use clap::Subcommand;
use prettytable::{row, Table};
use serde_json::json;
use std::{sync::Arc, time::Duration};

use super::utils::{print_info, print_success, CliResult};

#[derive(Subcommand)]
pub enum StoreCommands {
    /// Store a session credential for a user
    SetToken {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        token: String,

        /// Expire the credential after this many seconds
        #[arg(long)]
        ttl_seconds: Option<u64>,
    },

    /// Store a user's subscription level
    SetPlan {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        level: String,
    },

    /// Store a resource's label
    SetResource {
        #[arg(short, long)]
        id: String,

        #[arg(short, long)]
        label: String,
    },

    /// Show a user's quota state for a model
    QuotaShow {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        model: String,
    },

    /// Clear a user's quota counter for a model so the next request starts a new window
    QuotaReset {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        model: String,
    },
}

pub async fn handle_store_command(command: StoreCommands, config: &AppConfig) -> CliResult<()> {
    let store = store::connect(&config.store).await?;
    run_store_command(command, store, config).await
}

async fn run_store_command(
    command: StoreCommands,
    store: Arc<dyn KeyValueStore>,
    config: &AppConfig,
) -> CliResult<()> {
    match command {
        StoreCommands::SetToken { user, token, ttl_seconds } => {
            let ttl = ttl_seconds.map(Duration::from_secs);
            store.set(&keys::credential(&user), &token, ttl).await?;
            print_success(&format!("Credential stored for user '{user}'"));
        }

        StoreCommands::SetPlan { user, level } => {
            let record = json!({ "ChatGPT": { "level": level } }).to_string();
            store.set(&keys::subscription(&user), &record, None).await?;
            print_success(&format!("Plan '{level}' stored for user '{user}'"));
        }

        StoreCommands::SetResource { id, label } => {
            let record = json!({ "label": label }).to_string();
            store.set(&keys::resource(&id), &record, None).await?;
            print_success(&format!("Label '{label}' stored for resource '{id}'"));
        }

        StoreCommands::QuotaShow { user, model } => {
            let tracker = quota_tracker(store, config)?;
            let snapshot = tracker.inspect(&user, &model).await?;

            let mut table = Table::new();
            table.add_row(row!["User", "Model", "Tier", "Marker", "Rule", "Used", "Resets In"]);
            table.add_row(row![
                user,
                model,
                snapshot.tier,
                snapshot.marker.as_deref().unwrap_or("-"),
                snapshot.rule.map_or_else(|| "none".to_string(), |r| r.to_string()),
                snapshot.count,
                snapshot.ttl.map_or_else(|| "-".to_string(), |t| format!("{}s", t.as_secs()))
            ]);
            table.printstd();
        }

        StoreCommands::QuotaReset { user, model } => {
            let tracker = quota_tracker(store, config)?;
            if tracker.reset(&user, &model).await? {
                print_success(&format!("Quota reset for user '{user}', model '{model}'"));
            } else {
                print_info(&format!("No active quota window for user '{user}', model '{model}'"));
            }
        }
    }

    Ok(())
}

fn quota_tracker(store: Arc<dyn KeyValueStore>, config: &AppConfig) -> CliResult<QuotaTracker> {
    let rules = RateLimitRuleSet::from_file(&config.quota.rules_path)?;
    Ok(QuotaTracker::new(store, Arc::new(rules)))
}
