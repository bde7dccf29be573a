pub mod config;
pub mod keywords;
pub mod rules;
pub mod store;
pub mod utils;

pub use config::{handle_config_command, load_config, ConfigCommands};
pub use keywords::{handle_keywords_command, KeywordsCommands};
pub use rules::{handle_rules_command, RulesCommands};
pub use store::{handle_store_command, StoreCommands};
