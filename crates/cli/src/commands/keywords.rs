use admit_core::audit::{AuditVerdict, ContentAuditor};
use clap::Subcommand;
use std::io::Read;

use super::utils::{print_info, print_success, CliResult};

#[derive(Subcommand)]
pub enum KeywordsCommands {
    /// Scan text against the keyword list. Reads stdin when no text is given.
    Scan {
        #[arg(short, long, default_value = "data/keywords.txt")]
        file: String,

        text: Option<String>,
    },

    /// Show keyword list statistics
    Stats {
        #[arg(short, long, default_value = "data/keywords.txt")]
        file: String,
    },
}

pub fn handle_keywords_command(command: KeywordsCommands) -> CliResult<()> {
    match command {
        KeywordsCommands::Scan { file, text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };
            scan(&file, &text)
        }
        KeywordsCommands::Stats { file } => stats(&file),
    }
}

fn scan(file: &str, text: &str) -> CliResult<()> {
    let auditor = ContentAuditor::from_file(file)?;

    match auditor.check(text) {
        AuditVerdict::Safe => print_success("text is safe"),
        AuditVerdict::Flagged { keyword, span } => {
            println!("[FLAGGED] keyword '{keyword}' at bytes {}..{}", span.start, span.end);
        }
    }
    Ok(())
}

fn stats(file: &str) -> CliResult<()> {
    let contents = std::fs::read_to_string(file)?;
    let auditor = ContentAuditor::from_keywords(contents.lines())?;

    let total_lines = contents.lines().count();
    print_info(&format!("Keyword file: {file}"));
    println!("  Lines: {total_lines}");
    println!("  Keywords: {}", auditor.keyword_count());
    println!("  Blank lines skipped: {}", total_lines - auditor.keyword_count());
    Ok(())
}
