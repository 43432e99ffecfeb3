use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{
    self, CommandReport, digest_archive::DigestArchiveOptions,
    verify::{VerifyMappingOptions, VerifyUsersOptions},
};
use crate::logging;

#[derive(Debug, Parser)]
#[command(
    name = "chat-digest",
    version,
    about = "Weekly Slack channel digests, summarized by an LLM and published to Notion"
)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Collect, summarize and publish every configured channel in one pass.
    Run,
    /// Collect and save channel transcripts without summarizing.
    Collect,
    /// Summarize transcripts saved by `collect` and publish the report.
    Summarize,
    /// Move a date's transcripts into the dump directory.
    Archive {
        /// Date suffix of the artifacts, as MMDD.
        #[arg(long, value_name = "MMDD")]
        date: String,
    },
    /// Show resolved paths, channels, model settings and configuration problems.
    Status,
    /// Check user directory access, optionally looking up one user id.
    VerifyUsers {
        #[arg(long, value_name = "ID")]
        user: Option<String>,
    },
    /// Sample recent messages from one channel and show how author ids map.
    VerifyMapping {
        #[arg(long, value_name = "ID")]
        channel: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

fn render_text(report: &CommandReport) -> String {
    let mut out = format!(
        "{}: {}\n",
        report.command,
        if report.ok { "ok" } else { "issues found" }
    );
    for detail in &report.details {
        out.push_str(&format!("  {detail}\n"));
    }
    for issue in &report.issues {
        out.push_str(&format!("  ! {issue}\n"));
    }
    out
}

fn dispatch(command: Command) -> Result<CommandReport> {
    match command {
        Command::Run => commands::digest_run::run(),
        Command::Collect => commands::digest_collect::run(),
        Command::Summarize => commands::digest_summarize::run(),
        Command::Archive { date } => commands::digest_archive::run(&DigestArchiveOptions { date }),
        Command::Status => commands::digest_status::run(),
        Command::VerifyUsers { user } => commands::verify::run_users(&VerifyUsersOptions { user }),
        Command::VerifyMapping { channel, limit } => {
            commands::verify::run_mapping(&VerifyMappingOptions { channel, limit })
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let report = dispatch(cli.command)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&report));
    }

    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}
