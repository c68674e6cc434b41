//! `publish`, `delete`, `delete-all`, `update` and `sync`: run one engine
//! operation over the selected sites and print what happened.

use std::fmt::Display;

use anyhow::{Context, Result};
use colored::Colorize;

use nostrpress_core::config::Env;
use nostrpress_sync::pipeline::{self, exit_signal};
use nostrpress_sync::{
    AssumeYes, Confirm, ExitSignal, Operation, Report, SiteReport, Tally, Tallied,
};

use super::{home, relay_pool, GlobalArgs};
use crate::prompt::StdinConfirm;

pub async fn run(global: &GlobalArgs, operation: Operation) -> Result<ExitSignal> {
    let home = home()?;
    let env = Env::from_process();
    let confirm: &dyn Confirm = if global.yes { &AssumeYes } else { &StdinConfirm };

    let reports = pipeline::run_at(
        &home,
        &env,
        &global.scope(),
        operation,
        global.options(),
        confirm,
        relay_pool,
    )
    .await
    .with_context(|| format!("{} failed", operation.name()))?;

    for report in &reports {
        print_site(report);
    }
    Ok(exit_signal(&reports))
}

fn print_site(report: &SiteReport) {
    match report {
        SiteReport::Publish(r) => print_report(r, "published"),
        SiteReport::Delete(r) => print_report(r, "deleted"),
        SiteReport::Resync(r) => print_report(r, "updated"),
        SiteReport::Pull(r) => print_report(r, "synced"),
    }
}

fn print_report<S: Tallied + Display>(report: &Report<S>, done: &str) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    println!("{prefix}{}", format!("site '{}'", report.site).bold());

    if report.cancelled {
        println!("  Cancelled.");
        return;
    }
    if report.outcomes.is_empty() && report.batch_errors.is_empty() {
        println!("  nothing to do");
        return;
    }

    for outcome in &report.outcomes {
        let marker = match outcome.status.tally() {
            Tally::Succeeded => "✓".green().bold(),
            Tally::Skipped => "·".bright_black(),
            Tally::Draft => "~".yellow(),
            Tally::Failed => "✗".red().bold(),
        };
        let name = outcome
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("  {marker} {name}  \"{}\"  {}", outcome.title, outcome.status);
    }
    for error in &report.batch_errors {
        println!("  {} {error}", "✗".red().bold());
    }

    let s = report.summary();
    let line = format!(
        "{prefix}{} {done}, {} skipped, {} drafts, {} failed",
        s.succeeded, s.skipped, s.drafts, s.failed
    );
    match report.exit_signal() {
        ExitSignal::Success => println!("{}", line.green()),
        ExitSignal::Partial => println!("{}", line.yellow()),
        ExitSignal::TotalFailure => println!("{}", line.red()),
    }
}
