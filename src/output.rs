use std::io::{self, Write};

use serde::Serialize;

use crate::gate::ConversionOutcome;
use crate::pipeline::{
    ConvertResult, OrganizeAction, OrganizeResult, ProgressEvent, ProgressSink, RunResult,
};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Summary,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_convert(result: &ConvertResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_organize(result: &OrganizeResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards progress to the log so it lands next to per-subject errors.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(
                elapsed_ms = elapsed.as_millis() as u64,
                "{}",
                event.message
            ),
            None => tracing::info!("{}", event.message),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConvertTally {
    pub converted: usize,
    pub already_done: usize,
    pub failed: usize,
}

impl ConvertTally {
    pub fn of(result: &ConvertResult) -> Self {
        let mut tally = Self::default();
        for item in &result.items {
            match item.outcome {
                ConversionOutcome::AlreadyDone => tally.already_done += 1,
                ConversionOutcome::Converted { .. } => tally.converted += 1,
                ConversionOutcome::Failed { .. } => tally.failed += 1,
            }
        }
        tally
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OrganizeTally {
    pub organized: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OrganizeTally {
    pub fn of(result: &OrganizeResult) -> Self {
        let mut tally = Self::default();
        for item in &result.items {
            match item.action {
                OrganizeAction::Organized => tally.organized += 1,
                OrganizeAction::AlreadyProcessed => tally.skipped += 1,
                OrganizeAction::Incomplete
                | OrganizeAction::NotInLedger
                | OrganizeAction::Malformed
                | OrganizeAction::Failed => tally.failed += 1,
            }
        }
        tally
    }
}

pub fn print_convert_summary(result: &ConvertResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    let tally = ConvertTally::of(result);
    println!("{cyan}conversion summary{reset}");
    println!("{green}converted: {}{reset}", tally.converted);
    println!("{yellow}already converted: {}{reset}", tally.already_done);
    println!("{red}failed: {}{reset}", tally.failed);
    for item in &result.items {
        if let ConversionOutcome::Failed { reason } = &item.outcome {
            println!("{red}  {}/{}: {reason}{reset}", item.session, item.folder);
        }
    }
}

pub fn print_organize_summary(result: &OrganizeResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    let tally = OrganizeTally::of(result);
    println!("{cyan}organize summary{reset}");
    println!("{green}organized: {}{reset}", tally.organized);
    println!("{yellow}already processed: {}{reset}", tally.skipped);
    println!("{red}not organized: {}{reset}", tally.failed);
    for item in &result.items {
        if item.action == OrganizeAction::Organized {
            let found = item
                .scans
                .iter()
                .filter(|scan| scan.destination.is_some())
                .count();
            println!(
                "{green}  {}/{}: {found}/{} scans{reset}",
                item.session,
                item.folder,
                item.scans.len()
            );
        } else if let Some(error) = &item.error {
            println!("{red}  {}/{}: {error}{reset}", item.session, item.folder);
        }
    }
}
