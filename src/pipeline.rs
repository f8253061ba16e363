use std::time::{Duration, Instant};

use chrono::Local;
use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::converter::Converter;
use crate::error::OrganizerError;
use crate::fs_util;
use crate::gate::{ConversionGate, ConversionOutcome};
use crate::identifier::{ParseResult, SubjectKey, parse_raw_folder, parse_subject_folder};
use crate::ledger::{Ledger, LedgerStore};
use crate::matcher::match_scans;
use crate::rules::RuleTable;
use crate::store::Layout;

#[derive(Debug, Clone, Serialize)]
pub struct ConvertResult {
    pub items: Vec<ConvertItemResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertItemResult {
    pub session: String,
    pub folder: String,
    pub subject: Option<String>,
    pub outcome: ConversionOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizeResult {
    pub items: Vec<OrganizeItemResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizeAction {
    Organized,
    /// Some copies failed; flags were saved but the subject stays open.
    Incomplete,
    AlreadyProcessed,
    NotInLedger,
    Malformed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizeItemResult {
    pub session: String,
    pub folder: String,
    pub action: OrganizeAction,
    pub scans: Vec<ScanResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub folder: String,
    pub name: String,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub convert: ConvertResult,
    pub organize: OrganizeResult,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct Pipeline<C: Converter> {
    layout: Layout,
    converter: C,
    extensions: Vec<String>,
}

impl<C: Converter> Pipeline<C> {
    pub fn new(layout: Layout, converter: C, extensions: Vec<String>) -> Self {
        Self {
            layout,
            converter,
            extensions,
        }
    }

    pub fn from_config(config: &ResolvedConfig, converter: C) -> Self {
        Self::new(
            Layout::from_config(config),
            converter,
            config.converter.extensions.clone(),
        )
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// Converts every acquisition under the input root that has no staging
    /// folder yet. The ledger is flushed after each successful conversion.
    pub fn convert<S: LedgerStore>(
        &self,
        ledger: &mut Ledger<S>,
        sink: &dyn ProgressSink,
    ) -> Result<ConvertResult, OrganizerError> {
        let sessions = fs_util::list_dir_names(self.layout.input_root())?
            .into_iter()
            .filter(|session| {
                let is_staging = self
                    .layout
                    .is_staging_root(&self.layout.input_session_dir(session));
                if is_staging {
                    tracing::debug!(%session, "skipping staging root inside input root");
                }
                !is_staging
            })
            .collect::<Vec<_>>();
        fs_util::ensure_dir(self.layout.staging_root())?;
        sink.event(ProgressEvent {
            message: format!("phase=Convert; {} session(s)", sessions.len()),
            elapsed: None,
        });

        let gate = ConversionGate::new(&self.converter, &self.layout, &self.extensions);
        let mut items = Vec::new();
        for session in &sessions {
            let session_dir = self.layout.input_session_dir(session);
            let folders = match fs_util::list_dir_names(&session_dir) {
                Ok(folders) => folders,
                Err(err) => {
                    tracing::error!(%session, error = %err, "cannot list session");
                    continue;
                }
            };

            for folder in folders {
                let key = match parse_raw_folder(&folder) {
                    ParseResult::Parsed(key) => key,
                    ParseResult::Malformed { raw } => {
                        let err = OrganizerError::MalformedIdentifier(raw);
                        tracing::warn!(%session, error = %err, "skipping folder");
                        items.push(ConvertItemResult {
                            session: session.clone(),
                            folder,
                            subject: None,
                            outcome: ConversionOutcome::Failed {
                                reason: err.to_string(),
                            },
                        });
                        continue;
                    }
                };

                let start = Instant::now();
                let outcome =
                    gate.convert_if_needed(session, &key, &session_dir.join(&folder), ledger);
                if matches!(outcome, ConversionOutcome::Converted { .. }) {
                    flush_logged(ledger, &key);
                }
                sink.event(ProgressEvent {
                    message: format!("convert {session}/{key}: {}", outcome_label(&outcome)),
                    elapsed: Some(start.elapsed()),
                });
                items.push(ConvertItemResult {
                    session: session.clone(),
                    folder,
                    subject: Some(key.to_string()),
                    outcome,
                });
            }
        }

        if let Err(err) = ledger.flush() {
            tracing::error!(error = %err, "ledger flush failed");
        }
        Ok(ConvertResult { items })
    }

    /// Files converted scans of every unprocessed subject into the data tree.
    pub fn organize<S: LedgerStore>(
        &self,
        ledger: &mut Ledger<S>,
        rules: &RuleTable,
        sink: &dyn ProgressSink,
    ) -> Result<OrganizeResult, OrganizerError> {
        let sessions = fs_util::list_dir_names(self.layout.staging_root())?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Organize; {} session(s), {} rule(s)",
                sessions.len(),
                rules.len()
            ),
            elapsed: None,
        });

        let mut items = Vec::new();
        for session in &sessions {
            let folders = match fs_util::list_dir_names(&self.layout.staging_session_dir(session))
            {
                Ok(folders) => folders,
                Err(err) => {
                    tracing::error!(%session, error = %err, "cannot list session");
                    continue;
                }
            };
            for folder in folders {
                let start = Instant::now();
                let item = self.organize_subject(session, folder, ledger, rules);
                sink.event(ProgressEvent {
                    message: format!(
                        "organize {}/{}: {:?}",
                        item.session, item.folder, item.action
                    ),
                    elapsed: Some(start.elapsed()),
                });
                items.push(item);
            }
        }
        Ok(OrganizeResult { items })
    }

    pub fn run<S: LedgerStore>(
        &self,
        ledger: &mut Ledger<S>,
        rules: &RuleTable,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, OrganizerError> {
        let convert = self.convert(ledger, sink)?;
        let organize = self.organize(ledger, rules, sink)?;
        Ok(RunResult { convert, organize })
    }

    fn organize_subject<S: LedgerStore>(
        &self,
        session: &str,
        folder: String,
        ledger: &mut Ledger<S>,
        rules: &RuleTable,
    ) -> OrganizeItemResult {
        let mut item = OrganizeItemResult {
            session: session.to_string(),
            folder,
            action: OrganizeAction::Failed,
            scans: Vec::new(),
            error: None,
        };

        let key = match parse_subject_folder(&item.folder) {
            ParseResult::Parsed(key) => key,
            ParseResult::Malformed { raw } => {
                let err = OrganizerError::MalformedIdentifier(raw);
                tracing::warn!(%session, error = %err, "skipping folder");
                item.action = OrganizeAction::Malformed;
                item.error = Some(err.to_string());
                return item;
            }
        };

        let Some(row) = ledger.lookup(&key) else {
            let err = OrganizerError::LedgerKeyNotFound(key.to_string());
            tracing::error!(%session, error = %err, "skipping subject");
            item.action = OrganizeAction::NotInLedger;
            item.error = Some(err.to_string());
            return item;
        };

        if ledger.is_processed(row) {
            tracing::info!(%session, subject = %key, "already processed");
            item.action = OrganizeAction::AlreadyProcessed;
            return item;
        }

        let subject_dir = self.layout.staging_session_dir(session).join(&item.folder);
        let files = match fs_util::list_file_names(&subject_dir) {
            Ok(files) => files,
            Err(err) => {
                tracing::error!(%session, subject = %key, error = %err, "cannot list subject");
                item.error = Some(err.to_string());
                return item;
            }
        };

        let mut complete = true;
        for scan in match_scans(&files, rules.rules()) {
            let rule = scan.rule;
            let mut result = ScanResult {
                folder: rule.folder.clone(),
                name: rule.name.clone(),
                source: None,
                destination: None,
                error: None,
            };
            let found = match &scan.selected {
                Some(file) => {
                    let source = subject_dir.join(file);
                    let dest = self.layout.organized_path(&key, &rule.folder, &rule.name);
                    result.source = Some(source.to_string());
                    match fs_util::copy_file_atomic(&source, &dest) {
                        Ok(()) => {
                            tracing::info!(subject = %key, file = %file, dest = %dest, "copied");
                            result.destination = Some(dest.to_string());
                            true
                        }
                        Err(err) => {
                            tracing::error!(
                                subject = %key,
                                file = %file,
                                error = %err,
                                "copy failed"
                            );
                            result.error = Some(err.to_string());
                            complete = false;
                            false
                        }
                    }
                }
                None => {
                    tracing::debug!(subject = %key, folder = %rule.folder, "no matching scan");
                    false
                }
            };
            ledger.record_existence(row, &rule.folder, found);
            item.scans.push(result);
        }

        if complete {
            ledger.mark_processed(row, Local::now().naive_local());
            item.action = OrganizeAction::Organized;
        } else {
            item.action = OrganizeAction::Incomplete;
        }
        if let Err(err) = ledger.flush() {
            item.error = Some(err.to_string());
            tracing::error!(subject = %key, error = %err, "ledger flush failed");
        }
        tracing::info!(subject = %key, action = ?item.action, "subject done");
        item
    }
}

fn flush_logged<S: LedgerStore>(ledger: &mut Ledger<S>, key: &SubjectKey) {
    if let Err(err) = ledger.flush() {
        tracing::error!(subject = %key, error = %err, "ledger flush failed");
    }
}

fn outcome_label(outcome: &ConversionOutcome) -> String {
    match outcome {
        ConversionOutcome::AlreadyDone => "already done".to_string(),
        ConversionOutcome::Converted { relocated } => {
            format!("converted, {} file(s)", relocated.len())
        }
        ConversionOutcome::Failed { reason } => format!("failed: {reason}"),
    }
}
