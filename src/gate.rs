use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use serde::Serialize;

use crate::converter::Converter;
use crate::error::OrganizerError;
use crate::fs_util;
use crate::identifier::SubjectKey;
use crate::ledger::{Ledger, LedgerStore};
use crate::store::Layout;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConversionOutcome {
    AlreadyDone,
    Converted { relocated: Vec<Utf8PathBuf> },
    Failed { reason: String },
}

impl ConversionOutcome {
    fn failed(err: OrganizerError) -> Self {
        ConversionOutcome::Failed {
            reason: err.to_string(),
        }
    }
}

/// Runs the converter at most once per staged acquisition.
pub struct ConversionGate<'a, C: Converter> {
    converter: &'a C,
    layout: &'a Layout,
    extensions: &'a [String],
}

impl<'a, C: Converter> ConversionGate<'a, C> {
    pub fn new(converter: &'a C, layout: &'a Layout, extensions: &'a [String]) -> Self {
        Self {
            converter,
            layout,
            extensions,
        }
    }

    pub fn convert_if_needed<S: LedgerStore>(
        &self,
        session: &str,
        key: &SubjectKey,
        input_folder: &Utf8Path,
        ledger: &mut Ledger<S>,
    ) -> ConversionOutcome {
        let staging = self.layout.staging_dir(session, key);
        if staging.as_std_path().is_dir() {
            tracing::info!(%session, subject = %key, "already converted");
            return ConversionOutcome::AlreadyDone;
        }

        if !input_folder.as_std_path().is_dir() {
            let err = OrganizerError::PathNotFound(input_folder.to_path_buf());
            tracing::error!(%session, subject = %key, error = %err, "input folder missing");
            return ConversionOutcome::failed(err);
        }

        tracing::info!(%session, subject = %key, input = %input_folder, "converting");
        if let Err(err) = self.converter.convert(input_folder) {
            tracing::error!(%session, subject = %key, error = %err, "converter failed");
            return ConversionOutcome::failed(err);
        }

        let relocated = match self.relocate(input_folder, &staging) {
            Ok(relocated) => relocated,
            Err(err) => {
                tracing::error!(
                    %session,
                    subject = %key,
                    error = %err,
                    "relocating output failed"
                );
                return ConversionOutcome::failed(err);
            }
        };

        match ledger.record_conversion(key, Local::now().naive_local()) {
            Ok(row) => tracing::debug!(subject = %key, ?row, "ledger updated"),
            Err(err) => tracing::warn!(subject = %key, error = %err, "ledger update failed"),
        }

        ConversionOutcome::Converted { relocated }
    }

    fn relocate(
        &self,
        input_folder: &Utf8Path,
        staging: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, OrganizerError> {
        let names = fs_util::list_file_names(input_folder)?;
        fs_util::ensure_dir(staging)?;
        let mut relocated = Vec::new();
        let mut failed = 0;
        for name in names {
            if !fs_util::has_extension(&name, self.extensions) {
                continue;
            }
            let dest = staging.join(&name);
            match fs_util::move_file(&input_folder.join(&name), &dest) {
                Ok(()) => relocated.push(dest),
                Err(err) => {
                    failed += 1;
                    tracing::warn!(file = %name, error = %err, "could not relocate");
                }
            }
        }
        // An empty staging folder would read as converted on every later run.
        if relocated.is_empty() && failed > 0 {
            fs::remove_dir(staging.as_std_path())
                .map_err(|err| OrganizerError::Filesystem(format!("remove {staging}: {err}")))?;
            return Err(OrganizerError::Filesystem(format!(
                "none of {failed} converter output(s) in {input_folder} could be relocated"
            )));
        }
        if relocated.is_empty() {
            tracing::warn!(input = %input_folder, "converter produced no accepted files");
        }
        Ok(relocated)
    }
}
