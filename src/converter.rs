use std::path::{Path, PathBuf};
use std::process::Command;

use camino::Utf8Path;
use serde::Serialize;

use crate::config::ConverterSettings;
use crate::error::OrganizerError;

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub program: Option<String>,
    pub version: Option<String>,
}

/// External DICOM to NIfTI converter. Output lands next to the input files;
/// the caller decides what to keep.
pub trait Converter {
    fn convert(&self, input_folder: &Utf8Path) -> Result<(), OrganizerError>;
    fn tool_info(&self) -> ToolInfo;
}

#[derive(Debug, Clone)]
pub enum ConverterStatus {
    Ready,
    Missing { message: String },
}

#[derive(Debug, Clone)]
pub struct Dcm2niixConverter {
    requested: String,
    program: Option<PathBuf>,
}

impl Dcm2niixConverter {
    pub fn new(settings: &ConverterSettings) -> Self {
        let requested = settings.program.as_str().to_string();
        let program = if settings.program.components().count() > 1 {
            settings
                .program
                .as_std_path()
                .exists()
                .then(|| settings.program.clone().into_std_path_buf())
        } else {
            find_in_path(settings.program.as_str())
        };
        Self { requested, program }
    }

    pub fn status(&self) -> ConverterStatus {
        match self.program {
            Some(_) => ConverterStatus::Ready,
            None => ConverterStatus::Missing {
                message: format!("missing {} (install dcm2niix)", self.requested),
            },
        }
    }

    /// `-f %d` names outputs by series description, `-z n` keeps them
    /// uncompressed, `-b n` drops the BIDS sidecar and `-s y` writes one file
    /// per series.
    pub fn arguments(input_folder: &Utf8Path) -> Vec<String> {
        vec![
            "-f".to_string(),
            "%d".to_string(),
            "-z".to_string(),
            "n".to_string(),
            "-b".to_string(),
            "n".to_string(),
            "-s".to_string(),
            "y".to_string(),
            input_folder.to_string(),
        ]
    }

    fn require_program(&self) -> Result<&PathBuf, OrganizerError> {
        self.program
            .as_ref()
            .ok_or_else(|| OrganizerError::MissingTool(self.requested.clone()))
    }

    fn run_cmd(&self, program: &Path, args: &[String]) -> Result<(), OrganizerError> {
        tracing::debug!(program = %program.display(), ?args, "running converter");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| OrganizerError::ExternalToolFailure(err.to_string()))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed ({}): {}", output.status, program.display())
        } else {
            stderr
        };
        Err(OrganizerError::ExternalToolFailure(message))
    }
}

impl Converter for Dcm2niixConverter {
    fn convert(&self, input_folder: &Utf8Path) -> Result<(), OrganizerError> {
        let program = self.require_program()?;
        self.run_cmd(program, &Self::arguments(input_folder))
    }

    fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            program: self
                .program
                .as_ref()
                .map(|path| path.display().to_string()),
            version: self
                .program
                .as_ref()
                .and_then(|path| tool_version(path, &["-v"])),
        }
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

// dcm2niix prints its banner and exits non-zero for `-v`, so only the first
// line of stdout is kept regardless of status.
fn tool_version(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(path).args(args).output().ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
