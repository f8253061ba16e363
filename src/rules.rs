use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::OrganizerError;

/// One scan type of the study taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub identifier: String,
    pub exclude: Option<String>,
    pub name: String,
    pub folder: String,
}

impl Rule {
    pub fn new(
        identifier: impl Into<String>,
        exclude: Option<&str>,
        folder: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            exclude: exclude
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            name: name.into(),
            folder: folder.into(),
        }
    }

    pub fn accepts(&self, file_name: &str) -> bool {
        if !file_name.contains(&self.identifier) {
            return false;
        }
        match &self.exclude {
            Some(exclude) => !file_name.contains(exclude.as_str()),
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RuleRecord {
    #[serde(default)]
    folder: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    exclude: Option<String>,
    // Filled in at runtime by older tooling; never an input.
    #[serde(default, rename = "path")]
    _path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn load(path: &Utf8Path) -> Result<Self, OrganizerError> {
        if !path.as_std_path().is_file() {
            return Err(OrganizerError::PathNotFound(path.to_path_buf()));
        }
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path.as_std_path())
            .map_err(|err| OrganizerError::RuleTable(format!("{path}: {err}")))?;
        Self::from_reader(reader)
    }

    pub fn from_csv(content: &str) -> Result<Self, OrganizerError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        Self::from_reader(reader)
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, OrganizerError> {
        let mut rules = Vec::new();
        for (index, record) in reader.deserialize::<RuleRecord>().enumerate() {
            let line = index + 2;
            let record =
                record.map_err(|err| OrganizerError::RuleTable(format!("row {line}: {err}")))?;
            let folder = non_empty(record.folder).ok_or_else(|| {
                OrganizerError::RuleTable(format!("row {line}: missing folder"))
            })?;
            let name = non_empty(record.name)
                .ok_or_else(|| OrganizerError::RuleTable(format!("row {line}: missing name")))?;
            let identifier = record.identifier.unwrap_or_default();
            if identifier.is_empty() {
                tracing::warn!(row = line, %folder, "empty identifier matches every file");
            }
            rules.push(Rule::new(
                identifier,
                record.exclude.as_deref(),
                folder,
                name,
            ));
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}
