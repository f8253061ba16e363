use std::fmt;

use crate::rules::Rule;

pub const EMPTY: &str = "EMPTY";

/// Outcome of one rule: the chosen file name, or `None` when the subject has
/// no scan of that type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanMatch<'a> {
    pub rule: &'a Rule,
    pub selected: Option<String>,
}

impl ScanMatch<'_> {
    pub fn is_empty(&self) -> bool {
        self.selected.is_none()
    }
}

impl fmt::Display for ScanMatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.rule.identifier,
            self.selected.as_deref().unwrap_or(EMPTY)
        )
    }
}

/// Selects at most one file per rule, preserving rule order.
///
/// Candidates contain the rule identifier and not its exclusion. File names
/// are ordered lexicographically first, so when several files qualify the
/// smallest name wins on every platform. Rules are independent: the same file
/// may satisfy more than one rule.
pub fn match_scans<'a, S: AsRef<str>>(file_names: &[S], rules: &'a [Rule]) -> Vec<ScanMatch<'a>> {
    let mut ordered = file_names.iter().map(AsRef::as_ref).collect::<Vec<&str>>();
    ordered.sort_unstable();
    ordered.dedup();

    rules
        .iter()
        .map(|rule| {
            let mut candidates = ordered.iter().filter(|name| rule.accepts(name));
            let selected = candidates.next().map(|name| name.to_string());
            let others = candidates.count();
            if others > 0 {
                tracing::debug!(
                    identifier = %rule.identifier,
                    selected = selected.as_deref().unwrap_or(EMPTY),
                    others,
                    "ambiguous scan match, keeping first by name"
                );
            }
            ScanMatch { rule, selected }
        })
        .collect()
}
