// restorectl/src/naming/patterns.rs
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum CaseMode {
    #[default]
    #[serde(rename = "NoChange", alias = "None")]
    None,
    Upper,
    Lower,
}

impl CaseMode {
    pub fn apply(self, value: &str) -> String {
        match self {
            CaseMode::None => value.to_string(),
            CaseMode::Upper => value.to_uppercase(),
            CaseMode::Lower => value.to_lowercase(),
        }
    }
}

/// One naming rule: a regex over the backup path and a `$N` template.
///
/// Field names follow the stored settings format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePattern {
    #[serde(rename = "pathPattern")]
    pub path_pattern: String,
    #[serde(rename = "replacePattern", alias = "template")]
    pub template: String,
    #[serde(rename = "changeCase", alias = "caseMode", default)]
    pub case_mode: CaseMode,
}

#[derive(Debug, Error)]
#[error("Invalid path pattern {pattern:?}: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

impl NamePattern {
    pub fn new(path_pattern: &str, template: &str, case_mode: CaseMode) -> Self {
        NamePattern {
            path_pattern: path_pattern.to_string(),
            template: template.to_string(),
            case_mode,
        }
    }

    pub fn compile(&self) -> Result<Regex, PatternError> {
        Regex::new(&self.path_pattern).map_err(|source| PatternError {
            pattern: self.path_pattern.clone(),
            source,
        })
    }
}

/// Ordered pattern list; position is precedence. Every edit returns a new list and
/// out-of-range edits return an unchanged copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamePatterns(Vec<NamePattern>);

impl NamePatterns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NamePattern> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NamePattern> {
        self.0.get(index)
    }

    /// Inserts at `index`, clamped to the end of the list.
    pub fn insert(&self, index: usize, pattern: NamePattern) -> Self {
        let mut items = self.0.clone();
        items.insert(index.min(items.len()), pattern);
        NamePatterns(items)
    }

    pub fn push(&self, pattern: NamePattern) -> Self {
        self.insert(self.len(), pattern)
    }

    pub fn remove(&self, index: usize) -> Self {
        let mut items = self.0.clone();
        if index < items.len() {
            items.remove(index);
        }
        NamePatterns(items)
    }

    pub fn move_up(&self, index: usize) -> Self {
        let mut items = self.0.clone();
        if index > 0 && index < items.len() {
            items.swap(index - 1, index);
        }
        NamePatterns(items)
    }

    pub fn move_down(&self, index: usize) -> Self {
        let mut items = self.0.clone();
        if index + 1 < items.len() {
            items.swap(index, index + 1);
        }
        NamePatterns(items)
    }

    /// Fails on the first pattern whose regex does not compile.
    pub fn validate(&self) -> Result<(), PatternError> {
        self.0.iter().try_for_each(|pattern| pattern.compile().map(|_| ()))
    }
}

impl From<Vec<NamePattern>> for NamePatterns {
    fn from(items: Vec<NamePattern>) -> Self {
        NamePatterns(items)
    }
}

impl<'a> IntoIterator for &'a NamePatterns {
    type Item = &'a NamePattern;
    type IntoIter = std::slice::Iter<'a, NamePattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
