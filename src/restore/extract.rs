// restorectl/src/restore/extract.rs
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Clause rules, each capturing a single `schema.table` reference.
static TABLE_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)insert\s+into\s+(\w+\.\w+)\b",
        r"(?i)update\s+(\w+\.\w+)\b",
        r"(?i)from\s+(\w+\.\w+)\b",
        r"(?i)join\s+(\w+\.\w+)\b",
    ]
    .iter()
    .filter_map(|pattern| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!("Invalid table extraction rule {}: {}", pattern, e);
            None
        }
    })
    .collect()
});

/// Insertion-ordered set of strings.
#[derive(Debug, Default, Clone)]
struct OrderedSet {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl OrderedSet {
    fn insert(&mut self, value: &str) {
        if self.seen.insert(value.to_string()) {
            self.items.push(value.to_string());
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}

/// Pulls qualified table names out of free-form SQL text.
#[derive(Debug, Clone)]
pub struct ObjectExtractor {
    rules: Vec<Regex>,
}

impl Default for ObjectExtractor {
    fn default() -> Self {
        ObjectExtractor {
            rules: TABLE_RULES.clone(),
        }
    }
}

impl ObjectExtractor {
    /// Distinct `schema.table` references in discovery order: rule by rule, then by
    /// position within the text.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut tables = OrderedSet::default();
        for rule in &self.rules {
            for captures in rule.captures_iter(text) {
                if let Some(table) = captures.get(1).map(|m| m.as_str()).filter(|t| !t.is_empty()) {
                    tables.insert(table);
                }
            }
        }
        tables.into_vec()
    }
}

/// Distinct schema prefixes of qualified names. Unqualified names are skipped.
pub fn derive_schemas<S: AsRef<str>>(tables: &[S]) -> Vec<String> {
    let mut schemas = OrderedSet::default();
    for table in tables {
        if let Some((schema, _)) = table.as_ref().split_once('.') {
            if !schema.is_empty() {
                schemas.insert(schema);
            }
        }
    }
    schemas.into_vec()
}

/// Lower-cases pasted text and returns its table references sorted, as shown in the
/// objects field.
pub fn tables_from_text(text: &str) -> Vec<String> {
    let mut tables = ObjectExtractor::default().extract(&text.to_lowercase());
    tables.sort();
    tables
}

pub fn schemas_from_text(text: &str) -> Vec<String> {
    let tables = ObjectExtractor::default().extract(&text.to_lowercase());
    let mut schemas = derive_schemas(&tables);
    schemas.sort();
    schemas
}
