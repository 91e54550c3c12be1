// restorectl/src/naming/mod.rs
pub(crate) mod patterns;

use regex::{Captures, Regex};

pub use patterns::{CaseMode, NamePattern, NamePatterns, PatternError};

struct CompiledPattern {
    regex: Regex,
    template: String,
    case_mode: CaseMode,
}

/// Infers a database name from a backup path using the first matching pattern.
pub struct NameInferenceEngine {
    patterns: NamePatterns,
    compiled: Vec<CompiledPattern>,
}

impl NameInferenceEngine {
    /// Patterns whose regex does not compile are skipped with a warning.
    pub fn new(patterns: NamePatterns) -> Self {
        let compiled = patterns
            .iter()
            .filter_map(|pattern| match pattern.compile() {
                Ok(regex) => Some(CompiledPattern {
                    regex,
                    template: pattern.template.clone(),
                    case_mode: pattern.case_mode,
                }),
                Err(e) => {
                    tracing::warn!("Skipping name pattern: {}", e);
                    None
                }
            })
            .collect();

        NameInferenceEngine { patterns, compiled }
    }

    pub fn patterns(&self) -> &NamePatterns {
        &self.patterns
    }

    /// Expansion of the first pattern that matches `subject`; later patterns are
    /// never consulted, even if they would also match.
    pub fn infer(&self, subject: &str) -> Option<String> {
        self.compiled.iter().find_map(|pattern| {
            pattern
                .regex
                .captures(subject)
                .map(|captures| expand_template(&pattern.template, &captures, pattern.case_mode))
        })
    }
}

/// Replaces each `$<digits>` with that capture group, case-converted. Missing or
/// non-participating groups expand to nothing; literal text is copied unchanged.
pub fn expand_template(template: &str, captures: &Captures<'_>, case_mode: CaseMode) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(dollar) = rest.find('$') {
        result.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();

        if digits == 0 {
            result.push('$');
        } else {
            let value = after[..digits]
                .parse::<usize>()
                .ok()
                .and_then(|index| captures.get(index))
                .map(|m| case_mode.apply(m.as_str()));
            if let Some(value) = value {
                result.push_str(&value);
            }
        }
        rest = &after[digits..];
    }
    result.push_str(rest);
    result
}
