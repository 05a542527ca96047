use anyhow::Result;
use deunicode::deunicode;
use regex::Regex;
use std::collections::HashSet;

/// Outcome of normalizing one institution answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// The answer is a known spelling of the canonical institution.
    Canonical(String),
    /// Not recognized; carries the original text untouched.
    Unchanged(String),
}

impl Normalized {
    pub fn is_canonical(&self) -> bool {
        matches!(self, Normalized::Canonical(_))
    }

    pub fn into_value(self) -> String {
        match self {
            Normalized::Canonical(value) | Normalized::Unchanged(value) => value,
        }
    }
}

pub struct InstitutionNormalizer {
    canonical: String,
    variants: HashSet<String>,
    punctuation: Regex,
    whitespace: Regex,
}

impl InstitutionNormalizer {
    pub fn new(canonical: &str, variants: &HashSet<String>) -> Result<Self> {
        Ok(Self {
            canonical: canonical.to_string(),
            variants: variants.clone(),
            punctuation: Regex::new(r"[^\w\s]")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Comparison key: ASCII transliteration, lowercase, no punctuation,
    /// single spaces, trimmed.
    pub fn normalize_key(&self, raw: &str) -> String {
        let ascii = deunicode(raw).to_lowercase();
        let stripped = self.punctuation.replace_all(&ascii, "");
        self.whitespace.replace_all(&stripped, " ").trim().to_string()
    }

    pub fn normalize(&self, raw: &str) -> Normalized {
        let key = self.normalize_key(raw);
        // The canonical spelling itself always normalizes to itself.
        if self.variants.contains(&key) || key == self.normalize_key(&self.canonical) {
            Normalized::Canonical(self.canonical.clone())
        } else {
            Normalized::Unchanged(raw.to_string())
        }
    }
}
