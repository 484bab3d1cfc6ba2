use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisEntry {
    pub code: String,
    pub description: String,
}

/// Read-only lookup of diagnosis (ICD-10) descriptions.
///
/// Built once by the caller and handed to the reconciliation engine; the crate keeps no
/// global tables.
#[derive(Debug, Clone, Default)]
pub struct DiagnosisCatalog {
    entries: BTreeMap<String, String>,
}

impl DiagnosisCatalog {
    pub fn from_entries<I, C, D>(entries: I) -> Self
    where
        I: IntoIterator<Item = (C, D)>,
        C: AsRef<str>,
        D: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(code, description)| (normalize_code(code.as_ref()), description.into()))
            .filter(|(code, _)| !code.is_empty())
            .collect();
        Self { entries }
    }

    /// Reads a JSON array of `{ "code": ..., "description": ... }` objects.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let entries: Vec<DiagnosisEntry> = serde_json::from_str(raw)?;
        Ok(Self::from_entries(
            entries.into_iter().map(|e| (e.code, e.description)),
        ))
    }

    /// Case-insensitive; `"j45.9"` and `"J459"` both find `J459`.
    pub fn describe(&self, code: &str) -> Option<&str> {
        self.entries.get(&normalize_code(code)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_code(code: &str) -> String {
    code.trim()
        .chars()
        .filter(|c| *c != '.')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_normalizes_codes() {
        let catalog = DiagnosisCatalog::from_entries([
            ("J459", "Asma, no especificada"),
            ("I10X", "Hipertensión esencial (primaria)"),
        ]);

        assert_eq!(catalog.describe("j45.9"), Some("Asma, no especificada"));
        assert_eq!(catalog.describe(" I10X "), Some("Hipertensión esencial (primaria)"));
        assert_eq!(catalog.describe("E11"), None);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_from_json() {
        let catalog = DiagnosisCatalog::from_json_str(
            r#"[{ "code": "E119", "description": "Diabetes mellitus tipo 2 sin complicaciones" }]"#,
        )
        .unwrap();
        assert!(catalog.describe("E119").is_some());

        assert!(DiagnosisCatalog::from_json_str("{}").is_err());
    }
}
