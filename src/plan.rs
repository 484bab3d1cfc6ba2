use crate::schema::PlanRow;
use log::warn;
use std::collections::BTreeMap;

/// Budgeted rows keyed by service code.
#[derive(Debug, Clone, Default)]
pub struct PlanIndex {
    rows: BTreeMap<String, PlanRow>,
    duplicates: Vec<String>,
}

impl PlanIndex {
    /// Indexes `rows` by trimmed code. A repeated code replaces the earlier row and is
    /// remembered in [`PlanIndex::duplicate_codes`]. Rows with a blank code are skipped.
    pub fn build<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a PlanRow>,
    {
        let mut index = Self::default();
        for row in rows {
            let code = row.code.trim();
            if code.is_empty() {
                continue;
            }
            if index.rows.insert(code.to_string(), row.clone()).is_some() {
                warn!("Plan code {} appears more than once; keeping the last row", code);
                index.duplicates.push(code.to_string());
            }
        }
        index
    }

    pub fn get(&self, code: &str) -> Option<&PlanRow> {
        self.rows.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rows.contains_key(code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn rows(&self) -> impl Iterator<Item = &PlanRow> {
        self.rows.values()
    }

    pub fn duplicate_codes(&self) -> &[String] {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
