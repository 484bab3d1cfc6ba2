use crate::aggregator::{CodeAggregate, CodeAggregates};
use crate::config::ClassificationThresholds;
use crate::diagnosis::DiagnosisCatalog;
use crate::plan::PlanIndex;
use crate::schema::PlanRow;
use crate::utils::MonthKey;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Classification {
    /// Executed more than the over threshold (111%) of plan
    OverExecuted,
    Normal,
    /// Executed less than the under threshold (90%) of plan
    UnderExecuted,
    /// Planned but not executed at all
    Missing,
    /// Executed but not planned
    Unexpected,
}

impl Classification {
    pub const ALL: [Classification; 5] = [
        Classification::OverExecuted,
        Classification::Normal,
        Classification::UnderExecuted,
        Classification::Missing,
        Classification::Unexpected,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Classification::OverExecuted => "Sobre-ejecutado",
            Classification::Normal => "Normal",
            Classification::UnderExecuted => "Sub-ejecutado",
            Classification::Missing => "Faltante",
            Classification::Unexpected => "Inesperado",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies one code from its expected and executed frequency.
///
/// Returns `None` when both are zero: such a code carries no information and is left
/// out of every bucket. The ratio is only computed when something was expected.
pub fn classify(
    expected: f64,
    executed: f64,
    thresholds: &ClassificationThresholds,
) -> Option<Classification> {
    let has_expected = expected > 0.0;
    let has_executed = executed > 0.0;

    match (has_expected, has_executed) {
        (false, false) => None,
        (false, true) => Some(Classification::Unexpected),
        (true, false) => Some(Classification::Missing),
        (true, true) => {
            let ratio = executed / expected;
            if ratio > thresholds.over {
                Some(Classification::OverExecuted)
            } else if ratio >= thresholds.under {
                Some(Classification::Normal)
            } else {
                Some(Classification::UnderExecuted)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledEntry {
    pub code: String,
    pub description: String,
    pub classification: Classification,
    pub expected_frequency: f64,
    pub executed_frequency: f64,
    /// executed - expected
    pub deviation: f64,
    pub unit_value: f64,
    pub expected_value: f64,
    /// executed × unit value
    pub executed_value: f64,
    /// deviation × unit value
    pub deviation_value: f64,
    /// What the execution records actually charged
    pub charged_value: f64,
    pub predominant_diagnosis: Option<String>,
    pub diagnosis_description: Option<String>,
    pub patients: usize,
    pub in_plan: bool,
}

impl ReconciledEntry {
    /// `None` when nothing was expected.
    pub fn execution_ratio(&self) -> Option<f64> {
        if self.expected_frequency > 0.0 {
            Some(self.executed_frequency / self.expected_frequency)
        } else {
            None
        }
    }

    /// Executed as a percentage of plan; `+∞` for unplanned codes that were executed.
    pub fn execution_percentage(&self) -> f64 {
        match self.execution_ratio() {
            Some(ratio) => ratio * 100.0,
            None if self.executed_frequency > 0.0 => f64::INFINITY,
            None => 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationBuckets {
    pub over_executed: Vec<ReconciledEntry>,
    pub normal: Vec<ReconciledEntry>,
    pub under_executed: Vec<ReconciledEntry>,
    pub missing: Vec<ReconciledEntry>,
    pub unexpected: Vec<ReconciledEntry>,
}

impl ReconciliationBuckets {
    pub fn bucket(&self, classification: Classification) -> &[ReconciledEntry] {
        match classification {
            Classification::OverExecuted => &self.over_executed,
            Classification::Normal => &self.normal,
            Classification::UnderExecuted => &self.under_executed,
            Classification::Missing => &self.missing,
            Classification::Unexpected => &self.unexpected,
        }
    }

    fn push(&mut self, entry: ReconciledEntry) {
        let bucket = match entry.classification {
            Classification::OverExecuted => &mut self.over_executed,
            Classification::Normal => &mut self.normal,
            Classification::UnderExecuted => &mut self.under_executed,
            Classification::Missing => &mut self.missing,
            Classification::Unexpected => &mut self.unexpected,
        };
        bucket.push(entry);
    }

    pub fn len(&self) -> usize {
        Classification::ALL.iter().map(|c| self.bucket(*c).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, bucket by bucket in [`Classification::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = &ReconciledEntry> {
        Classification::ALL
            .into_iter()
            .flat_map(move |c| self.bucket(c).iter())
    }

    pub fn find(&self, code: &str) -> Option<&ReconciledEntry> {
        self.iter().find(|e| e.code == code)
    }

    pub fn counts(&self) -> BTreeMap<Classification, usize> {
        Classification::ALL
            .iter()
            .map(|c| (*c, self.bucket(*c).len()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationTotals {
    pub expected_value: f64,
    pub executed_value: f64,
    pub deviation_value: f64,
    pub charged_value: f64,
    pub codes: usize,
}

impl ReconciliationTotals {
    fn add_entry(&mut self, entry: &ReconciledEntry) {
        self.expected_value += entry.expected_value;
        self.executed_value += entry.executed_value;
        self.deviation_value += entry.deviation_value;
        self.charged_value += entry.charged_value;
        self.codes += 1;
    }

    pub fn combine(&self, other: &ReconciliationTotals) -> ReconciliationTotals {
        ReconciliationTotals {
            expected_value: self.expected_value + other.expected_value,
            executed_value: self.executed_value + other.executed_value,
            deviation_value: self.deviation_value + other.deviation_value,
            charged_value: self.charged_value + other.charged_value,
            codes: self.codes + other.codes,
        }
    }

    /// Executed value as a percentage of expected value, `None` if nothing was expected.
    pub fn execution_percentage(&self) -> Option<f64> {
        if self.expected_value > 0.0 {
            Some(self.executed_value / self.expected_value * 100.0)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthReconciliation {
    pub month: MonthKey,
    pub buckets: ReconciliationBuckets,
    pub totals: ReconciliationTotals,
}

impl MonthReconciliation {
    pub fn summary(&self) -> String {
        let counts = self.buckets.counts();
        format!(
            "{}: {} codes ({} over, {} normal, {} under, {} missing, {} unexpected), expected ${:.2}, executed ${:.2}, deviation ${:.2}",
            self.month.label(),
            self.totals.codes,
            counts[&Classification::OverExecuted],
            counts[&Classification::Normal],
            counts[&Classification::UnderExecuted],
            counts[&Classification::Missing],
            counts[&Classification::Unexpected],
            self.totals.expected_value,
            self.totals.executed_value,
            self.totals.deviation_value,
        )
    }
}

/// Joins the plan with executed aggregates and classifies every code.
///
/// Holds no state between calls; every call builds fresh results.
pub struct ReconciliationEngine<'a> {
    pub thresholds: ClassificationThresholds,
    diagnoses: Option<&'a DiagnosisCatalog>,
}

impl Default for ReconciliationEngine<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new() -> Self {
        Self::with_thresholds(ClassificationThresholds::default())
    }

    pub fn with_thresholds(thresholds: ClassificationThresholds) -> Self {
        ReconciliationEngine {
            thresholds,
            diagnoses: None,
        }
    }

    /// Attaches a catalog used to describe each code's predominant diagnosis.
    pub fn with_diagnoses(mut self, catalog: &'a DiagnosisCatalog) -> Self {
        self.diagnoses = Some(catalog);
        self
    }

    pub fn reconcile(
        &self,
        plan: &PlanIndex,
        months: &BTreeMap<MonthKey, CodeAggregates>,
    ) -> BTreeMap<MonthKey, MonthReconciliation> {
        months
            .iter()
            .map(|(month, aggregates)| (*month, self.reconcile_month(*month, plan, aggregates)))
            .collect()
    }

    /// Reconciles one month. Buckets are ordered by service code.
    pub fn reconcile_month(
        &self,
        month: MonthKey,
        plan: &PlanIndex,
        aggregates: &CodeAggregates,
    ) -> MonthReconciliation {
        let codes: BTreeSet<&str> = plan
            .codes()
            .chain(aggregates.keys().map(String::as_str))
            .collect();

        let mut buckets = ReconciliationBuckets::default();
        let mut totals = ReconciliationTotals::default();

        for code in codes {
            if let Some(entry) = self.reconcile_code(code, plan.get(code), aggregates.get(code)) {
                totals.add_entry(&entry);
                buckets.push(entry);
            }
        }

        debug!(
            "Reconciled {}: {} codes, expected {:.2}, executed {:.2}",
            month, totals.codes, totals.expected_value, totals.executed_value
        );

        MonthReconciliation {
            month,
            buckets,
            totals,
        }
    }

    fn reconcile_code(
        &self,
        code: &str,
        planned: Option<&PlanRow>,
        executed: Option<&CodeAggregate>,
    ) -> Option<ReconciledEntry> {
        let expected_frequency = planned.map(|p| p.expected_frequency).unwrap_or(0.0);
        let executed_frequency = executed.map(|a| a.count).unwrap_or(0.0);

        let classification = classify(expected_frequency, executed_frequency, &self.thresholds)?;

        let unit_value = planned.map(|p| p.unit_value).unwrap_or(0.0);
        let deviation = executed_frequency - expected_frequency;

        let predominant_diagnosis = executed
            .and_then(|a| a.predominant_diagnosis())
            .map(|d| d.code.clone());
        let diagnosis_description = match (self.diagnoses, &predominant_diagnosis) {
            (Some(catalog), Some(diagnosis)) => catalog.describe(diagnosis).map(str::to_string),
            _ => None,
        };

        Some(ReconciledEntry {
            code: code.to_string(),
            description: planned.map(|p| p.description.clone()).unwrap_or_default(),
            classification,
            expected_frequency,
            executed_frequency,
            deviation,
            unit_value,
            expected_value: expected_frequency * unit_value,
            executed_value: executed_frequency * unit_value,
            deviation_value: deviation * unit_value,
            charged_value: executed.map(|a| a.charged_value).unwrap_or(0.0),
            predominant_diagnosis,
            diagnosis_description,
            patients: executed.map(|a| a.patient_count()).unwrap_or(0),
            in_plan: planned.is_some(),
        })
    }
}

/// Sums the totals of every month.
pub fn overall_totals(months: &BTreeMap<MonthKey, MonthReconciliation>) -> ReconciliationTotals {
    months
        .values()
        .fold(ReconciliationTotals::default(), |acc, m| acc.combine(&m.totals))
}
