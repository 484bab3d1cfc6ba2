use crate::schema::ExecutionRecord;
use crate::utils::MonthKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How often one diagnosis was seen alongside a service code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisTally {
    pub code: String,
    pub count: f64,
}

/// Executed volume of one service code within one month.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CodeAggregate {
    pub code: String,
    pub count: f64,
    /// Sum of the values charged on the execution records
    pub charged_value: f64,
    /// Sorted by diagnosis code
    pub diagnoses: Vec<DiagnosisTally>,
    pub patients: BTreeSet<String>,
}

impl CodeAggregate {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn add_record(&mut self, record: &ExecutionRecord) {
        self.count += record.quantity;
        self.charged_value += record.charged_value;
        if let Some(diagnosis) = &record.diagnosis {
            self.tally_diagnosis(diagnosis, record.quantity);
        }
        if let Some(patient) = &record.patient_id {
            self.patients.insert(patient.clone());
        }
    }

    fn tally_diagnosis(&mut self, diagnosis: &str, amount: f64) {
        match self
            .diagnoses
            .binary_search_by(|d| d.code.as_str().cmp(diagnosis))
        {
            Ok(idx) => self.diagnoses[idx].count += amount,
            Err(idx) => self.diagnoses.insert(
                idx,
                DiagnosisTally {
                    code: diagnosis.to_string(),
                    count: amount,
                },
            ),
        }
    }

    /// Folds `other` into `self`: counts, values and per-diagnosis tallies are summed.
    pub fn merge(&mut self, other: &CodeAggregate) {
        self.count += other.count;
        self.charged_value += other.charged_value;
        for tally in &other.diagnoses {
            self.tally_diagnosis(&tally.code, tally.count);
        }
        self.patients.extend(other.patients.iter().cloned());
    }

    /// Diagnosis with the highest tally; the lowest code wins a tie.
    pub fn predominant_diagnosis(&self) -> Option<&DiagnosisTally> {
        self.diagnoses.iter().fold(None, |best, tally| match best {
            Some(current) if current.count >= tally.count => Some(current),
            _ => Some(tally),
        })
    }

    pub fn diagnosis_count(&self, diagnosis: &str) -> f64 {
        self.diagnoses
            .iter()
            .find(|d| d.code == diagnosis)
            .map(|d| d.count)
            .unwrap_or(0.0)
    }

    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }
}

pub type CodeAggregates = BTreeMap<String, CodeAggregate>;

pub fn aggregate_records<'a, I>(records: I) -> CodeAggregates
where
    I: IntoIterator<Item = &'a ExecutionRecord>,
{
    let mut aggregates = CodeAggregates::new();
    for record in records {
        let code = record.code.trim();
        if code.is_empty() {
            continue;
        }
        aggregates
            .entry(code.to_string())
            .or_insert_with(|| CodeAggregate::new(code))
            .add_record(record);
    }
    aggregates
}

/// Splits records by their month tag and aggregates each month independently.
pub fn aggregate_by_month<'a, I>(records: I) -> BTreeMap<MonthKey, CodeAggregates>
where
    I: IntoIterator<Item = &'a ExecutionRecord>,
{
    let mut by_month: BTreeMap<MonthKey, Vec<&ExecutionRecord>> = BTreeMap::new();
    for record in records {
        by_month.entry(record.month).or_default().push(record);
    }

    by_month
        .into_iter()
        .map(|(month, records)| (month, aggregate_records(records)))
        .collect()
}

/// Combines the aggregates of two files from the same month.
///
/// Counts and diagnosis tallies are summed, so the result does not depend on the order
/// the files were processed in.
pub fn merge_aggregates(mut base: CodeAggregates, other: &CodeAggregates) -> CodeAggregates {
    for (code, aggregate) in other {
        base.entry(code.clone())
            .or_insert_with(|| CodeAggregate::new(code.clone()))
            .merge(aggregate);
    }
    base
}

/// Merges per-month aggregate maps, month by month.
pub fn merge_monthly(
    mut base: BTreeMap<MonthKey, CodeAggregates>,
    other: &BTreeMap<MonthKey, CodeAggregates>,
) -> BTreeMap<MonthKey, CodeAggregates> {
    for (month, aggregates) in other {
        let current = base.remove(month).unwrap_or_default();
        base.insert(*month, merge_aggregates(current, aggregates));
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ServiceCategory;

    fn month(m: u32) -> MonthKey {
        MonthKey::new(2024, m).unwrap()
    }

    fn consult(code: &str, diagnosis: Option<&str>) -> ExecutionRecord {
        let record = ExecutionRecord::new(code, ServiceCategory::Consultation, month(1));
        match diagnosis {
            Some(d) => record.with_diagnosis(d),
            None => record,
        }
    }

    #[test]
    fn test_counts_and_quantities() {
        let records = vec![
            consult("890201", Some("J00")),
            consult("890201", None),
            ExecutionRecord::new("M1", ServiceCategory::Medication, month(1))
                .with_quantity(30.0)
                .with_charged_value(900.0),
            consult("  ", Some("J00")),
        ];

        let aggregates = aggregate_records(&records);
        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates["890201"].count, 2.0);
        assert_eq!(aggregates["M1"].count, 30.0);
        assert_eq!(aggregates["M1"].charged_value, 900.0);
        assert_eq!(aggregates["890201"].diagnosis_count("J00"), 1.0);
    }

    #[test]
    fn test_predominant_diagnosis_ties_take_lowest_code() {
        let records = vec![
            consult("A", Some("J00")),
            consult("A", Some("I10")),
            consult("A", Some("I10")),
            consult("A", Some("J00")),
            consult("A", Some("E11")),
        ];
        let aggregates = aggregate_records(&records);
        let top = aggregates["A"].predominant_diagnosis().unwrap();
        assert_eq!(top.code, "I10");
        assert_eq!(top.count, 2.0);

        let clear_winner = aggregate_records(&[
            consult("B", Some("J00")),
            consult("B", Some("J00")),
            consult("B", Some("E11")),
        ]);
        assert_eq!(clear_winner["B"].predominant_diagnosis().unwrap().code, "J00");

        let no_diag = aggregate_records(&[consult("B", None)]);
        assert!(no_diag["B"].predominant_diagnosis().is_none());
    }

    #[test]
    fn test_merge_disjoint_codes_keeps_counts() {
        let a = aggregate_records(&[consult("A", None), consult("A", None)]);
        let b = aggregate_records(&[consult("B", None)]);

        let ab = merge_aggregates(a.clone(), &b);
        let ba = merge_aggregates(b.clone(), &a);

        assert_eq!(ab.len(), 2);
        assert_eq!(ab["A"].count, 2.0);
        assert_eq!(ab["B"].count, 1.0);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_merge_overlapping_codes_sums() {
        let a = aggregate_records(&[consult("A", Some("J00")), consult("A", Some("I10"))]);
        let b = aggregate_records(&[consult("A", Some("I10")), consult("C", None)]);
        let c = aggregate_records(&[consult("A", None)]);

        let left = merge_aggregates(merge_aggregates(a.clone(), &b), &c);
        let right = merge_aggregates(a.clone(), &merge_aggregates(b.clone(), &c));
        let swapped = merge_aggregates(merge_aggregates(c.clone(), &b), &a);

        assert_eq!(left, swapped);
        for merged in [&left, &right, &swapped] {
            assert_eq!(merged["A"].count, 4.0);
            assert_eq!(merged["A"].diagnosis_count("I10"), 2.0);
            assert_eq!(merged["A"].diagnosis_count("J00"), 1.0);
            assert_eq!(merged["C"].count, 1.0);
        }
        assert_eq!(left, right);
    }

    #[test]
    fn test_merge_order_does_not_change_tied_diagnosis() {
        let a = aggregate_records(&[consult("A", Some("J00"))]);
        let b = aggregate_records(&[consult("A", Some("I10"))]);

        let ab = merge_aggregates(a.clone(), &b);
        let ba = merge_aggregates(b, &a);

        assert_eq!(ab, ba);
        assert_eq!(ab["A"].predominant_diagnosis().unwrap().code, "I10");
        assert_eq!(ba["A"].predominant_diagnosis().unwrap().code, "I10");
    }

    #[test]
    fn test_aggregate_by_month() {
        let mut feb = consult("A", None);
        feb.month = month(2);
        let records = vec![consult("A", None), feb.clone(), feb];

        let by_month = aggregate_by_month(&records);
        assert_eq!(by_month.len(), 2);
        assert_eq!(by_month[&month(1)]["A"].count, 1.0);
        assert_eq!(by_month[&month(2)]["A"].count, 2.0);

        let merged = merge_monthly(by_month.clone(), &by_month);
        assert_eq!(merged[&month(2)]["A"].count, 4.0);
    }

    #[test]
    fn test_distinct_patients() {
        let records = vec![
            consult("A", None).with_patient("1"),
            consult("A", None).with_patient("1"),
            consult("A", None).with_patient("2"),
        ];
        let aggregates = aggregate_records(&records);
        assert_eq!(aggregates["A"].patient_count(), 2);
    }
}
