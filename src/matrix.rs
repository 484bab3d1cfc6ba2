use crate::reconciliation::MonthReconciliation;
use crate::utils::MonthKey;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One (month, code) line of the detail table.
///
/// Field names serialize as display headers so the rows can be written to CSV as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixRow {
    #[serde(rename = "Mes")]
    pub month: MonthKey,
    #[serde(rename = "Periodo")]
    pub month_label: String,
    #[serde(rename = "Código")]
    pub code: String,
    #[serde(rename = "Descripción")]
    pub description: String,
    #[serde(rename = "Cantidad Esperada")]
    pub expected: f64,
    #[serde(rename = "Cantidad Ejecutada")]
    pub executed: f64,
    #[serde(rename = "Diferencia")]
    pub difference: f64,
    #[serde(rename = "% Ejecución")]
    pub percentage: String,
    #[serde(rename = "Clasificación")]
    pub classification: String,
    #[serde(rename = "Valor Unitario")]
    pub unit_value: f64,
    #[serde(rename = "Valor Esperado")]
    pub expected_value: f64,
    #[serde(rename = "Valor Ejecutado")]
    pub executed_value: f64,
    #[serde(skip)]
    pub raw_percentage: f64,
}

/// Flattens every month's reconciliation into one table, highest execution first.
///
/// Unplanned executed codes have an infinite percentage and lead the table. Rows with
/// equal percentages keep month then code order.
pub fn build_matrix(months: &BTreeMap<MonthKey, MonthReconciliation>) -> Vec<MatrixRow> {
    let mut rows: Vec<MatrixRow> = months
        .values()
        .flat_map(|reconciliation| {
            let mut entries: Vec<_> = reconciliation.buckets.iter().collect();
            entries.sort_by(|a, b| a.code.cmp(&b.code));
            entries.into_iter().map(move |entry| {
                let raw_percentage = entry.execution_percentage();
                MatrixRow {
                    month: reconciliation.month,
                    month_label: reconciliation.month.label(),
                    code: entry.code.clone(),
                    description: entry.description.clone(),
                    expected: entry.expected_frequency,
                    executed: entry.executed_frequency,
                    difference: entry.deviation,
                    percentage: format_percentage(entry.execution_ratio()),
                    classification: entry.classification.label().to_string(),
                    unit_value: entry.unit_value,
                    expected_value: entry.expected_value,
                    executed_value: entry.executed_value,
                    raw_percentage,
                }
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.raw_percentage
            .partial_cmp(&a.raw_percentage)
            .unwrap_or(Ordering::Equal)
    });
    rows
}

fn format_percentage(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format!("{:.1}%", r * 100.0),
        None => "N/A".to_string(),
    }
}
