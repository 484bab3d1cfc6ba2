//! Boundary between raw JSON inputs and the typed reconciliation core.
//!
//! Wrong top-level shapes fail fast here. Everything below that level is read leniently:
//! bad numbers become `0.0`, absent collections become empty, and each anomaly is
//! recorded as a [`DataIssue`] instead of aborting the run.

use crate::columns::{ColumnSynonyms, PlanField};
use crate::config::{CategoryLayout, ExecutionLayout};
use crate::error::{ReconciliationError, Result};
use crate::normalize::{try_parse_locale_number, NumericParse};
use crate::schema::{ExecutionRecord, PlanRow};
use crate::utils::{parse_event_date, MonthKey};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    UnparsableNumber,
    MissingCode,
    DuplicatePlanCode,
    MalformedStructure,
    UnparsableDate,
}

/// A data-quality problem found while reading inputs. Never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIssue {
    /// Plan row index or execution document name
    pub source: String,
    pub field: String,
    pub raw_value: String,
    pub kind: IssueKind,
}

impl DataIssue {
    fn new(source: impl Into<String>, field: impl Into<String>, raw_value: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            source: source.into(),
            field: field.into(),
            raw_value: raw_value.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanIngestion {
    pub rows: Vec<PlanRow>,
    pub issues: Vec<DataIssue>,
}

impl PlanIngestion {
    pub fn duplicate_codes(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|i| i.kind == IssueKind::DuplicatePlanCode)
            .map(|i| i.raw_value.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionExtraction {
    pub records: Vec<ExecutionRecord>,
    pub issues: Vec<DataIssue>,
    pub patients: usize,
}

pub fn parse_plan_json(raw: &str, columns: &ColumnSynonyms) -> Result<PlanIngestion> {
    let value: Value = serde_json::from_str(raw)?;
    ingest_plan_rows(&value, columns)
}

/// Converts spreadsheet-style plan rows into [`PlanRow`]s.
///
/// Rows without a service code are dropped. Duplicate codes are kept (the plan index
/// applies last-write-wins) but reported.
pub fn ingest_plan_rows(raw: &Value, columns: &ColumnSynonyms) -> Result<PlanIngestion> {
    let rows = raw.as_array().ok_or_else(|| {
        ReconciliationError::InvalidPlanInput(format!(
            "expected a sequence of rows, got {}",
            json_type_name(raw)
        ))
    })?;

    let mut ingestion = PlanIngestion::default();
    let mut seen_codes: HashSet<String> = HashSet::new();

    for (idx, row) in rows.iter().enumerate() {
        let source = format!("plan row {}", idx + 1);
        let Some(object) = row.as_object() else {
            ingestion.issues.push(DataIssue::new(
                &source,
                "row",
                row.to_string(),
                IssueKind::MalformedStructure,
            ));
            continue;
        };

        let mut reader = RowReader {
            row: object,
            columns,
            source: &source,
            issues: &mut ingestion.issues,
        };

        let Some(code) = columns.resolve(object, PlanField::Code).and_then(value_as_text) else {
            reader.issues.push(DataIssue::new(
                &source,
                "code",
                "",
                IssueKind::MissingCode,
            ));
            continue;
        };

        let description = columns
            .resolve(object, PlanField::Description)
            .and_then(value_as_text)
            .unwrap_or_default();

        let expected_frequency = reader.number(PlanField::Frequency);
        let unit_value = reader.number(PlanField::UnitValue);
        let min_frequency = reader.number(PlanField::MinFrequency);
        let max_frequency = reader.number(PlanField::MaxFrequency);
        let min_value = reader.number(PlanField::MinValue);
        let max_value = reader.number(PlanField::MaxValue);
        let monthly_cost = match reader.number(PlanField::MonthlyCost) {
            cost if cost > 0.0 => cost,
            _ => expected_frequency * unit_value,
        };

        if !seen_codes.insert(code.clone()) {
            ingestion.issues.push(DataIssue::new(
                &source,
                "code",
                code.clone(),
                IssueKind::DuplicatePlanCode,
            ));
        }

        ingestion.rows.push(PlanRow {
            code,
            description,
            expected_frequency,
            min_frequency,
            max_frequency,
            unit_value,
            min_value,
            max_value,
            monthly_cost,
        });
    }

    log_issue_summary("plan", &ingestion.issues);
    Ok(ingestion)
}

struct RowReader<'a> {
    row: &'a Map<String, Value>,
    columns: &'a ColumnSynonyms,
    source: &'a str,
    issues: &'a mut Vec<DataIssue>,
}

impl RowReader<'_> {
    /// Absent columns read as `0.0`, like blank ones.
    fn number(&mut self, field: PlanField) -> f64 {
        let Some(value) = self.columns.resolve(self.row, field) else {
            return 0.0;
        };
        let parsed = try_parse_locale_number(value);
        if let NumericParse::Invalid(raw) = &parsed {
            self.issues.push(DataIssue::new(
                self.source,
                field_name(field),
                raw.clone(),
                IssueKind::UnparsableNumber,
            ));
        }
        parsed.value_or_zero()
    }
}

pub fn parse_execution_json(
    document_name: &str,
    raw: &str,
    month: MonthKey,
    layout: &ExecutionLayout,
) -> Result<ExecutionExtraction> {
    let value: Value = serde_json::from_str(raw)?;
    extract_execution_records(document_name, &value, month, layout)
}

/// Flattens one execution document (patients → categories → line items) into records
/// tagged with `month`.
pub fn extract_execution_records(
    document_name: &str,
    document: &Value,
    month: MonthKey,
    layout: &ExecutionLayout,
) -> Result<ExecutionExtraction> {
    let root = document
        .as_object()
        .ok_or_else(|| ReconciliationError::InvalidExecutionDocument {
            document: document_name.to_string(),
            details: format!("expected an object, got {}", json_type_name(document)),
        })?;

    let mut extraction = ExecutionExtraction::default();

    let patients: &[Value] = match root.get(&layout.patients_field) {
        Some(Value::Array(patients)) => patients.as_slice(),
        Some(other) => {
            extraction.issues.push(DataIssue::new(
                document_name,
                layout.patients_field.as_str(),
                json_type_name(other),
                IssueKind::MalformedStructure,
            ));
            &[]
        }
        None => &[],
    };

    for patient in patients {
        let Some(patient) = patient.as_object() else {
            extraction.issues.push(DataIssue::new(
                document_name,
                layout.patients_field.as_str(),
                json_type_name(patient),
                IssueKind::MalformedStructure,
            ));
            continue;
        };
        extraction.patients += 1;

        let patient_id = patient.get(&layout.patient_id_field).and_then(value_as_text);

        let services = if layout.services_field.is_empty() {
            Some(patient)
        } else {
            patient.get(&layout.services_field).and_then(Value::as_object)
        };
        let Some(services) = services else {
            continue;
        };

        for category in &layout.categories {
            let Some(items) = services.get(&category.collection_field).and_then(Value::as_array) else {
                continue;
            };

            for item in items.iter().filter_map(Value::as_object) {
                if let Some(record) = read_line_item(
                    document_name,
                    item,
                    category,
                    patient_id.as_deref(),
                    month,
                    &mut extraction.issues,
                ) {
                    extraction.records.push(record);
                }
            }
        }
    }

    debug!(
        "Extracted {} records for {} patients from '{}' ({})",
        extraction.records.len(),
        extraction.patients,
        document_name,
        month
    );
    log_issue_summary(document_name, &extraction.issues);

    Ok(extraction)
}

fn read_line_item(
    document_name: &str,
    item: &Map<String, Value>,
    layout: &CategoryLayout,
    patient_id: Option<&str>,
    month: MonthKey,
    issues: &mut Vec<DataIssue>,
) -> Option<ExecutionRecord> {
    let Some(code) = item.get(&layout.code_field).and_then(value_as_text) else {
        issues.push(DataIssue::new(
            document_name,
            layout.code_field.as_str(),
            "",
            IssueKind::MissingCode,
        ));
        return None;
    };

    let quantity = match layout.quantity_field.as_ref().and_then(|f| item.get(f)) {
        None => 1.0,
        Some(raw) => match try_parse_locale_number(raw) {
            NumericParse::Parsed(q) => q,
            NumericParse::Empty => 1.0,
            NumericParse::Invalid(text) => {
                issues.push(DataIssue::new(
                    document_name,
                    layout.quantity_field.as_deref().unwrap_or_default(),
                    text,
                    IssueKind::UnparsableNumber,
                ));
                1.0
            }
        },
    };

    let charged_value = match layout.value_field.as_ref().and_then(|f| item.get(f)) {
        None => 0.0,
        Some(raw) => {
            let parsed = try_parse_locale_number(raw);
            if let NumericParse::Invalid(text) = &parsed {
                issues.push(DataIssue::new(
                    document_name,
                    layout.value_field.as_deref().unwrap_or_default(),
                    text.clone(),
                    IssueKind::UnparsableNumber,
                ));
            }
            parsed.value_or_zero()
        }
    };

    let diagnosis = layout
        .diagnosis_field
        .as_ref()
        .and_then(|f| item.get(f))
        .and_then(value_as_text);

    let event_date = match layout
        .date_field
        .as_ref()
        .and_then(|f| item.get(f))
        .and_then(value_as_text)
    {
        None => None,
        Some(text) => {
            let parsed = parse_event_date(&text);
            if parsed.is_none() {
                issues.push(DataIssue::new(
                    document_name,
                    layout.date_field.as_deref().unwrap_or_default(),
                    text,
                    IssueKind::UnparsableDate,
                ));
            }
            parsed
        }
    };

    Some(ExecutionRecord {
        code,
        category: layout.category,
        patient_id: patient_id.map(str::to_string),
        event_date,
        quantity,
        charged_value,
        diagnosis,
        month,
        source_document: document_name.to_string(),
    })
}

/// Reads a code-like scalar. Numeric codes keep their integer rendering, so `890201.0`
/// joins with `"890201"`.
fn value_as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn field_name(field: PlanField) -> &'static str {
    match field {
        PlanField::Code => "code",
        PlanField::Description => "description",
        PlanField::Frequency => "expected_frequency",
        PlanField::MinFrequency => "min_frequency",
        PlanField::MaxFrequency => "max_frequency",
        PlanField::UnitValue => "unit_value",
        PlanField::MinValue => "min_value",
        PlanField::MaxValue => "max_value",
        PlanField::MonthlyCost => "monthly_cost",
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn log_issue_summary(source: &str, issues: &[DataIssue]) {
    if issues.is_empty() {
        return;
    }
    warn!("{} data issues found while reading {}", issues.len(), source);
    for issue in issues {
        debug!(
            "{:?} in {} field '{}': '{}'",
            issue.kind, issue.source, issue.field, issue.raw_value
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ServiceCategory;
    use serde_json::json;

    fn month() -> MonthKey {
        MonthKey::new(2024, 3).unwrap()
    }

    #[test]
    fn test_plan_rows_with_locale_values() {
        let raw = json!([
            {
                "CUP/CUM": "890201",
                "Descripción": "Consulta de primera vez por medicina general",
                "Frecuencia Mensual": "1.200",
                "Valor Unitario": "$ 35.000,50",
            }
        ]);

        let ingestion = ingest_plan_rows(&raw, &ColumnSynonyms::default()).unwrap();
        assert!(ingestion.issues.is_empty());
        let row = &ingestion.rows[0];
        assert_eq!(row.code, "890201");
        assert_eq!(row.expected_frequency, 1200.0);
        assert_eq!(row.unit_value, 35000.5);
        assert_eq!(row.monthly_cost, 1200.0 * 35000.5);
        assert_eq!(row.min_frequency, 0.0);
        assert_eq!(row.max_frequency, 0.0);
        assert_eq!(row.min_value, 0.0);
        assert_eq!(row.max_value, 0.0);
    }

    #[test]
    fn test_plan_explicit_cost_and_bounds() {
        let raw = json!([
            {
                "CUPS": 903841,
                "Frecuencia": 10,
                "Valor Unitario": 1000,
                "Costo Total Mensual": "12.000",
                "Frecuencia Minima": "8",
                "Valor Máximo Mensual": "15.000",
                "Valor Mínimo Mensual": ""
            }
        ]);

        let ingestion = ingest_plan_rows(&raw, &ColumnSynonyms::default()).unwrap();
        let row = &ingestion.rows[0];
        assert_eq!(row.code, "903841");
        assert_eq!(row.monthly_cost, 12000.0);
        assert_eq!(row.min_frequency, 8.0);
        assert_eq!(row.max_frequency, 0.0);
        assert_eq!(row.max_value, 15000.0);
        assert_eq!(row.min_value, 0.0);
    }

    #[test]
    fn test_minus_signs_do_not_flip_plan_values() {
        let raw = json!([
            { "CUPS": "A", "Frecuencia": "-10", "Valor Unitario": "-1.500" }
        ]);

        let ingestion = ingest_plan_rows(&raw, &ColumnSynonyms::default()).unwrap();
        let row = &ingestion.rows[0];
        assert_eq!(row.expected_frequency, 10.0);
        assert_eq!(row.unit_value, 1500.0);
        assert_eq!(row.monthly_cost, 15000.0);
        assert!(ingestion.issues.is_empty());
    }

    #[test]
    fn test_minus_sign_on_quantity_still_counts() {
        let doc = json!({
            "usuarios": [{
                "servicios": {
                    "medicamentos": [ { "codTecnologiaSalud": "M1", "cantidadMedicamento": "-3" } ]
                }
            }]
        });

        let extraction =
            extract_execution_records("q", &doc, month(), &ExecutionLayout::default()).unwrap();
        assert_eq!(extraction.records[0].quantity, 3.0);
    }

    #[test]
    fn test_float_codes_render_without_fraction() {
        let raw = json!([
            { "CUPS": 890201.0, "Frecuencia": 1 },
            { "CUPS": 12.5, "Frecuencia": 1 }
        ]);
        let ingestion = ingest_plan_rows(&raw, &ColumnSynonyms::default()).unwrap();
        assert_eq!(ingestion.rows[0].code, "890201");
        assert_eq!(ingestion.rows[1].code, "12.5");

        let doc = json!({
            "usuarios": [ { "servicios": { "procedimientos": [ { "codProcedimiento": 903841.0 } ] } } ]
        });
        let extraction =
            extract_execution_records("r", &doc, month(), &ExecutionLayout::default()).unwrap();
        assert_eq!(extraction.records[0].code, "903841");
    }

    #[test]
    fn test_plan_must_be_sequence() {
        let result = ingest_plan_rows(&json!({ "CUPS": "1" }), &ColumnSynonyms::default());
        assert!(matches!(result, Err(ReconciliationError::InvalidPlanInput(_))));
    }

    #[test]
    fn test_plan_issues_are_reported() {
        let raw = json!([
            { "CUPS": "A", "Frecuencia": "muchas", "Valor Unitario": "5" },
            { "Descripcion": "sin código" },
            "not a row",
            { "CUPS": "A", "Frecuencia": 3 }
        ]);

        let ingestion = ingest_plan_rows(&raw, &ColumnSynonyms::default()).unwrap();
        assert_eq!(ingestion.rows.len(), 2);
        assert_eq!(ingestion.rows[0].expected_frequency, 0.0);
        assert_eq!(ingestion.rows[0].unit_value, 5.0);

        let kinds: Vec<IssueKind> = ingestion.issues.iter().map(|i| i.kind).collect();
        assert!(kinds.contains(&IssueKind::UnparsableNumber));
        assert!(kinds.contains(&IssueKind::MissingCode));
        assert!(kinds.contains(&IssueKind::MalformedStructure));
        assert_eq!(ingestion.duplicate_codes(), vec!["A"]);
    }

    #[test]
    fn test_extract_rips_document() {
        let doc = json!({
            "numFactura": "FE-100",
            "usuarios": [
                {
                    "numDocumentoIdentificacion": "1001",
                    "servicios": {
                        "consultas": [
                            { "codConsulta": "890201", "codDiagnosticoPrincipal": "J00", "vrServicio": 35000, "fechaInicioAtencion": "2024-03-04 09:15" },
                            { "codConsulta": "890201", "codDiagnosticoPrincipal": "I10", "vrServicio": "35.000" }
                        ],
                        "medicamentos": [
                            { "codTecnologiaSalud": "19938587-1", "cantidadMedicamento": 30, "codDiagnosticoPrincipal": "I10", "vrServicio": 9000 }
                        ],
                        "otrosServicios": [
                            { "codTecnologiaSalud": "OS-1" }
                        ]
                    }
                },
                {
                    "numDocumentoIdentificacion": 2002,
                    "servicios": {
                        "procedimientos": [
                            { "codProcedimiento": "903841", "codDiagnosticoPrincipal": "E11" }
                        ]
                    }
                }
            ]
        });

        let extraction =
            extract_execution_records("FE-100.json", &doc, month(), &ExecutionLayout::default())
                .unwrap();

        assert_eq!(extraction.patients, 2);
        assert_eq!(extraction.records.len(), 5);
        assert!(extraction.issues.is_empty());

        let meds: Vec<&ExecutionRecord> = extraction
            .records
            .iter()
            .filter(|r| r.category == ServiceCategory::Medication)
            .collect();
        assert_eq!(meds[0].quantity, 30.0);

        let other = extraction
            .records
            .iter()
            .find(|r| r.category == ServiceCategory::OtherService)
            .unwrap();
        assert_eq!(other.quantity, 1.0);
        assert_eq!(other.diagnosis, None);

        let procedure = extraction
            .records
            .iter()
            .find(|r| r.code == "903841")
            .unwrap();
        assert_eq!(procedure.patient_id.as_deref(), Some("2002"));

        let first = &extraction.records[0];
        assert_eq!(first.charged_value, 35000.0);
        assert_eq!(first.event_date, chrono::NaiveDate::from_ymd_opt(2024, 3, 4));
        assert_eq!(first.month, month());
        assert_eq!(first.source_document, "FE-100.json");
    }

    #[test]
    fn test_missing_structure_is_empty() {
        let layout = ExecutionLayout::default();

        let no_patients = extract_execution_records("a", &json!({}), month(), &layout).unwrap();
        assert!(no_patients.records.is_empty());

        let no_services = extract_execution_records(
            "b",
            &json!({ "usuarios": [ { "numDocumentoIdentificacion": "1" } ] }),
            month(),
            &layout,
        )
        .unwrap();
        assert!(no_services.records.is_empty());
        assert_eq!(no_services.patients, 1);

        let wrong_patients =
            extract_execution_records("c", &json!({ "usuarios": "x" }), month(), &layout).unwrap();
        assert!(wrong_patients.records.is_empty());
        assert_eq!(wrong_patients.issues[0].kind, IssueKind::MalformedStructure);
    }

    #[test]
    fn test_document_must_be_object() {
        let result =
            extract_execution_records("d", &json!([1, 2]), month(), &ExecutionLayout::default());
        assert!(matches!(
            result,
            Err(ReconciliationError::InvalidExecutionDocument { .. })
        ));
    }

    #[test]
    fn test_line_item_issues() {
        let doc = json!({
            "usuarios": [{
                "servicios": {
                    "consultas": [
                        { "codDiagnosticoPrincipal": "J00" },
                        { "codConsulta": "890201", "fechaInicioAtencion": "ayer", "vrServicio": "gratis" }
                    ],
                    "medicamentos": [
                        { "codTecnologiaSalud": "M1", "cantidadMedicamento": "dos" }
                    ]
                }
            }]
        });

        let extraction =
            extract_execution_records("e", &doc, month(), &ExecutionLayout::default()).unwrap();
        assert_eq!(extraction.records.len(), 2);

        let kinds: Vec<IssueKind> = extraction.issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                IssueKind::MissingCode,
                IssueKind::UnparsableNumber,
                IssueKind::UnparsableDate,
                IssueKind::UnparsableNumber,
            ]
        );
        let med = extraction.records.iter().find(|r| r.code == "M1").unwrap();
        assert_eq!(med.quantity, 1.0);
    }

    #[test]
    fn test_categories_directly_on_patient() {
        let layout = ExecutionLayout {
            services_field: String::new(),
            ..ExecutionLayout::default()
        };
        let doc = json!({
            "usuarios": [ { "consultas": [ { "codConsulta": "X1" } ] } ]
        });

        let extraction = extract_execution_records("f", &doc, month(), &layout).unwrap();
        assert_eq!(extraction.records.len(), 1);
    }

    #[test]
    fn test_parse_execution_json_string() {
        let raw = r#"{ "usuarios": [ { "servicios": { "procedimientos": [ { "codProcedimiento": "P1" } ] } } ] }"#;
        let extraction =
            parse_execution_json("g", raw, month(), &ExecutionLayout::default()).unwrap();
        assert_eq!(extraction.records[0].code, "P1");

        assert!(parse_execution_json("h", "{not json", month(), &ExecutionLayout::default()).is_err());
    }
}
