//! # Nota Técnica Reconciler
//!
//! A library for reconciling the budgeted services of a technical note (the plan behind a
//! prospective global payment contract) against the services actually executed, as
//! reported in RIPS-style JSON files.
//!
//! ## Core Concepts
//!
//! - **Plan**: budgeted rows per service code with expected monthly frequency and unit value
//! - **Execution**: per patient, per service category, per line item records
//! - **Aggregates**: executed counts and diagnosis tallies per (month, service code)
//! - **Classification**: over-executed (> 111%), normal, under-executed (< 90%), missing
//!   (planned, not executed) or unexpected (executed, not planned)
//! - **Leniency**: malformed numbers and missing structure degrade to zero/empty and are
//!   reported as data issues; only wrong top-level input types are errors
//!
//! ## Example
//!
//! ```rust,ignore
//! use nota_tecnica_reconciler::*;
//! use serde_json::json;
//!
//! let plan = json!([
//!     { "CUP/CUM": "890201", "Descripción": "Consulta medicina general",
//!       "Frecuencia Mensual": "1.200", "Valor Unitario": "$ 35.000" }
//! ]);
//! let documents = vec![ExecutionDocument {
//!     name: "FE-001.json".to_string(),
//!     month: MonthKey::new(2024, 3)?,
//!     content: json!({ "usuarios": [] }),
//! }];
//!
//! let report = ReconciliationProcessor::process_raw(&AnalysisConfig::default(), &plan, &documents, None)?;
//! for month in report.reconciliations.values() {
//!     println!("{}", month.summary());
//! }
//! ```

pub mod aggregator;
pub mod columns;
pub mod config;
pub mod diagnosis;
pub mod error;
pub mod ingestion;
pub mod matrix;
pub mod normalize;
pub mod plan;
pub mod projection;
pub mod reconciliation;
pub mod schema;
pub mod utils;

pub use aggregator::{
    aggregate_by_month, aggregate_records, merge_aggregates, merge_monthly, CodeAggregate,
    CodeAggregates, DiagnosisTally,
};
pub use columns::{resolve_column, ColumnSynonyms, PlanField};
pub use config::{
    AnalysisConfig, CategoryLayout, ClassificationThresholds, ExecutionLayout, ProjectionConfig,
};
pub use diagnosis::{DiagnosisCatalog, DiagnosisEntry};
pub use error::{ReconciliationError, Result};
pub use ingestion::*;
pub use matrix::{build_matrix, MatrixRow};
pub use normalize::{parse_locale_number, parse_locale_str, NumericParse};
pub use plan::PlanIndex;
pub use projection::{BandPosition, FinancialProjection};
pub use reconciliation::{
    classify, overall_totals, Classification, MonthReconciliation, ReconciledEntry,
    ReconciliationBuckets, ReconciliationEngine, ReconciliationTotals,
};
pub use schema::*;
pub use utils::MonthKey;

use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// A parsed execution file and the month it reports.
#[derive(Debug, Clone)]
pub struct ExecutionDocument {
    pub name: String,
    pub month: MonthKey,
    pub content: Value,
}

impl ExecutionDocument {
    /// Reads a JSON execution file; the document is named after the file.
    pub fn from_path(path: impl AsRef<Path>, month: MonthKey) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let content: Value = serde_json::from_str(&raw)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            month,
            content,
        })
    }
}

/// Everything one analysis run produces.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub aggregates: BTreeMap<MonthKey, CodeAggregates>,
    pub reconciliations: BTreeMap<MonthKey, MonthReconciliation>,
    pub matrix: Vec<MatrixRow>,
    pub projection: FinancialProjection,
    pub totals: ReconciliationTotals,
    pub issues: Vec<DataIssue>,
    pub duplicate_plan_codes: Vec<String>,
}

impl AnalysisReport {
    pub fn month(&self, month: MonthKey) -> Option<&MonthReconciliation> {
        self.reconciliations.get(&month)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct ReconciliationProcessor;

impl ReconciliationProcessor {
    /// Runs the full analysis over already typed plan rows and execution records.
    pub fn process(
        config: &AnalysisConfig,
        plan_rows: &[PlanRow],
        records: &[ExecutionRecord],
        diagnoses: Option<&DiagnosisCatalog>,
    ) -> Result<AnalysisReport> {
        config.validate()?;

        let aggregates = aggregate_by_month(records);
        Ok(Self::analyze(config, plan_rows, aggregates, Vec::new(), diagnoses))
    }

    /// Ingests raw JSON inputs, then runs the analysis.
    ///
    /// Each document is aggregated on its own and merged into its month, the same way
    /// several files of one month are combined.
    pub fn process_raw(
        config: &AnalysisConfig,
        plan: &Value,
        documents: &[ExecutionDocument],
        diagnoses: Option<&DiagnosisCatalog>,
    ) -> Result<AnalysisReport> {
        config.validate()?;

        let plan_ingestion = ingest_plan_rows(plan, &config.columns)?;
        let mut issues = plan_ingestion.issues;
        let mut aggregates: BTreeMap<MonthKey, CodeAggregates> = BTreeMap::new();

        for document in documents {
            let extraction = extract_execution_records(
                &document.name,
                &document.content,
                document.month,
                &config.execution_layout,
            )?;
            let file_aggregates = aggregate_records(&extraction.records);
            let month_aggregates = aggregates.remove(&document.month).unwrap_or_default();
            aggregates.insert(
                document.month,
                merge_aggregates(month_aggregates, &file_aggregates),
            );
            issues.extend(extraction.issues);
        }

        Ok(Self::analyze(
            config,
            &plan_ingestion.rows,
            aggregates,
            issues,
            diagnoses,
        ))
    }

    fn analyze(
        config: &AnalysisConfig,
        plan_rows: &[PlanRow],
        aggregates: BTreeMap<MonthKey, CodeAggregates>,
        issues: Vec<DataIssue>,
        diagnoses: Option<&DiagnosisCatalog>,
    ) -> AnalysisReport {
        info!(
            "Reconciling {} plan rows against {} months of execution",
            plan_rows.len(),
            aggregates.len()
        );

        let plan = PlanIndex::build(plan_rows);
        let mut engine = ReconciliationEngine::with_thresholds(config.thresholds.clone());
        if let Some(catalog) = diagnoses {
            engine = engine.with_diagnoses(catalog);
        }

        let reconciliations = engine.reconcile(&plan, &aggregates);
        for month in reconciliations.values() {
            debug!("{}", month.summary());
        }

        let matrix = build_matrix(&reconciliations);
        let projection = FinancialProjection::from_rows(plan.rows(), &config.projection);
        let totals = overall_totals(&reconciliations);

        info!(
            "Reconciliation finished: {} matrix rows, {} data issues, deviation ${:.2}",
            matrix.len(),
            issues.len(),
            totals.deviation_value
        );

        AnalysisReport {
            aggregates,
            reconciliations,
            matrix,
            projection,
            totals,
            issues,
            duplicate_plan_codes: plan.duplicate_codes().to_vec(),
        }
    }
}

pub fn run_analysis(
    config: &AnalysisConfig,
    plan_rows: &[PlanRow],
    records: &[ExecutionRecord],
) -> Result<AnalysisReport> {
    ReconciliationProcessor::process(config, plan_rows, records, None)
}
