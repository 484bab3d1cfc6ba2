use crate::utils::MonthKey;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanRow {
    #[schemars(description = "Service code (CUPS/CUM). Canonical join key against execution records.")]
    pub code: String,

    #[schemars(description = "Service description as written in the technical note")]
    pub description: String,

    #[schemars(description = "Expected monthly frequency (number of occurrences). Never negative.")]
    pub expected_frequency: f64,

    #[schemars(description = "Lower bound of the expected monthly frequency")]
    pub min_frequency: f64,

    #[schemars(description = "Upper bound of the expected monthly frequency")]
    pub max_frequency: f64,

    #[schemars(description = "Agreed value per single occurrence of the service")]
    pub unit_value: f64,

    #[schemars(description = "Lower bound of the expected monthly value")]
    pub min_value: f64,

    #[schemars(description = "Upper bound of the expected monthly value")]
    pub max_value: f64,

    #[schemars(
        description = "Budgeted monthly cost. Taken from the plan when present, otherwise expected frequency times unit value."
    )]
    pub monthly_cost: f64,
}

impl PlanRow {
    /// Builds a row without min/max bounds; they stay at `0.0` as when the plan omits them.
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        expected_frequency: f64,
        unit_value: f64,
    ) -> Self {
        let monthly_cost = expected_frequency * unit_value;
        Self {
            code: code.into(),
            description: description.into(),
            expected_frequency,
            min_frequency: 0.0,
            max_frequency: 0.0,
            unit_value,
            min_value: 0.0,
            max_value: 0.0,
            monthly_cost,
        }
    }

    pub fn expected_value(&self) -> f64 {
        self.expected_frequency * self.unit_value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    #[schemars(description = "Medical consultations. Each line item counts as one occurrence.")]
    Consultation,

    #[schemars(description = "Procedures. Each line item counts as one occurrence.")]
    Procedure,

    #[schemars(description = "Dispensed medications. Quantity comes from an explicit field.")]
    Medication,

    #[schemars(description = "Other services and supplies. Quantity comes from an explicit field.")]
    OtherService,
}

/// One atomic service event extracted from a patient's execution file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub code: String,
    pub category: ServiceCategory,
    pub patient_id: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub quantity: f64,
    pub charged_value: f64,
    pub diagnosis: Option<String>,
    pub month: MonthKey,
    pub source_document: String,
}

impl ExecutionRecord {
    pub fn new(code: impl Into<String>, category: ServiceCategory, month: MonthKey) -> Self {
        Self {
            code: code.into(),
            category,
            patient_id: None,
            event_date: None,
            quantity: 1.0,
            charged_value: 0.0,
            diagnosis: None,
            month,
            source_document: String::new(),
        }
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_diagnosis(mut self, diagnosis: impl Into<String>) -> Self {
        self.diagnosis = Some(diagnosis.into());
        self
    }

    pub fn with_patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn with_charged_value(mut self, value: f64) -> Self {
        self.charged_value = value;
        self
    }
}
