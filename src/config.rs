use crate::columns::ColumnSynonyms;
use crate::error::{ReconciliationError, Result};
use crate::schema::ServiceCategory;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ClassificationThresholds {
    #[schemars(
        description = "Execution ratio above which a code is over-executed (exclusive). Default 1.11."
    )]
    pub over: f64,

    #[schemars(
        description = "Execution ratio below which a code is under-executed. Ratios equal to this value are normal. Default 0.90."
    )]
    pub under: f64,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            over: 1.11,
            under: 0.90,
        }
    }
}

impl ClassificationThresholds {
    pub fn validate(&self) -> Result<()> {
        if !self.over.is_finite() || !self.under.is_finite() {
            return Err(ReconciliationError::InvalidThreshold(format!(
                "thresholds must be finite (over: {}, under: {})",
                self.over, self.under
            )));
        }
        if self.under <= 0.0 {
            return Err(ReconciliationError::InvalidThreshold(format!(
                "under-execution threshold {} must be positive",
                self.under
            )));
        }
        if self.over < self.under {
            return Err(ReconciliationError::InvalidThreshold(format!(
                "over-execution threshold {} is below under-execution threshold {}",
                self.over, self.under
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProjectionConfig {
    #[schemars(description = "Multiplier for the monthly lower bound. Default 0.90.")]
    pub lower_factor: f64,

    #[schemars(description = "Multiplier for the monthly upper bound. Default 1.10.")]
    pub upper_factor: f64,

    #[schemars(description = "Months used to annualize monthly figures. Default 12.")]
    pub months_per_year: u32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            lower_factor: 0.90,
            upper_factor: 1.10,
            months_per_year: 12,
        }
    }
}

impl ProjectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.lower_factor.is_finite() && self.lower_factor > 0.0) {
            return Err(ReconciliationError::InvalidProjectionFactor(format!(
                "lower factor {} must be positive",
                self.lower_factor
            )));
        }
        if !self.upper_factor.is_finite() || self.upper_factor < self.lower_factor {
            return Err(ReconciliationError::InvalidProjectionFactor(format!(
                "upper factor {} must not be below lower factor {}",
                self.upper_factor, self.lower_factor
            )));
        }
        if self.months_per_year == 0 {
            return Err(ReconciliationError::InvalidProjectionFactor(
                "months_per_year must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where one service category lives inside a patient entry and which fields it uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryLayout {
    pub category: ServiceCategory,

    #[schemars(description = "Key of the line-item array inside the patient's services object")]
    pub collection_field: String,

    #[schemars(description = "Key holding the service code on each line item")]
    pub code_field: String,

    #[schemars(
        description = "Key holding the quantity. When absent every line item counts as one occurrence."
    )]
    pub quantity_field: Option<String>,

    pub diagnosis_field: Option<String>,

    pub value_field: Option<String>,

    pub date_field: Option<String>,
}

impl CategoryLayout {
    fn rips(
        category: ServiceCategory,
        collection: &str,
        code: &str,
        quantity: Option<&str>,
        diagnosis: Option<&str>,
        date: &str,
    ) -> Self {
        Self {
            category,
            collection_field: collection.to_string(),
            code_field: code.to_string(),
            quantity_field: quantity.map(str::to_string),
            diagnosis_field: diagnosis.map(str::to_string),
            value_field: Some("vrServicio".to_string()),
            date_field: Some(date.to_string()),
        }
    }
}

/// Field names of an execution document. Defaults follow the RIPS JSON layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExecutionLayout {
    pub patients_field: String,
    pub patient_id_field: String,
    pub services_field: String,
    pub categories: Vec<CategoryLayout>,
}

impl Default for ExecutionLayout {
    fn default() -> Self {
        Self {
            patients_field: "usuarios".to_string(),
            patient_id_field: "numDocumentoIdentificacion".to_string(),
            services_field: "servicios".to_string(),
            categories: vec![
                CategoryLayout::rips(
                    ServiceCategory::Consultation,
                    "consultas",
                    "codConsulta",
                    None,
                    Some("codDiagnosticoPrincipal"),
                    "fechaInicioAtencion",
                ),
                CategoryLayout::rips(
                    ServiceCategory::Procedure,
                    "procedimientos",
                    "codProcedimiento",
                    None,
                    Some("codDiagnosticoPrincipal"),
                    "fechaInicioAtencion",
                ),
                CategoryLayout::rips(
                    ServiceCategory::Medication,
                    "medicamentos",
                    "codTecnologiaSalud",
                    Some("cantidadMedicamento"),
                    Some("codDiagnosticoPrincipal"),
                    "fechaDispensAdmon",
                ),
                CategoryLayout::rips(
                    ServiceCategory::OtherService,
                    "otrosServicios",
                    "codTecnologiaSalud",
                    Some("cantidadOS"),
                    None,
                    "fechaSuministroTecnologia",
                ),
            ],
        }
    }
}

impl ExecutionLayout {
    pub fn category(&self, category: ServiceCategory) -> Option<&CategoryLayout> {
        self.categories.iter().find(|c| c.category == category)
    }
}

/// Everything an analysis run can be tuned with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfig {
    pub thresholds: ClassificationThresholds,
    pub projection: ProjectionConfig,
    #[schemars(description = "Accepted plan column names per logical field, in order of preference")]
    pub columns: ColumnSynonyms,
    pub execution_layout: ExecutionLayout,
}

impl AnalysisConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        self.projection.validate()?;
        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalysisConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
