use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Logical columns of a technical-note plan row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanField {
    Code,
    Description,
    Frequency,
    MinFrequency,
    MaxFrequency,
    UnitValue,
    MinValue,
    MaxValue,
    MonthlyCost,
}

impl PlanField {
    pub const ALL: [PlanField; 9] = [
        PlanField::Code,
        PlanField::Description,
        PlanField::Frequency,
        PlanField::MinFrequency,
        PlanField::MaxFrequency,
        PlanField::UnitValue,
        PlanField::MinValue,
        PlanField::MaxValue,
        PlanField::MonthlyCost,
    ];

    fn default_synonyms(self) -> &'static [&'static str] {
        match self {
            PlanField::Code => &["CUP/CUM", "CUPS", "CUM", "Código", "Codigo"],
            PlanField::Description => &["Descripción", "Descripcion", "Nombre", "Servicio"],
            PlanField::Frequency => &[
                "Frecuencia Mensual",
                "Frecuencia",
                "Frecuencia Esperada",
                "Cantidad Mensual",
            ],
            PlanField::MinFrequency => &["Frecuencia Mínima Mensual", "Frecuencia Minima", "Min Frecuencia"],
            PlanField::MaxFrequency => &["Frecuencia Máxima Mensual", "Frecuencia Maxima", "Max Frecuencia"],
            PlanField::UnitValue => &["Valor Unitario", "Valor", "Tarifa"],
            PlanField::MinValue => &["Valor Mínimo Mensual", "Valor Minimo", "Min Valor"],
            PlanField::MaxValue => &["Valor Máximo Mensual", "Valor Maximo", "Max Valor"],
            PlanField::MonthlyCost => &["Costo Total Mensual", "Costo Mensual", "Valor Total Mensual"],
        }
    }
}

/// Accepted column names per logical plan field, in order of preference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ColumnSynonyms {
    fields: BTreeMap<PlanField, Vec<String>>,
}

impl Default for ColumnSynonyms {
    fn default() -> Self {
        let fields = PlanField::ALL
            .iter()
            .map(|field| {
                (
                    *field,
                    field
                        .default_synonyms()
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                )
            })
            .collect();
        Self { fields }
    }
}

impl ColumnSynonyms {
    pub fn candidates(&self, field: PlanField) -> &[String] {
        self.fields.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replaces the synonym list of one field. The first entry is the preferred name.
    pub fn with_field(mut self, field: PlanField, names: Vec<String>) -> Self {
        self.fields.insert(field, names);
        self
    }

    pub fn resolve<'a>(&self, row: &'a Map<String, Value>, field: PlanField) -> Option<&'a Value> {
        resolve_column(row, self.candidates(field))
    }
}

/// Returns the value of the first candidate present in `row`.
///
/// Candidates are tried in the given order so a canonical name wins over legacy
/// synonyms even when the row lists the synonym first. Keys compare trimmed,
/// case-insensitive and ignoring Spanish accents.
pub fn resolve_column<'a, S: AsRef<str>>(
    row: &'a Map<String, Value>,
    candidates: &[S],
) -> Option<&'a Value> {
    let keys: Vec<(String, &Value)> = row
        .iter()
        .map(|(k, v)| (normalize_header(k), v))
        .collect();

    candidates.iter().find_map(|candidate| {
        let wanted = normalize_header(candidate.as_ref());
        keys.iter()
            .find(|(key, _)| *key == wanted)
            .map(|(_, value)| *value)
    })
}

pub fn normalize_header(raw: &str) -> String {
    raw.trim().chars().flat_map(char::to_lowercase).map(fold_accent).collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        other => other,
    }
}
