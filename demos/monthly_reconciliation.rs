use nota_tecnica_reconciler::{
    AnalysisConfig, BandPosition, Classification, DiagnosisCatalog, ExecutionDocument, MonthKey,
    ReconciliationProcessor,
};
use serde_json::json;

fn main() {
    let plan = json!([
        { "CUP/CUM": "890201", "Descripción": "Consulta de primera vez por medicina general",
          "Frecuencia Mensual": "120", "Valor Unitario": "$ 35.000" },
        { "CUP/CUM": "903841", "Descripción": "Glucosa en suero",
          "Frecuencia Mensual": "40", "Valor Unitario": "8.500,00" },
        { "CUP/CUM": "890301", "Descripción": "Consulta de control por medicina especializada",
          "Frecuencia Mensual": "10", "Valor Unitario": "62.000" }
    ]);

    let consults = |count: usize, diagnosis: &str| -> Vec<serde_json::Value> {
        (0..count)
            .map(|_| json!({ "codConsulta": "890201", "codDiagnosticoPrincipal": diagnosis, "vrServicio": "35.000" }))
            .collect()
    };
    let labs = |count: usize| -> Vec<serde_json::Value> {
        (0..count)
            .map(|_| json!({ "codProcedimiento": "903841", "codDiagnosticoPrincipal": "E119" }))
            .collect()
    };

    let march = MonthKey::new(2024, 3).unwrap();
    let april = MonthKey::new(2024, 4).unwrap();
    let documents = vec![
        ExecutionDocument {
            name: "FE-0301.json".to_string(),
            month: march,
            content: json!({
                "usuarios": [{
                    "numDocumentoIdentificacion": "1001",
                    "servicios": { "consultas": consults(80, "J00X"), "procedimientos": labs(20) }
                }]
            }),
        },
        ExecutionDocument {
            name: "FE-0302.json".to_string(),
            month: march,
            content: json!({
                "usuarios": [{
                    "numDocumentoIdentificacion": "1002",
                    "servicios": {
                        "consultas": consults(60, "I10X"),
                        "procedimientos": labs(25),
                        "otrosServicios": [ { "codTecnologiaSalud": "S12001", "cantidadOS": "2" } ]
                    }
                }]
            }),
        },
        ExecutionDocument {
            name: "FE-0401.json".to_string(),
            month: april,
            content: json!({
                "usuarios": [{
                    "numDocumentoIdentificacion": "1001",
                    "servicios": { "consultas": consults(112, "J00X"), "procedimientos": labs(30) }
                }]
            }),
        },
    ];

    let diagnoses = DiagnosisCatalog::from_entries([
        ("J00X", "Rinofaringitis aguda"),
        ("I10X", "Hipertensión esencial"),
        ("E119", "Diabetes mellitus tipo 2 sin complicaciones"),
    ]);

    let report = ReconciliationProcessor::process_raw(
        &AnalysisConfig::default(),
        &plan,
        &documents,
        Some(&diagnoses),
    )
    .expect("reconciliation should succeed");

    for month in report.reconciliations.values() {
        println!("{}", month.summary());
        for classification in Classification::ALL {
            for entry in month.buckets.bucket(classification) {
                println!(
                    "  [{}] {} {} - esperado {:.0}, ejecutado {:.0}, desviación ${:.2}{}",
                    classification,
                    entry.code,
                    entry.description,
                    entry.expected_frequency,
                    entry.executed_frequency,
                    entry.deviation_value,
                    entry
                        .diagnosis_description
                        .as_deref()
                        .map(|d| format!(" ({})", d))
                        .unwrap_or_default()
                );
            }
        }

        let position = report.projection.band_position(month.totals.executed_value);
        let verdict = match position {
            BandPosition::Below => "por debajo de la banda",
            BandPosition::Within => "dentro de la banda",
            BandPosition::Above => "por encima de la banda",
        };
        println!("  Valor ejecutado ${:.2}: {}", month.totals.executed_value, verdict);
    }

    println!("\nProyección financiera:");
    println!(
        "  Mensual ${:.2} (banda ${:.2} - ${:.2})",
        report.projection.monthly_total,
        report.projection.monthly_lower,
        report.projection.monthly_upper
    );
    println!(
        "  Anual ${:.2} (mín ${:.2}, máx ${:.2})",
        report.projection.annual_total, report.projection.annual_min, report.projection.annual_max
    );

    println!("\nMatriz de detalle:");
    for row in &report.matrix {
        println!(
            "  {} {:<8} {:>8} {:>16}",
            row.month, row.code, row.percentage, row.classification
        );
    }

    if !report.issues.is_empty() {
        println!("\n{} problemas de datos encontrados", report.issues.len());
    }
}
