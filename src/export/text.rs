use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::AnalysisReport;
use crate::models::DmaxPoint;

const NOT_DETERMINED: &str = "not determined";

#[derive(Tabled)]
struct MeasurementRow {
    #[tabled(rename = "Load")]
    load: String,
    #[tabled(rename = "Lactate (mmol/L)")]
    lactate: String,
    #[tabled(rename = "Fitted")]
    fitted: String,
}

#[derive(Tabled)]
struct ThresholdRow {
    #[tabled(rename = "Method")]
    method: &'static str,
    #[tabled(rename = "Load")]
    load: String,
    #[tabled(rename = "Lactate (mmol/L)")]
    lactate: String,
}

fn format_optional(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| NOT_DETERMINED.to_string(), |v| format!("{:.*}", precision, v))
}

fn dmax_row(method: &'static str, point: Option<DmaxPoint>) -> ThresholdRow {
    ThresholdRow {
        method,
        load: format_optional(point.map(|p| p.load), 1),
        lactate: format_optional(point.map(|p| p.lactate), 2),
    }
}

/// Human-readable summary: measurements, model and thresholds
///
/// Plain text only, so the same string can go to a terminal or a file.
pub fn render_table(report: &AnalysisReport) -> String {
    let analysis = &report.analysis;
    let thresholds = &analysis.thresholds;

    let measurements: Vec<MeasurementRow> = analysis
        .dataset
        .samples()
        .iter()
        .map(|s| MeasurementRow {
            load: format!("{:.1}", s.load),
            lactate: format!("{:.2}", s.lactate),
            fitted: format!("{:.2}", analysis.model.evaluate(s.load)),
        })
        .collect();

    let target = thresholds
        .fixed_concentration_load
        .map(|load| analysis.model.evaluate(load));
    let threshold_rows = vec![
        ThresholdRow {
            method: "Fixed concentration",
            load: format_optional(thresholds.fixed_concentration_load, 1),
            lactate: format_optional(target, 2),
        },
        dmax_row("DMAX", thresholds.dmax),
        dmax_row("DMAX-MOD", thresholds.dmax_mod),
    ];

    let coefficients: Vec<String> = analysis
        .model
        .coefficients()
        .iter()
        .map(|c| format!("{:.6e}", c))
        .collect();

    let mut output = String::new();
    output.push_str(&format!("Lactate threshold analysis: {}\n", report.source));
    output.push_str(&format!(
        "Generated: {}\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output.push_str(&Table::new(measurements).with(Style::rounded()).to_string());
    output.push_str("\n\n");

    output.push_str(&format!("Model: {}\n", analysis.model));
    output.push_str(&format!("Coefficients: [{}]\n", coefficients.join(", ")));
    output.push_str(&format!(
        "R²: {}\n\n",
        analysis
            .r_squared
            .map_or_else(|| "not applicable".to_string(), |r2| format!("{:.4}", r2))
    ));

    output.push_str(&Table::new(threshold_rows).with(Style::rounded()).to_string());
    output
}
