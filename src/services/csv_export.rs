// src/services/csv_export.rs
use crate::models::DetectedObject;
use chrono::{DateTime, Local};

const HEADER: [&str; 7] = [
    "name",
    "type",
    "environmental_impact",
    "sustainability_score",
    "confidence",
    "description",
    "recommended_action",
];

pub fn export_filename(at: DateTime<Local>) -> String {
    format!("ecovision_analysis_{}.csv", at.format("%Y%m%d_%H%M%S"))
}

/// Renders the detected-objects table. Objects without a usable name are
/// skipped; `None` when no rows remain.
pub fn objects_to_csv(objects: &[DetectedObject]) -> Option<String> {
    let rows: Vec<[String; 7]> = objects
        .iter()
        .filter(|o| o.name.as_deref().is_some_and(|n| !n.trim().is_empty()))
        .map(|o| {
            [
                o.name.clone().unwrap_or_default(),
                o.kind.clone().unwrap_or_default(),
                o.environmental_impact.clone().unwrap_or_default(),
                o.sustainability_score.map(|s| s.to_string()).unwrap_or_default(),
                o.confidence.map(|c| c.to_string()).unwrap_or_default(),
                o.description.clone().unwrap_or_default(),
                o.recommended_action.clone().unwrap_or_default(),
            ]
        })
        .collect();

    if rows.is_empty() {
        return None;
    }

    let mut out = String::new();
    push_record(&mut out, HEADER.iter().copied());
    for row in &rows {
        push_record(&mut out, row.iter().map(String::as_str));
    }
    Some(out)
}

fn push_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let line: Vec<String> = fields.map(quote).collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
