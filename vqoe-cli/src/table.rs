//! JSON Lines row tables.
//!
//! Each input line is a JSON object carrying at least `latency_list` and
//! optionally `miss_indices` plus per-row overrides (`bandwidth`,
//! `buffer_size`, `miss_latency`, `abr`). Every input column is copied to the
//! output row, followed by the QoE fields and the `sabre_*` provenance echo.

use std::path::Path;

use anyhow::{Context, bail};
use serde_json::{Map, Value};
use vqoe_core::{QoeResult, RunSettings, SettingsOverrides, TraceInput};

/// One parsed input line.
#[derive(Debug, Clone)]
pub struct TableRow {
    /// Original columns, passed through unchanged
    pub columns: Map<String, Value>,
    /// Trace columns, or why they could not be read
    pub trace: Result<TraceInput, String>,
    /// Settings after applying this row's overrides
    pub settings: RunSettings,
}

/// Reads a JSON Lines table, applying each row's overrides to `base`.
///
/// Blank lines are skipped. A line that is not a JSON object, or whose
/// override columns have the wrong type, fails the whole table. Unreadable
/// trace columns only mark that row.
///
/// # Errors
///
/// - `anyhow::Error` - File cannot be read
/// - `anyhow::Error` - A line is not a JSON object or has ill-typed override columns
pub async fn read_rows(path: &Path, base: &RunSettings) -> anyhow::Result<Vec<TableRow>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let mut rows = Vec::new();
    for (line_index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = line_index + 1;
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("{}:{line_no}: invalid JSON", path.display()))?;
        let Value::Object(columns) = value else {
            bail!("{}:{line_no}: expected a JSON object", path.display());
        };
        rows.push(
            parse_row(columns, base)
                .with_context(|| format!("{}:{line_no}: invalid override", path.display()))?,
        );
    }
    Ok(rows)
}

/// Splits a row object into trace, settings and passthrough columns.
///
/// # Errors
///
/// - `serde_json::Error` - Override columns present but ill-typed
pub fn parse_row(columns: Map<String, Value>, base: &RunSettings) -> anyhow::Result<TableRow> {
    let overrides: SettingsOverrides = serde_json::from_value(Value::Object(columns.clone()))?;
    let trace = serde_json::from_value::<TraceInput>(Value::Object(columns.clone()))
        .map_err(|e| format!("unreadable trace columns: {e}"));

    Ok(TableRow {
        columns,
        trace,
        settings: base.with_overrides(&overrides),
    })
}

/// Builds the output object for one row.
pub fn output_row(
    mut columns: Map<String, Value>,
    result: &QoeResult,
    settings: &RunSettings,
) -> Map<String, Value> {
    if let Ok(Value::Object(fields)) = serde_json::to_value(result) {
        columns.extend(fields);
    }
    columns.insert("sabre_bandwidth".to_string(), json_number(settings.bandwidth));
    columns.insert(
        "sabre_buffer".to_string(),
        json_number(Some(settings.buffer_size)),
    );
    columns.insert("sabre_abr".to_string(), Value::String(settings.abr.clone()));
    columns.insert(
        "sabre_miss_latency".to_string(),
        json_number(settings.miss_latency),
    );
    columns
}

fn json_number(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

/// Writes rows as JSON Lines.
///
/// # Errors
///
/// - `anyhow::Error` - Serialization or file write failure
pub async fn write_rows(path: &Path, rows: &[Map<String, Value>]) -> anyhow::Result<()> {
    let mut output = String::new();
    for row in rows {
        output.push_str(&serde_json::to_string(row)?);
        output.push('\n');
    }
    tokio::fs::write(path, output)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_parse_row_with_overrides() {
        let base = RunSettings::default();
        let row = parse_row(
            object(json!({
                "site": "edge-3",
                "latency_list": [25, 625, 700],
                "miss_indices": [1],
                "abr": "bola",
                "buffer_size": 10
            })),
            &base,
        )
        .unwrap();

        let trace = row.trace.unwrap();
        assert_eq!(trace.latency_list, vec![25.0, 625.0, 700.0]);
        assert_eq!(trace.miss_indices, vec![1]);
        assert_eq!(row.settings.abr, "bola");
        assert_eq!(row.settings.buffer_size, 10.0);
        assert_eq!(row.settings.bandwidth, base.bandwidth);
        assert_eq!(row.columns["site"], json!("edge-3"));
    }

    #[test]
    fn test_missing_latency_list_marks_row_only() {
        let row = parse_row(object(json!({"site": "edge-1"})), &RunSettings::default()).unwrap();
        assert!(row.trace.is_err());
    }

    #[test]
    fn test_ill_typed_override_is_rejected() {
        let result = parse_row(
            object(json!({"latency_list": [1.0], "bandwidth": "fast"})),
            &RunSettings::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_output_row_echoes_settings() {
        let settings = RunSettings {
            miss_latency: Some(62.0),
            ..Default::default()
        };
        let row = output_row(
            object(json!({"site": "edge-2"})),
            &QoeResult::from_error("boom"),
            &settings,
        );

        assert_eq!(row["site"], json!("edge-2"));
        assert_eq!(row["error"], json!("boom"));
        assert_eq!(row["average_bitrate"], Value::Null);
        assert_eq!(row["sabre_bandwidth"], json!(25.0));
        assert_eq!(row["sabre_buffer"], json!(30.0));
        assert_eq!(row["sabre_abr"], json!("dynamic"));
        assert_eq!(row["sabre_miss_latency"], json!(62.0));
    }

    #[tokio::test]
    async fn test_table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rows.jsonl");
        tokio::fs::write(
            &input,
            "{\"latency_list\": [10, 20], \"id\": 1}\n\n{\"latency_list\": [30, 40], \"id\": 2}\n",
        )
        .await
        .unwrap();

        let rows = read_rows(&input, &RunSettings::default()).await.unwrap();
        assert_eq!(rows.len(), 2);

        let output = dir.path().join("out.jsonl");
        let objects = rows
            .into_iter()
            .map(|row| output_row(row.columns, &QoeResult::default(), &row.settings))
            .collect::<Vec<_>>();
        write_rows(&output, &objects).await.unwrap();

        let written = tokio::fs::read_to_string(&output).await.unwrap();
        let ids = written
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap()["id"].clone())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_non_object_line_fails_table() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rows.jsonl");
        tokio::fs::write(&input, "[1, 2, 3]\n").await.unwrap();

        let error = read_rows(&input, &RunSettings::default()).await.unwrap_err();
        assert!(error.to_string().contains(":1: expected a JSON object"));
    }
}
