use std::path::Path;

use super::model::{Cell, Column, HeaderValue, SummaryTable, ValueKind, FILE_COLUMN};
use crate::error::CollectionError;

/// Field written for a masked cell.
pub const MASKED_FIELD: &str = "--";

/// Prefix that keeps a string value from reading back as [`MASKED_FIELD`].
const ESCAPE: char = '\\';

// ---------------------------------------------------------------------------
// CSV writer
// ---------------------------------------------------------------------------

/// CSV layout: header row of `name:kind` fields (`file` and all-masked
/// columns carry no kind), then one row per file. Masked cells are written as
/// `--`; a present empty string stays empty. String values that are `--` or
/// start with a backslash get one extra leading backslash.
pub fn write_summary(table: &SummaryTable, path: &Path) -> Result<(), CollectionError> {
    let mut writer = csv::Writer::from_path(path)?;
    let header: Vec<String> = table
        .columns()
        .iter()
        .map(|col| match col.kind {
            Some(kind) if col.name != FILE_COLUMN => format!("{}:{kind}", col.name),
            _ => col.name.clone(),
        })
        .collect();
    writer.write_record(&header)?;
    for row in 0..table.len() {
        let record: Vec<String> = table
            .columns()
            .iter()
            .map(|col| match &col.cells[row] {
                Cell::Value(HeaderValue::String(s)) if needs_escape(s) => format!("{ESCAPE}{s}"),
                Cell::Value(v) => v.to_string(),
                Cell::Masked => MASKED_FIELD.to_string(),
            })
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn needs_escape(s: &str) -> bool {
    s == MASKED_FIELD || s.starts_with(ESCAPE)
}

/// Write a single-column list (one name per row) under `column_name`.
pub fn write_list(path: &Path, column_name: &str, names: &[String]) -> Result<(), CollectionError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([column_name])?;
    for name in names {
        writer.write_record([name])?;
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV reader
// ---------------------------------------------------------------------------

/// Read a summary table previously written by [`write_summary`].
///
/// Columns whose header names a kind are parsed as that kind. Columns without
/// one (hand-written files) have their kind inferred from the non-masked
/// cells, so a column mixing `1` and `R` is read as strings rather than failing.
pub fn read_summary(path: &Path, generation: u64) -> Result<SummaryTable, CollectionError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| CollectionError::SummaryFile {
        path: path.to_path_buf(),
        source,
    })?;
    let headers: Vec<(String, Option<ValueKind>)> =
        reader.headers()?.iter().map(split_header).collect();

    if !headers.iter().any(|(name, _)| name == FILE_COLUMN) {
        return Err(CollectionError::MalformedSummary(format!(
            "{} has no '{FILE_COLUMN}' column",
            path.display()
        )));
    }

    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        if record.len() != headers.len() {
            return Err(CollectionError::MalformedSummary(format!(
                "row {row_no} has {} fields, expected {}",
                record.len(),
                headers.len()
            )));
        }
        for (col_idx, field) in record.iter().enumerate() {
            let cell = (field != MASKED_FIELD).then(|| field.to_string());
            raw[col_idx].push(cell);
        }
    }

    let mut columns = Vec::with_capacity(headers.len());
    for ((name, declared), fields) in headers.into_iter().zip(raw) {
        let kind = match declared {
            _ if name == FILE_COLUMN => ValueKind::String,
            Some(kind) => kind,
            None => infer_kind(fields.iter().flatten().map(String::as_str)),
        };
        let mut column = Column::new(name);
        for (row_no, field) in fields.into_iter().enumerate() {
            let cell: Cell = match field {
                Some(f) => Cell::Value(parse_field(&f, kind, declared.is_some()).ok_or_else(|| {
                    CollectionError::MalformedSummary(format!(
                        "row {row_no} of column '{}': '{f}' is not a {kind}",
                        column.name
                    ))
                })?),
                None => Cell::Masked,
            };
            // Every cell was parsed as the column's kind.
            let _ = column.push(cell);
        }
        columns.push(column);
    }

    Ok(SummaryTable::from_columns(columns, generation))
}

/// `exptime:float` splits into name and kind; a name without a known kind
/// suffix is returned whole.
fn split_header(field: &str) -> (String, Option<ValueKind>) {
    if let Some((name, kind)) = field.rsplit_once(':') {
        if let Ok(kind) = kind.parse::<ValueKind>() {
            return (name.to_string(), Some(kind));
        }
    }
    (field.to_string(), None)
}

/// Narrowest kind that every field parses as.
fn infer_kind<'a>(mut fields: impl Iterator<Item = &'a str> + Clone) -> ValueKind {
    if fields.clone().next().is_none() {
        return ValueKind::String;
    }
    if fields.clone().all(|f| f.parse::<i64>().is_ok()) {
        ValueKind::Integer
    } else if fields.clone().all(|f| f.parse::<f64>().is_ok()) {
        ValueKind::Float
    } else if fields.all(|f| f == "true" || f == "false") {
        ValueKind::Bool
    } else {
        ValueKind::String
    }
}

/// Parse one field as `kind`. Escaped strings only occur in files whose
/// header declares the kind.
fn parse_field(s: &str, kind: ValueKind, declared: bool) -> Option<HeaderValue> {
    Some(match kind {
        ValueKind::Integer => HeaderValue::Integer(s.parse().ok()?),
        ValueKind::Float => HeaderValue::Float(s.parse().ok()?),
        ValueKind::Bool => match s {
            "true" => HeaderValue::Bool(true),
            "false" => HeaderValue::Bool(false),
            _ => return None,
        },
        ValueKind::String if declared => s.strip_prefix(ESCAPE).unwrap_or(s).into(),
        ValueKind::String => s.into(),
    })
}

/// Best guess at the type of a single free-standing value (command line
/// filters, object lists).
pub fn guess_value_type(s: &str) -> HeaderValue {
    if let Ok(i) = s.parse::<i64>() {
        return HeaderValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return HeaderValue::Float(f);
    }
    if s == "true" || s == "false" {
        return HeaderValue::Bool(s == "true");
    }
    HeaderValue::String(s.to_string())
}
