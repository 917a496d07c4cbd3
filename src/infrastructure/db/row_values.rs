//! Decode sqlx MySQL rows into `serde_json::Value`s.
//!
//! The migrator's SELECT already funnels non-numeric columns through
//! `CONVERT(… USING utf8mb4)` or `HEX(…)`, so everything arriving here is
//! either a native numeric type or a string.

use serde_json::{json, Value};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo};

use crate::domain::ports::RowValues;

/// Convert a full row, preserving column order.
pub fn decode_row(row: &MySqlRow) -> Result<RowValues, sqlx::Error> {
    let mut values = Vec::with_capacity(row.columns().len());
    for col in row.columns() {
        values.push(decode_column(row, col.ordinal(), col.type_info().name())?);
    }
    Ok(values)
}

fn decode_column(row: &MySqlRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let v = match type_name.to_uppercase().as_str() {
        // TINYINT(1) surfaces as BOOLEAN through the driver.
        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(idx)?
            .map_or(Value::Null, Value::Bool),

        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<Option<i64>, _>(idx)?
            .map_or(Value::Null, |v| json!(v)),

        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "YEAR" => row
            .try_get::<Option<u64>, _>(idx)?
            .map_or(Value::Null, |v| json!(v)),

        "FLOAT" => row
            .try_get::<Option<f32>, _>(idx)?
            .map_or(Value::Null, |v| json!(v as f64)),

        "DOUBLE" => row
            .try_get::<Option<f64>, _>(idx)?
            .map_or(Value::Null, |v| json!(v)),

        // Raw byte columns can still appear outside the migrator's typed
        // SELECT; recover what is recoverable as UTF-8.
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "VARBINARY" | "BINARY" => row
            .try_get::<Option<Vec<u8>>, _>(idx)?
            .map_or(Value::Null, |b| {
                Value::String(String::from_utf8_lossy(&b).into_owned())
            }),

        // Everything else: VARCHAR, CHAR, TEXT, DECIMAL-as-text, dates…
        _ => row
            .try_get::<Option<String>, _>(idx)?
            .map_or(Value::Null, Value::String),
    };
    Ok(v)
}
