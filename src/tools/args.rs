// ABOUTME: Typed extraction of tool arguments emitted by the model
// ABOUTME: Required strings, clamped limits and YYYY-MM-DD date windows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::NaiveDate;
use serde_json::Value;
use syntia_core::errors::{AppError, AppResult};

use crate::database::crm::DateRange;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Non-empty string argument
///
/// # Errors
///
/// Returns `MissingRequiredField` if the argument is absent, not a string, or blank
pub fn required_str<'a>(args: &'a Value, key: &str) -> AppResult<&'a str> {
    optional_str(args, key)
        .ok_or_else(|| AppError::missing_field(format!("Falta el parametro requerido: {key}")))
}

/// String argument, `None` when absent or blank
#[must_use]
pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Positive integer argument clamped to `1..=max`, `default` when absent
///
/// Models sometimes send numbers as floats or strings; both are accepted.
#[must_use]
pub fn limit(args: &Value, key: &str, default: i32, max: i32) -> i32 {
    let requested = match args.get(key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    requested.map_or(default, |value| {
        i32::try_from(value.clamp(1, i64::from(max))).unwrap_or(default)
    })
}

/// Optional `YYYY-MM-DD` argument
///
/// # Errors
///
/// Returns `InvalidInput` if the value is present but not a valid date
pub fn optional_date(args: &Value, key: &str) -> AppResult<Option<NaiveDate>> {
    optional_str(args, key)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
                AppError::invalid_input(format!(
                    "Fecha invalida en {key}: '{raw}'. Usa el formato YYYY-MM-DD"
                ))
            })
        })
        .transpose()
}

/// `fecha_inicio` / `fecha_fin` window
///
/// # Errors
///
/// Returns `InvalidInput` if either bound is malformed
pub fn date_range(args: &Value) -> AppResult<DateRange> {
    Ok(DateRange {
        start: optional_date(args, "fecha_inicio")?,
        end: optional_date(args, "fecha_fin")?,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use syntia_core::errors::ErrorCode;

    use super::*;

    #[test]
    fn test_required_str_rejects_blank() {
        let args = json!({"query": "  ", "nombre": "Garcia"});
        assert_eq!(
            required_str(&args, "query").unwrap_err().code,
            ErrorCode::MissingRequiredField
        );
        assert_eq!(required_str(&args, "nombre").unwrap(), "Garcia");
    }

    #[test]
    fn test_limit_defaults_and_clamps() {
        assert_eq!(limit(&json!({}), "limite", 30, 100), 30);
        assert_eq!(limit(&json!({"limite": 500}), "limite", 30, 100), 100);
        assert_eq!(limit(&json!({"limite": 0}), "limite", 30, 100), 1);
        assert_eq!(limit(&json!({"limite": 12.0}), "limite", 30, 100), 12);
        assert_eq!(limit(&json!({"limite": "15"}), "limite", 30, 100), 15);
        assert_eq!(limit(&json!({"limite": "muchos"}), "limite", 30, 100), 30);
    }

    #[test]
    fn test_date_range_parsing() {
        let range = date_range(&json!({"fecha_inicio": "2025-01-31"})).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2025, 1, 31));
        assert_eq!(range.end, None);

        let err = date_range(&json!({"fecha_fin": "31/01/2025"})).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(err.message.contains("fecha_fin"));
    }
}
