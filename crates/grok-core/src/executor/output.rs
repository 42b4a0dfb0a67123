//! Turning raw completions into step output values.

use serde_json::Value;

use crate::models::profile::{OutputFormat, OutputSchema, SchemaType};

/// Parse `raw` according to the step's output format and schema.
///
/// The error string describes why the output was rejected.
pub fn parse_output(
    raw: &str,
    format: OutputFormat,
    schema: Option<&OutputSchema>,
) -> Result<Value, String> {
    match format {
        OutputFormat::Text => Ok(Value::String(raw.trim().to_string())),
        OutputFormat::Json => {
            let body = strip_code_fence(raw);
            let value: Value = serde_json::from_str(body)
                .map_err(|e| format!("response is not valid JSON ({})", e))?;
            if let Some(schema) = schema {
                check_schema(&value, schema)?;
            }
            Ok(value)
        }
    }
}

/// Unwrap a Markdown code fence (```json ... ```) around the whole response.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

fn check_schema(value: &Value, schema: &OutputSchema) -> Result<(), String> {
    match schema.schema_type {
        SchemaType::Object => {
            let Some(object) = value.as_object() else {
                return Err(format!("expected a JSON object, got {}", type_name(value)));
            };
            let missing: Vec<&str> = schema
                .required_fields
                .iter()
                .filter(|f| !object.contains_key(f.as_str()))
                .map(String::as_str)
                .collect();
            if missing.is_empty() {
                Ok(())
            } else {
                Err(format!("missing required fields: {}", missing.join(", ")))
            }
        }
        SchemaType::Array if !value.is_array() => {
            Err(format!("expected a JSON array, got {}", type_name(value)))
        }
        SchemaType::String if !value.is_string() => {
            Err(format!("expected a JSON string, got {}", type_name(value)))
        }
        _ => Ok(()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_output_trimmed() {
        assert_eq!(
            parse_output("  hello\n", OutputFormat::Text, None).unwrap(),
            json!("hello")
        );
    }

    #[test]
    fn test_json_output_and_fences() {
        assert_eq!(
            parse_output("{\"a\": 1}", OutputFormat::Json, None).unwrap(),
            json!({"a": 1})
        );
        assert_eq!(
            parse_output("```json\n{\"a\": [1, 2]}\n```", OutputFormat::Json, None).unwrap(),
            json!({"a": [1, 2]})
        );
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
    }

    #[test]
    fn test_non_json_rejected() {
        let err = parse_output("Sure! Here are the entities.", OutputFormat::Json, None).unwrap_err();
        assert!(err.contains("not valid JSON"));
    }

    #[test]
    fn test_schema_checks() {
        let schema = OutputSchema {
            schema_type: SchemaType::Object,
            required_fields: vec!["people".to_string(), "dates".to_string()],
        };
        let err = parse_output("{\"people\": []}", OutputFormat::Json, Some(&schema)).unwrap_err();
        assert_eq!(err, "missing required fields: dates");

        let array = OutputSchema {
            schema_type: SchemaType::Array,
            required_fields: vec![],
        };
        assert!(parse_output("[1]", OutputFormat::Json, Some(&array)).is_ok());
        assert!(parse_output("{}", OutputFormat::Json, Some(&array)).is_err());
    }
}
