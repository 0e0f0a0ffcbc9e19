//! Minimal JSON-schema checker covering the keywords the tool catalog uses.
//!
//! Supported: `type` (string or list), `required`, `properties`,
//! `additionalProperties: false`, `enum`, `minLength`/`maxLength`,
//! `pattern`, `minimum`/`maximum`, `items`. Unknown keywords are ignored.

use regex::Regex;
use serde_json::Value;

/// One schema violation, located by a `$`-rooted path such as `$.items[2].id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validate `instance` against `schema`, returning every violation found.
pub fn validate(schema: &Value, instance: &Value) -> Vec<Violation> {
    let mut out = Vec::new();
    check(schema, instance, "$", &mut out);
    out
}

pub fn is_valid(schema: &Value, instance: &Value) -> bool {
    validate(schema, instance).is_empty()
}

fn check(schema: &Value, instance: &Value, path: &str, out: &mut Vec<Violation>) {
    let Some(schema) = schema.as_object() else {
        return;
    };
    let mut push = |message: String| {
        out.push(Violation { path: path.to_string(), message });
    };

    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(s) => vec![s.as_str()],
            Value::Array(list) => list.iter().filter_map(|v| v.as_str()).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| type_matches(t, instance)) {
            push(format!(
                "expected {}, got {}",
                allowed.join(" or "),
                type_name(instance)
            ));
            // Further keywords assume the right type.
            return;
        }
    }

    if let Some(Value::Array(options)) = schema.get("enum")
        && !options.contains(instance)
    {
        let rendered: Vec<String> = options.iter().map(|o| o.to_string()).collect();
        push(format!("value {instance} is not one of [{}]", rendered.join(", ")));
    }

    match instance {
        Value::String(s) => {
            let len = s.chars().count() as u64;
            if let Some(min) = schema.get("minLength").and_then(|v| v.as_u64())
                && len < min
            {
                push(format!("string is shorter than {min} characters"));
            }
            if let Some(max) = schema.get("maxLength").and_then(|v| v.as_u64())
                && len > max
            {
                push(format!("string is longer than {max} characters"));
            }
            if let Some(pattern) = schema.get("pattern").and_then(|v| v.as_str()) {
                match Regex::new(pattern) {
                    Ok(re) if !re.is_match(s) => {
                        push(format!("string does not match pattern '{pattern}'"))
                    }
                    Ok(_) => {}
                    Err(e) => push(format!("invalid pattern '{pattern}': {e}")),
                }
            }
        }
        Value::Number(n) => {
            if let Some(value) = n.as_f64() {
                if let Some(min) = schema.get("minimum").and_then(|v| v.as_f64())
                    && value < min
                {
                    push(format!("{n} is less than the minimum of {min}"));
                }
                if let Some(max) = schema.get("maximum").and_then(|v| v.as_f64())
                    && value > max
                {
                    push(format!("{n} is greater than the maximum of {max}"));
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check(item_schema, item, &format!("{path}[{i}]"), out);
                }
            }
        }
        Value::Object(map) => {
            if let Some(Value::Array(required)) = schema.get("required") {
                for key in required.iter().filter_map(|k| k.as_str()) {
                    if !map.contains_key(key) {
                        out.push(Violation {
                            path: path.to_string(),
                            message: format!("missing required property '{key}'"),
                        });
                    }
                }
            }
            let properties = schema.get("properties").and_then(|p| p.as_object());
            let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));
            for (key, value) in map {
                let child = format!("{path}.{key}");
                match properties.and_then(|p| p.get(key)) {
                    Some(prop_schema) => check(prop_schema, value, &child, out),
                    None if closed => out.push(Violation {
                        path: child,
                        message: "additional property is not allowed".to_string(),
                    }),
                    None => {}
                }
            }
        }
        _ => {}
    }
}

fn type_matches(expected: &str, instance: &Value) -> bool {
    match expected {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        "number" => instance.is_number(),
        // Integral floats such as `5.0` do not count.
        "integer" => matches!(instance, Value::Number(n) if n.is_i64() || n.is_u64()),
        _ => true,
    }
}

fn type_name(instance: &Value) -> &'static str {
    match instance {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
