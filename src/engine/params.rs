//! `key=value` parameter strings used on the command line.

use serde_json::{Map, Value};

/// Parse `"columns=A,B method=mean threshold=1.5"` into a JSON object.
///
/// Values containing a comma become string lists, `true`/`false` become
/// booleans, and numbers are recognised (a `.` marks a float). Tokens
/// without `=` are ignored.
pub fn parse_param_string(input: &str) -> Value {
    let mut params = Map::new();

    for pair in input.split_whitespace() {
        let Some((key, raw)) = pair.split_once('=') else {
            continue;
        };
        params.insert(key.to_string(), parse_value(raw));
    }

    Value::Object(params)
}

fn parse_value(raw: &str) -> Value {
    if raw.contains(',') {
        return Value::Array(raw.split(',').map(|s| Value::String(s.to_string())).collect());
    }

    match raw.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if raw.contains('.') {
        if let Some(number) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(number);
        }
    } else if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }

    Value::String(raw.to_string())
}
