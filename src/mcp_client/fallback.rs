//! Local handlers for the fallback tool set.
//!
//! Used by `McpClient::call_tool` when the tool server is unreachable. A
//! handler only produces a value when its required argument is present.

use serde_json::Value;

/// Run a fallback tool locally.
///
/// Returns `None` when no handler applies to `tool_name` with these arguments.
pub fn invoke_local(tool_name: &str, arguments: &serde_json::Map<String, Value>) -> Option<Value> {
    match tool_name {
        "echo" => arguments.get("message").cloned(),
        "get_current_time" | "current_time" => Some(Value::String(current_time())),
        "calculate_expression" | "calculate" => arguments
            .get("expression")
            .map(|expr| Value::String(calculate(&argument_text(expr)))),
        _ => None,
    }
}

/// Whether `tool_name` has a local handler, whatever its arguments.
pub fn has_local_handler(tool_name: &str) -> bool {
    matches!(
        tool_name,
        "echo" | "get_current_time" | "current_time" | "calculate_expression" | "calculate"
    )
}

/// Local time as ISO 8601.
fn current_time() -> String {
    chrono::Local::now().to_rfc3339()
}

fn calculate(expression: &str) -> String {
    match evalexpr::eval(expression) {
        Ok(value) => value.to_string(),
        Err(e) => format!("Calculation error: {e}"),
    }
}

fn argument_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: serde_json::Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_echo() {
        let out = invoke_local("echo", &args(serde_json::json!({"message": "hello"})));
        assert_eq!(out, Some(Value::String("hello".into())));
    }

    #[test]
    fn test_echo_without_message_has_no_handler() {
        assert_eq!(invoke_local("echo", &serde_json::Map::new()), None);
        assert!(has_local_handler("echo"));
    }

    #[test]
    fn test_current_time_is_iso8601() {
        for name in ["get_current_time", "current_time"] {
            let out = invoke_local(name, &serde_json::Map::new()).unwrap();
            let text = out.as_str().unwrap();
            assert!(chrono::DateTime::parse_from_rfc3339(text).is_ok(), "{text}");
        }
    }

    #[test]
    fn test_calculate() {
        let out = invoke_local(
            "calculate_expression",
            &args(serde_json::json!({"expression": "2 + 3 * 4"})),
        );
        assert_eq!(out, Some(Value::String("14".into())));

        let alias = invoke_local("calculate", &args(serde_json::json!({"expression": "10 - 4"})));
        assert_eq!(alias, Some(Value::String("6".into())));
    }

    #[test]
    fn test_calculate_error_is_a_result() {
        let out = invoke_local(
            "calculate_expression",
            &args(serde_json::json!({"expression": "2 +"})),
        )
        .unwrap();
        assert!(out.as_str().unwrap().starts_with("Calculation error:"));
    }

    #[test]
    fn test_unknown_tool_has_no_handler() {
        assert!(!has_local_handler("weather_info"));
        assert_eq!(invoke_local("weather_info", &serde_json::Map::new()), None);
    }
}
