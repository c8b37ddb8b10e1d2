//! Tool schema validity tests.
//!
//! Every registered tool has a name, a description and an object input
//! schema listing its parameters.

use serde_json::Value;

/// Validates that a JSON schema has the required structure.
fn validate_json_schema(schema: &Value) -> Result<(), String> {
    let obj = schema
        .as_object()
        .ok_or_else(|| "Schema must be an object".to_string())?;

    if let Some(type_val) = obj.get("type") {
        if type_val != "object" {
            return Err(format!("Expected type 'object', got {:?}", type_val));
        }
    }

    if let Some(properties) = obj.get("properties") {
        if !properties.is_object() {
            return Err("Properties must be an object".to_string());
        }
    }

    Ok(())
}

/// Validates that a tool has required fields.
fn validate_tool(tool: &rmcp::model::Tool) -> Result<(), String> {
    if tool.name.is_empty() {
        return Err("Tool name cannot be empty".to_string());
    }

    if tool.description.as_ref().is_none_or(|d| d.is_empty()) {
        return Err(format!("Tool '{}' must have a description", tool.name));
    }

    if tool.input_schema.is_empty() {
        return Err(format!("Tool '{}' must have an input schema", tool.name));
    }

    let schema_value = serde_json::to_value(&*tool.input_schema)
        .map_err(|e| format!("Failed to serialize schema: {}", e))?;
    validate_json_schema(&schema_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::schema_for;
    use video_summarizer::server::{VideoAnalyzeToolParams, VideoUploadToolParams, tool_definitions};

    #[test]
    fn test_json_schema_validation() {
        let valid_schema = serde_json::json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        });
        assert!(validate_json_schema(&valid_schema).is_ok());

        let invalid_schema = serde_json::json!({ "type": "string" });
        assert!(validate_json_schema(&invalid_schema).is_err());
    }

    #[test]
    fn test_all_registered_tools_are_valid() {
        for tool in tool_definitions() {
            let result = validate_tool(&tool);
            assert!(result.is_ok(), "{:?}", result.err());
        }
    }

    #[test]
    fn test_analyze_params_require_query() {
        let schema = serde_json::to_value(schema_for!(VideoAnalyzeToolParams)).unwrap();
        assert!(validate_json_schema(&schema).is_ok());

        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, vec!["query"]);
    }

    #[test]
    fn test_upload_params_are_all_optional() {
        let schema = serde_json::to_value(schema_for!(VideoUploadToolParams)).unwrap();
        let properties = schema["properties"].as_object().unwrap();

        for key in ["video_path", "video_base64", "file_name"] {
            assert!(properties.contains_key(key), "Schema should have '{}'", key);
        }
        let required = schema.get("required").and_then(Value::as_array);
        assert!(required.is_none_or(|r| r.is_empty()));
    }
}

#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;
    use video_summarizer::server::tool_definitions;

    proptest! {
        /// Tool lookup by name is exact: no registered tool matches a name
        /// that differs from it.
        #[test]
        fn unknown_names_match_no_tool(name in "[a-z_]{1,30}") {
            let tools = tool_definitions();
            let matches = tools.iter().filter(|t| t.name == name.as_str()).count();
            let known = ["video_upload", "video_analyze", "video_session_status"].contains(&name.as_str());
            prop_assert_eq!(matches, usize::from(known));
        }
    }

    #[test]
    fn tool_names_follow_naming_convention() {
        for tool in tool_definitions() {
            assert!(tool.name.starts_with("video_"));
            assert!(tool.name.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
