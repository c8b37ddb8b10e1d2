//! Output format tests.
//!
//! Successful tool calls return non-empty text content; session tools return
//! the session view as JSON.

use rmcp::model::{CallToolResult, Content, RawContent};

/// Validates that a CallToolResult has valid content format.
fn validate_tool_result(result: &CallToolResult) -> Result<(), String> {
    if result.content.is_empty() && !result.is_error.unwrap_or(false) {
        return Err("Successful result should have content".to_string());
    }

    for content in &result.content {
        validate_content(content)?;
    }

    Ok(())
}

fn validate_content(content: &Content) -> Result<(), String> {
    match &content.raw {
        RawContent::Text(text_content) if text_content.text.is_empty() => {
            Err("Text content should not be empty".to_string())
        }
        RawContent::Text(_) => Ok(()),
        _ => Err("Session tools only return text content".to_string()),
    }
}

/// Parse the last text item of a result as JSON.
fn last_json(result: &CallToolResult) -> serde_json::Value {
    let text = result
        .content
        .iter()
        .rev()
        .find_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.clone()),
            _ => None,
        })
        .unwrap_or_default();
    serde_json::from_str(&text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    use video_summarizer::resources::{FormatsResource, formats_resource_json};
    use video_summarizer::server::VideoUploadToolParams;

    #[test]
    fn test_empty_text_rejected() {
        let result = CallToolResult::success(vec![Content::text("")]);
        assert!(validate_tool_result(&result).is_err());
    }

    #[tokio::test]
    async fn test_status_output_is_session_json() {
        let server = test_server();
        let result = server.session_status().await.unwrap();

        assert!(validate_tool_result(&result).is_ok());
        let view = last_json(&result);
        assert_eq!(view["status"], "idle");
        assert_eq!(view["banner"]["level"], "info");
        assert_eq!(view["banner"]["message"], "Upload a video file to begin analysis.");
        assert_eq!(view["session_id"], server.session().id());
    }

    #[tokio::test]
    async fn test_upload_output_reports_loaded_video() {
        let server = test_server();
        let result = server
            .upload_video(VideoUploadToolParams {
                video_base64: Some(BASE64.encode(b"0123456789")),
                file_name: Some("trip.mov".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(validate_tool_result(&result).is_ok());
        let view = last_json(&result);
        assert_eq!(view["status"], "file_loaded");
        assert_eq!(view["video"]["file_name"], "trip.mov");
        assert_eq!(view["video"]["bytes"], 10);
        assert!(view.get("banner").is_none());
    }

    #[test]
    fn test_formats_resource_is_json() {
        let parsed: FormatsResource = serde_json::from_str(&formats_resource_json()).unwrap();
        assert_eq!(parsed.formats.len(), 3);
        assert!(parsed.formats.iter().all(|f| f.mime_type.starts_with("video/")));
    }
}
