//! MCP Resources for the video summarizer server.
//!
//! - `summarizer://formats` - accepted video formats and upload limits

use crate::upload::{ACCEPTED_FORMATS, MAX_UPLOAD_BYTES_HINT, TEMP_FILE_SUFFIX};
use serde::{Deserialize, Serialize};

pub const FORMATS_URI: &str = "summarizer://formats";

/// Accepted format entry for the resource.
#[derive(Debug, Serialize, Deserialize)]
pub struct FormatEntry {
    /// File extension without the dot (e.g., "mp4")
    pub extension: String,
    /// MIME type sent to the Files API
    pub mime_type: String,
}

/// Body of the formats resource.
#[derive(Debug, Serialize, Deserialize)]
pub struct FormatsResource {
    pub formats: Vec<FormatEntry>,
    /// Advisory limit; larger uploads are accepted with a warning
    pub max_upload_bytes_hint: usize,
    pub temp_file_suffix: String,
}

/// Get the formats resource as JSON.
pub fn formats_resource_json() -> String {
    let resource = FormatsResource {
        formats: ACCEPTED_FORMATS
            .iter()
            .map(|format| FormatEntry {
                extension: format.extension().to_string(),
                mime_type: format.mime_type().to_string(),
            })
            .collect(),
        max_upload_bytes_hint: MAX_UPLOAD_BYTES_HINT,
        temp_file_suffix: TEMP_FILE_SUFFIX.to_string(),
    };

    serde_json::to_string_pretty(&resource).unwrap_or_else(|_| "{}".to_string())
}
