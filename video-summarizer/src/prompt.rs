//! Analysis prompt composition.

use std::fmt;

use video_summarizer_common::error::Error;

/// Instruction placed before the user's query.
pub const PROMPT_PREAMBLE: &str = "You are a Video analyser agent.\n\
Analyze the uploaded video for content and context.\n\
Respond to the following query using video insights and supplementary web research.";

/// Instruction placed after the user's query.
pub const PROMPT_CLOSING: &str = "provide a detailed, user-friendly and actionable response.";

/// The prompt sent to the agent for one request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPrompt(String);

impl AnalysisPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AnalysisPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AnalysisPrompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reject queries that are empty or whitespace only.
///
/// # Errors
/// Returns `Error::Validation`.
pub fn validate_query(query: &str) -> Result<(), Error> {
    if query.trim().is_empty() {
        return Err(Error::validation("Query cannot be empty"));
    }
    Ok(())
}

/// Build the analysis prompt. The query is embedded exactly as typed.
pub fn compose_analysis_prompt(query: &str) -> AnalysisPrompt {
    AnalysisPrompt(format!("{PROMPT_PREAMBLE}\n\n{query}\n\n{PROMPT_CLOSING}\n"))
}
