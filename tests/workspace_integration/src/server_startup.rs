//! Server startup integration tests.
//!
//! The server can be instantiated from configuration and advertises its
//! tools and resources.

#[cfg(test)]
mod tests {
    use crate::{test_config, test_server};
    use rmcp::ServerHandler;
    use video_summarizer::server::tool_definitions;

    #[test]
    fn test_server_startup() {
        let server = test_server();
        let info = server.get_info();

        let instructions = info.instructions.as_ref().unwrap().to_lowercase();
        assert!(instructions.contains("video"), "Server instructions should mention 'video'");
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_some());
    }

    #[test]
    fn test_registered_tools() {
        let names: Vec<String> = tool_definitions()
            .iter()
            .map(|tool| tool.name.to_string())
            .collect();
        assert_eq!(names, vec!["video_upload", "video_analyze", "video_session_status"]);
    }

    #[test]
    fn test_sessions_start_idle_and_independent() {
        let server = test_server();
        let other = server.new_session();

        assert_eq!(server.session().view().status, "idle");
        assert_eq!(other.session().view().status, "idle");
        assert_ne!(server.session().id(), other.session().id());
    }

    #[test]
    fn test_config_redacts_key() {
        let debug = format!("{:?}", test_config());
        assert!(!debug.contains("test-key"));
        assert!(debug.contains("gemini-2.0-flash-exp"));
    }
}
