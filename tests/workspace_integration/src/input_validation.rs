//! Input parameter validation tests.
//!
//! Invalid tool input yields an MCP `invalid_params` error, and rejected
//! input never reaches the file processing service or the agent.

#[cfg(test)]
mod tests {
    use crate::test_server;
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    use rmcp::model::ErrorCode;
    use video_summarizer::server::{VideoAnalyzeToolParams, VideoUploadToolParams};

    fn base64_upload(file_name: &str) -> VideoUploadToolParams {
        VideoUploadToolParams {
            video_base64: Some(BASE64.encode(b"video")),
            file_name: Some(file_name.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_unsupported_format_rejected() {
        let server = test_server();
        let err = server.upload_video(base64_upload("clip.webm")).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("mp4, mov, avi"));
        assert_eq!(server.session().view().status, "idle");
    }

    #[tokio::test]
    async fn test_missing_source_rejected() {
        let server = test_server();
        let err = server
            .upload_video(VideoUploadToolParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_missing_file_is_internal_error() {
        let server = test_server();
        let err = server
            .upload_video(VideoUploadToolParams {
                video_path: Some("/definitely/not/here/clip.mp4".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn test_analyze_before_upload_rejected() {
        let server = test_server();
        let err = server
            .analyze_video(VideoAnalyzeToolParams {
                query: "What is this?".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }
}

#[cfg(test)]
mod property_tests {
    use crate::test_server;
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    use proptest::prelude::*;
    use video_summarizer::server::{VideoAnalyzeToolParams, VideoUploadToolParams};
    use video_summarizer::upload::VideoFormat;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Only the three accepted extensions load, in any letter case.
        #[test]
        fn upload_accepts_only_known_extensions(stem in "[a-z]{1,8}", ext in "[a-zA-Z0-9]{1,4}") {
            let server = test_server();
            let file_name = format!("{}.{}", stem, ext);
            let result = runtime().block_on(server.upload_video(VideoUploadToolParams {
                video_base64: Some(BASE64.encode(b"video")),
                file_name: Some(file_name),
                ..Default::default()
            }));

            prop_assert_eq!(result.is_ok(), VideoFormat::from_extension(&ext).is_some());
        }

        /// Blank queries leave the session warning and never build the agent.
        #[test]
        fn blank_query_only_warns(query in "[ \t\n]{0,10}") {
            let server = test_server();
            let rt = runtime();
            rt.block_on(server.upload_video(VideoUploadToolParams {
                video_base64: Some(BASE64.encode(b"video")),
                file_name: Some("clip.mp4".to_string()),
                ..Default::default()
            }))
            .unwrap();

            let result = rt.block_on(server.analyze_video(VideoAnalyzeToolParams { query })).unwrap();

            prop_assert_ne!(result.is_error, Some(true));
            prop_assert_eq!(server.session().view().status, "query_missing");
        }
    }
}
