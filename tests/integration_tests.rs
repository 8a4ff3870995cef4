//! Integration tests against a live flow backend.
//! These tests require FLOWCHAT_BASE_URL and FLOWCHAT_FLOW in the environment to run.

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use flowchat::{ChatRequest, FlowClient, FlowIdentifierResolver, Profile, Transport};

    fn live_flow() -> Option<(String, String)> {
        let base_url = std::env::var("FLOWCHAT_BASE_URL").ok()?;
        let flow = std::env::var("FLOWCHAT_FLOW").ok()?;
        Some((base_url, flow))
    }

    async fn resolved_client() -> Option<(FlowClient, String)> {
        let Some((base_url, flow)) = live_flow() else {
            eprintln!("Skipping test: FLOWCHAT_BASE_URL or FLOWCHAT_FLOW not set");
            return None;
        };
        let client = FlowClient::new(Some(base_url)).expect("Failed to create client");
        let mut profiles = vec![Profile::new("live", flow)];
        let report = FlowIdentifierResolver::new()
            .initialize(&client, &mut profiles)
            .await;
        assert!(report.error.is_none(), "Flow listing should succeed");
        let flow_id = profiles.remove(0).flow_id;
        Some((client, flow_id))
    }

    #[tokio::test]
    async fn test_simple_message_request() {
        let Some((client, flow_id)) = resolved_client().await else {
            return;
        };

        let request = ChatRequest::new("Say 'test passed'", flow_id);
        let response = client.send(&request).await;
        assert!(response.is_ok(), "Request should succeed against a live backend");
    }

    #[tokio::test]
    async fn test_streaming_response() {
        let Some((client, flow_id)) = resolved_client().await else {
            return;
        };

        let request = ChatRequest::new("Count to 3", flow_id).with_stream(true);
        let stream = client.send_streaming(&request).await;
        assert!(stream.is_ok(), "Stream request should succeed");

        let events: Vec<_> = stream.unwrap().collect().await;
        assert!(!events.is_empty(), "Stream should carry at least one event");
        assert!(events.iter().all(|event| event.is_ok()));
    }
}
