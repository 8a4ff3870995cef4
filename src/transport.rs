//! The network seam between the chat state machine and the backend.

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;

use crate::Result;
use crate::types::{ChatRequest, FlowListing, FlowResponse, HistoryEntry, StreamEvent};

/// A decoded event stream for one streamed turn.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Operations the chat core needs from the backend.
///
/// [`FlowClient`](crate::FlowClient) implements this over HTTP. Tests and
/// embedders can supply their own implementation.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends one turn and waits for the complete response.
    async fn send(&self, request: &ChatRequest) -> Result<FlowResponse>;

    /// Sends one turn and returns its decoded event stream.
    async fn send_streaming(&self, request: &ChatRequest) -> Result<EventStream>;

    /// Fetches the stored messages of a session, oldest first.
    async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>>;

    /// Fetches the bulk listing of flows.
    async fn list_flows(&self) -> Result<FlowListing>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: &ChatRequest) -> Result<FlowResponse> {
        (**self).send(request).await
    }

    async fn send_streaming(&self, request: &ChatRequest) -> Result<EventStream> {
        (**self).send_streaming(request).await
    }

    async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>> {
        (**self).fetch_history(session_id).await
    }

    async fn list_flows(&self) -> Result<FlowListing> {
        (**self).list_flows().await
    }
}
