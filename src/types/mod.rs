// Public modules
pub mod chat_request;
pub mod flow_descriptor;
pub mod flow_response;
pub mod history_entry;
pub mod sender;
pub mod stream_event;

// Re-exports
pub use chat_request::ChatRequest;
pub use flow_descriptor::{FlowDescriptor, FlowListing};
pub use flow_response::FlowResponse;
pub use history_entry::{HistoryEntry, HistoryListing};
pub use sender::Sender;
pub use stream_event::{EndEvent, ErrorEvent, StreamEvent, StreamStartedEvent, TokenEvent};
