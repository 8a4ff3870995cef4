// Public modules
pub mod chat;
pub mod client;
pub mod display;
pub mod error;
pub mod flows;
pub mod ndjson;
pub mod observability;
pub mod transport;
pub mod types;
pub mod utils;

// Re-exports
pub use client::FlowClient;
pub use display::{ChatDisplay, DisplayedMessage, MemoryDisplay, MessageHandle, PlainTextDisplay};
pub use error::{Error, Result};
pub use flows::{
    FlowIdentifierResolver, FlowNameMap, Profile, ResolutionReport, is_canonical_id,
    resolve_profiles,
};
pub use ndjson::StreamDecoder;
pub use observability::register_biometrics;
pub use transport::{EventStream, Transport};
pub use types::*;
