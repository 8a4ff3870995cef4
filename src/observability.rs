use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("flowchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("flowchat.client.request_errors");

pub(crate) static STREAM_RECORDS: Counter = Counter::new("flowchat.stream.records");
pub(crate) static STREAM_PARSE_ERRORS: Counter = Counter::new("flowchat.stream.parse_errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("flowchat.stream.bytes");

pub(crate) static TURNS: Counter = Counter::new("flowchat.turn.count");
pub(crate) static TURN_ERRORS: Counter = Counter::new("flowchat.turn.errors");
pub(crate) static TURN_DURATION: Moments = Moments::new("flowchat.turn.duration_seconds");

pub(crate) static HISTORY_FETCHES: Counter = Counter::new("flowchat.history.fetches");
pub(crate) static HISTORY_FETCH_ERRORS: Counter = Counter::new("flowchat.history.fetch_errors");

pub(crate) static FLOW_RESOLUTIONS: Counter = Counter::new("flowchat.flows.resolutions");
pub(crate) static FLOW_RESOLUTION_FAILURES: Counter =
    Counter::new("flowchat.flows.resolution_failures");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);

    collector.register_counter(&STREAM_RECORDS);
    collector.register_counter(&STREAM_PARSE_ERRORS);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&TURNS);
    collector.register_counter(&TURN_ERRORS);
    collector.register_moments(&TURN_DURATION);

    collector.register_counter(&HISTORY_FETCHES);
    collector.register_counter(&HISTORY_FETCH_ERRORS);

    collector.register_counter(&FLOW_RESOLUTIONS);
    collector.register_counter(&FLOW_RESOLUTION_FAILURES);
}
