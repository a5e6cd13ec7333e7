use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("colloquy.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("colloquy.client.request_errors");

pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("colloquy.stream.fragments");
pub(crate) static STREAM_BYTES: Counter = Counter::new("colloquy.stream.bytes");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("colloquy.stream.errors");

pub(crate) static SESSION_STARTS: Counter = Counter::new("colloquy.session.starts");
pub(crate) static SESSION_CANCELLATIONS: Counter = Counter::new("colloquy.session.cancellations");
pub(crate) static SESSION_PAUSES: Counter = Counter::new("colloquy.session.pauses");
pub(crate) static SESSION_DURATION: Moments =
    Moments::new("colloquy.session.duration_seconds");

pub(crate) static UNKNOWN_MODEL_PRICING: Counter =
    Counter::new("colloquy.accounting.unknown_model_pricing");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);

    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_ERRORS);

    collector.register_counter(&SESSION_STARTS);
    collector.register_counter(&SESSION_CANCELLATIONS);
    collector.register_counter(&SESSION_PAUSES);
    collector.register_moments(&SESSION_DURATION);

    collector.register_counter(&UNKNOWN_MODEL_PRICING);
}
