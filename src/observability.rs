use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("lexa.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("lexa.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("lexa.client.request_duration_seconds");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("lexa.stream.chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("lexa.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("lexa.stream.bytes");
pub(crate) static STREAM_TTFC: Moments = Moments::new("lexa.stream.first_chunk_seconds");

pub(crate) static CHAT_TURNS: Counter = Counter::new("lexa.chat.turns");
pub(crate) static CHAT_TURNS_FAILED: Counter = Counter::new("lexa.chat.turns_failed");
pub(crate) static CHAT_TURNS_CANCELLED: Counter = Counter::new("lexa.chat.turns_cancelled");
pub(crate) static CHAT_TURN_DURATION: Moments = Moments::new("lexa.chat.turn_duration_seconds");
pub(crate) static CHAT_REJECTED: Counter = Counter::new("lexa.chat.rejected");

pub(crate) static STORE_READS: Counter = Counter::new("lexa.store.reads");
pub(crate) static STORE_WRITES: Counter = Counter::new("lexa.store.writes");
pub(crate) static STORE_WRITE_ERRORS: Counter = Counter::new("lexa.store.write_errors");
pub(crate) static STORE_CORRUPT_READS: Counter = Counter::new("lexa.store.corrupt_reads");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFC);

    collector.register_counter(&CHAT_TURNS);
    collector.register_counter(&CHAT_TURNS_FAILED);
    collector.register_counter(&CHAT_TURNS_CANCELLED);
    collector.register_moments(&CHAT_TURN_DURATION);
    collector.register_counter(&CHAT_REJECTED);

    collector.register_counter(&STORE_READS);
    collector.register_counter(&STORE_WRITES);
    collector.register_counter(&STORE_WRITE_ERRORS);
    collector.register_counter(&STORE_CORRUPT_READS);
}
