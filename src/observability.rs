use biometrics::{Collector, Counter, Moments};

pub(crate) static PROBES: Counter = Counter::new("ollama_console.prober.probes");
pub(crate) static PROBE_FAILURES: Counter = Counter::new("ollama_console.prober.failures");
pub(crate) static WELCOME_RENDERS: Counter = Counter::new("ollama_console.prober.welcome_renders");

pub(crate) static STREAM_REQUESTS: Counter = Counter::new("ollama_console.stream.requests");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("ollama_console.stream.errors");
pub(crate) static STREAM_CANCELLED: Counter = Counter::new("ollama_console.stream.cancelled");
pub(crate) static STREAM_CHUNKS: Counter = Counter::new("ollama_console.stream.chunks");
pub(crate) static STREAM_MALFORMED: Counter = Counter::new("ollama_console.stream.malformed");
pub(crate) static STREAM_BYTES: Counter = Counter::new("ollama_console.stream.bytes");
pub(crate) static STREAM_TTFB: Moments = Moments::new("ollama_console.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments =
    Moments::new("ollama_console.stream.duration_seconds");

pub(crate) static HISTORY_EVICTIONS: Counter = Counter::new("ollama_console.history.evictions");
pub(crate) static COMMANDS_DISPATCHED: Counter =
    Counter::new("ollama_console.commands.dispatched");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&PROBES);
    collector.register_counter(&PROBE_FAILURES);
    collector.register_counter(&WELCOME_RENDERS);

    collector.register_counter(&STREAM_REQUESTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_CANCELLED);
    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_MALFORMED);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&HISTORY_EVICTIONS);
    collector.register_counter(&COMMANDS_DISPATCHED);
}
