//! Traceroute invocation, parsing and collection.

pub mod collect;
pub mod error;
pub mod parser;
pub mod runner;

pub use collect::{collect, collect_into, CollectOutcome, CollectSettings, RunFailure};
pub use error::ExecutionError;
pub use parser::{parse_hop_line, parse_hops};
pub use runner::{
    run_trace, SystemTracerouteRunner, TraceCommand, TraceSettings, TracerouteRunner,
};
