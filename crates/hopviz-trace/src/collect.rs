use crate::parser::parse_hops;
use crate::runner::{TraceSettings, TracerouteRunner};
use chrono::Utc;
use hopviz_model::TraceRecord;
use log::{info, warn};
use std::thread::sleep;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CollectSettings {
    pub num_traces: u32,
    /// Pause between consecutive runs. No pause before the first.
    pub interval: Duration,
    pub trace: TraceSettings,
}

impl Default for CollectSettings {
    fn default() -> Self {
        Self {
            num_traces: 3,
            interval: Duration::from_secs(5),
            trace: TraceSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub trace_index: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectOutcome {
    /// Runs whose output was parsed, including runs that yielded no hops.
    pub completed: u32,
    pub failures: Vec<RunFailure>,
}

pub fn collect<R>(
    destination: &str,
    settings: &CollectSettings,
    runner: &R,
) -> (Vec<TraceRecord>, CollectOutcome)
where
    R: TracerouteRunner + ?Sized,
{
    let mut records = Vec::new();
    let outcome = collect_into(destination, settings, runner, &mut records);
    (records, outcome)
}

/// Runs the trace `num_traces` times and appends every parsed hop to
/// `records`, tagged with its 1-based run index. A failed run contributes no
/// hops and does not stop the remaining runs.
pub fn collect_into<R>(
    destination: &str,
    settings: &CollectSettings,
    runner: &R,
    records: &mut Vec<TraceRecord>,
) -> CollectOutcome
where
    R: TracerouteRunner + ?Sized,
{
    let mut outcome = CollectOutcome::default();

    for trace_index in 1..=settings.num_traces {
        if trace_index > 1 && !settings.interval.is_zero() {
            info!(
                "waiting {}s before next trace",
                settings.interval.as_secs_f64()
            );
            sleep(settings.interval);
        }

        info!(
            "trace {}/{} to {}",
            trace_index, settings.num_traces, destination
        );

        let raw = match runner.run(destination, &settings.trace) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("trace {trace_index} to {destination} failed: {err}");
                outcome.failures.push(RunFailure {
                    trace_index,
                    message: err.to_string(),
                });
                continue;
            }
        };

        let captured_at = Utc::now();
        let hops = parse_hops(&raw);
        if hops.is_empty() {
            warn!("trace {trace_index} to {destination} produced no hop lines");
        }

        records.extend(hops.into_iter().map(|hop| TraceRecord {
            hop,
            trace_index,
            captured_at,
        }));
        outcome.completed += 1;
    }

    outcome
}
