//! Shared data structures for hopviz.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of probes a standard trace tool sends per hop.
pub const PROBES_PER_HOP: usize = 3;

pub const TABLE_VERSION: u32 = 1;

/// One parsed hop line of trace output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HopRecord {
    pub hop_number: u32,
    pub ip_address: Option<String>,
    /// Only set when the tool printed a name distinct from the address.
    pub hostname: Option<String>,
    /// Milliseconds per probe, `None` for a timed out probe. Always at least
    /// [`PROBES_PER_HOP`] entries long.
    pub round_trip_times: Vec<Option<f64>>,
}

impl HopRecord {
    pub fn avg_rtt(&self) -> Option<f64> {
        mean_rtt(&self.round_trip_times)
    }
}

/// A hop tagged with the run it was captured in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceRecord {
    #[serde(flatten)]
    pub hop: HopRecord,
    pub trace_index: u32,
    pub captured_at: DateTime<Utc>,
}

impl TraceRecord {
    pub fn avg_rtt(&self) -> Option<f64> {
        self.hop.avg_rtt()
    }
}

/// Every hop collected for one destination, in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceTable {
    pub version: u32,
    pub destination: String,
    pub records: Vec<TraceRecord>,
}

/// The records of a single trace run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunView<'a> {
    pub trace_index: u32,
    pub captured_at: DateTime<Utc>,
    pub records: Vec<&'a TraceRecord>,
}

impl TraceTable {
    pub fn new(destination: impl Into<String>, records: Vec<TraceRecord>) -> Self {
        Self {
            version: TABLE_VERSION,
            destination: destination.into(),
            records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Groups records by trace index, ascending. Records keep their arrival
    /// order inside each run.
    pub fn runs(&self) -> Vec<RunView<'_>> {
        let mut grouped: BTreeMap<u32, RunView<'_>> = BTreeMap::new();
        for record in &self.records {
            grouped
                .entry(record.trace_index)
                .or_insert_with(|| RunView {
                    trace_index: record.trace_index,
                    captured_at: record.captured_at,
                    records: Vec::new(),
                })
                .records
                .push(record);
        }
        grouped.into_values().collect()
    }

    /// Mean of the per-record averages for each hop number across runs.
    /// A hop that never answered in any run maps to `None`.
    pub fn average_by_hop(&self) -> BTreeMap<u32, Option<f64>> {
        let mut sums: BTreeMap<u32, (f64, u32)> = BTreeMap::new();
        for record in &self.records {
            let entry = sums.entry(record.hop.hop_number).or_insert((0.0, 0));
            if let Some(avg) = record.avg_rtt() {
                entry.0 += avg;
                entry.1 += 1;
            }
        }

        sums.into_iter()
            .map(|(hop, (sum, count))| {
                let avg = if count > 0 {
                    Some(sum / count as f64)
                } else {
                    None
                };
                (hop, avg)
            })
            .collect()
    }
}

/// Arithmetic mean of the measured probes. All-absent input yields `None`,
/// never zero.
pub fn mean_rtt(rtts: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = rtts
        .iter()
        .flatten()
        .fold((0.0, 0u32), |(sum, count), rtt| (sum + rtt, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hop(hop_number: u32, ip: Option<&str>, rtt: &[Option<f64>]) -> HopRecord {
        HopRecord {
            hop_number,
            ip_address: ip.map(|value| value.to_string()),
            hostname: None,
            round_trip_times: rtt.to_vec(),
        }
    }

    fn record(trace_index: u32, hop: HopRecord) -> TraceRecord {
        TraceRecord {
            hop,
            trace_index,
            captured_at: Utc
                .with_ymd_and_hms(2026, 2, 1, 12, 0, trace_index)
                .unwrap(),
        }
    }

    #[test]
    fn mean_of_all_timeouts_is_absent() {
        assert_eq!(mean_rtt(&[None, None, None]), None);
        assert_eq!(mean_rtt(&[]), None);
    }

    #[test]
    fn mean_skips_timeouts() {
        assert_eq!(mean_rtt(&[Some(10.0), None, Some(20.0)]), Some(15.0));
        let avg = hop(1, None, &[Some(1.0), Some(2.0), Some(4.5), Some(0.5)])
            .avg_rtt()
            .unwrap();
        assert!((avg - 2.0).abs() < 1e-9);
    }

    #[test]
    fn runs_group_by_index_in_order() {
        let table = TraceTable::new(
            "example.net",
            vec![
                record(2, hop(1, Some("10.0.0.1"), &[Some(1.0), None, None])),
                record(1, hop(1, Some("10.0.0.1"), &[Some(2.0), None, None])),
                record(1, hop(2, None, &[None, None, None])),
                record(2, hop(2, Some("10.0.0.2"), &[Some(5.0), None, None])),
            ],
        );

        let runs = table.runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].trace_index, 1);
        assert_eq!(runs[0].records.len(), 2);
        assert_eq!(runs[0].records[1].hop.hop_number, 2);
        assert_eq!(runs[1].trace_index, 2);
        assert_eq!(runs[1].captured_at.timestamp() % 60, 2);
    }

    #[test]
    fn average_by_hop_ignores_silent_runs() {
        let table = TraceTable::new(
            "example.net",
            vec![
                record(1, hop(1, Some("10.0.0.1"), &[Some(1.0), Some(3.0), None])),
                record(2, hop(1, Some("10.0.0.1"), &[Some(4.0), None, None])),
                record(1, hop(2, None, &[None, None, None])),
                record(2, hop(2, Some("10.0.0.2"), &[Some(8.0), None, None])),
                record(1, hop(3, None, &[None, None, None])),
            ],
        );

        let averages = table.average_by_hop();
        assert_eq!(averages.get(&1), Some(&Some(3.0)));
        assert_eq!(averages.get(&2), Some(&Some(8.0)));
        assert_eq!(averages.get(&3), Some(&None));
    }

    #[test]
    fn trace_table_json_is_stable() {
        let mut named = hop(1, Some("192.168.1.1"), &[Some(1.2), Some(1.1), Some(1.3)]);
        named.hostname = Some("router.local".to_string());
        let table = TraceTable::new(
            "1.1.1.1",
            vec![
                record(1, named),
                record(1, hop(2, None, &[None, None, None])),
            ],
        );

        let json = serde_json::to_string_pretty(&table).unwrap();
        assert!(json.contains("\"hop_number\": 1"));
        assert!(json.contains("\"trace_index\": 1"));

        let decoded: TraceTable = serde_json::from_str(&json).unwrap();
        assert_eq!(table, decoded);
        assert_eq!(json, serde_json::to_string_pretty(&decoded).unwrap());
    }
}
