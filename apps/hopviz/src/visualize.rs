use anyhow::{Context, Result};
use chrono::Local;
use hopviz_model::TraceTable;
use hopviz_render::{render_with, ChartSettings};
use hopviz_trace::{collect_into, CollectSettings, TracerouteRunner};
use log::{info, warn};
use std::fmt::Write;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct VisualizeOptions {
    pub collect: CollectSettings,
    pub output_dir: PathBuf,
    pub chart: ChartSettings,
}

impl Default for VisualizeOptions {
    fn default() -> Self {
        Self {
            collect: CollectSettings::default(),
            output_dir: PathBuf::from("output"),
            chart: ChartSettings::default(),
        }
    }
}

/// Traces `destination` several times and charts the result. Returns the
/// collected table and the path of the saved chart.
pub fn visualize<R>(
    destination: &str,
    options: &VisualizeOptions,
    runner: &R,
) -> Result<(TraceTable, PathBuf)>
where
    R: TracerouteRunner + ?Sized,
{
    fs::create_dir_all(&options.output_dir).with_context(|| {
        format!(
            "failed to create output directory {:?}",
            options.output_dir
        )
    })?;

    info!(
        "running {} traceroutes to {}",
        options.collect.num_traces, destination
    );

    let mut records = Vec::new();
    let outcome = collect_into(destination, &options.collect, runner, &mut records);
    if outcome.completed == 0 && options.collect.num_traces > 0 {
        warn!("no trace to {destination} succeeded; the chart will be empty");
    }

    let table = TraceTable::new(destination, records);
    let path = render_with(
        &table,
        destination,
        &options.output_dir,
        &options.chart,
        Local::now().naive_local(),
    )
    .with_context(|| format!("failed to render chart for {destination}"))?;

    Ok((table, path))
}

/// Average RTT by hop across every run, one row per hop.
pub fn format_hop_averages(table: &TraceTable) -> String {
    let mut out = String::from("hop  avg_rtt_ms\n");
    for (hop, avg) in table.average_by_hop() {
        let value = match avg {
            Some(avg) => format!("{avg:.3}"),
            None => "-".to_string(),
        };
        let _ = writeln!(out, "{hop:>3}  {value}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopviz_trace::{ExecutionError, TraceSettings};
    use std::time::Duration;
    use tempfile::tempdir;

    struct StaticRunner(&'static str);

    impl TracerouteRunner for StaticRunner {
        fn run(
            &self,
            _destination: &str,
            _settings: &TraceSettings,
        ) -> Result<String, ExecutionError> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenRunner;

    impl TracerouteRunner for BrokenRunner {
        fn run(
            &self,
            _destination: &str,
            _settings: &TraceSettings,
        ) -> Result<String, ExecutionError> {
            Err(ExecutionError::NotFound {
                program: "traceroute",
            })
        }
    }

    const OUTPUT: &str = "traceroute to example.com (93.184.216.34), 30 hops max
 1  router.local (192.168.1.1)  1.0 ms  2.0 ms  3.0 ms
 2  * * *
 3  93.184.216.34  10.0 ms  * 20.0 ms
";

    fn options(dir: &std::path::Path) -> VisualizeOptions {
        VisualizeOptions {
            collect: CollectSettings {
                num_traces: 2,
                interval: Duration::ZERO,
                ..CollectSettings::default()
            },
            output_dir: dir.join("output"),
            chart: ChartSettings {
                width: 400,
                height: 240,
            },
        }
    }

    #[test]
    fn visualize_collects_and_saves_chart() {
        let dir = tempdir().unwrap();
        let (table, path) =
            visualize("example.com", &options(dir.path()), &StaticRunner(OUTPUT)).unwrap();

        assert_eq!(table.destination, "example.com");
        assert_eq!(table.records.len(), 6);
        assert_eq!(table.runs().len(), 2);
        assert!(path.exists());

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("trace_example-com_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn failing_tool_still_produces_chart() {
        let dir = tempdir().unwrap();
        let (table, path) =
            visualize("example.com", &options(dir.path()), &BrokenRunner).unwrap();
        assert!(table.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn averages_table_marks_silent_hops() {
        let dir = tempdir().unwrap();
        let (table, _) =
            visualize("example.com", &options(dir.path()), &StaticRunner(OUTPUT)).unwrap();
        let text = format_hop_averages(&table);
        assert_eq!(text, "hop  avg_rtt_ms\n  1  2.000\n  2  -\n  3  15.000\n");
    }
}
