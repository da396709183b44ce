use crate::benchmark;
use roofline_shared::results::{DataOrigin, MeasurementResult, StageResult};
use roofline_shared::units::{
    format_bandwidth, format_bytes, format_count, format_seconds, format_throughput,
};
use tabled::settings::object::{Columns, Rows};
use tabled::settings::panel::Panel;
use tabled::settings::style::HorizontalLine;
use tabled::settings::{Alignment, Color, Modify, Style};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Configuration")]
    configuration: String,
    #[tabled(rename = "Latency")]
    latency: String,
    #[tabled(rename = "StdDev")]
    rel_stdev: String,
    #[tabled(rename = "DRAM traffic")]
    memory_traffic: String,
    #[tabled(rename = "Operations")]
    operations: String,
    #[tabled(rename = "Intensity")]
    intensity: String,
    #[tabled(rename = "Throughput")]
    throughput: String,
    #[tabled(rename = "Bandwidth")]
    bandwidth: String,
}

#[derive(Tabled)]
struct SweepRow {
    #[tabled(inline)]
    result: ResultRow,
    #[tabled(rename = "Speedup")]
    speedup: String,
}

/// Render a stage cell: the formatted data, marked when it was recovered from a log, or
/// the stage status when there is no data.
fn stage_cell<T>(stage: &StageResult<T>, format: impl Fn(&T) -> String) -> String {
    match stage {
        StageResult::Success {
            data,
            origin: DataOrigin::Live,
        } => format(data),
        StageResult::Success {
            data,
            origin: DataOrigin::PersistedLog,
        } => format!("{} (from log)", format(data)),
        other => other.status_label().to_string(),
    }
}

fn optional_cell(value: Option<f64>, format: impl Fn(f64) -> String) -> String {
    value.map(format).unwrap_or_else(|| "-".to_string())
}

fn result_row(result: &MeasurementResult) -> ResultRow {
    let derived = result.derived();
    ResultRow {
        configuration: benchmark::to_args(result.configuration()).join(" "),
        latency: stage_cell(result.latency(), |l| format_seconds(l.mean_s)),
        rel_stdev: match result.latency().data() {
            Some(latency) => format!("{:.2}%", latency.relative_stdev() * 100.0),
            None => "-".to_string(),
        },
        memory_traffic: stage_cell(result.memory_traffic(), |m| format_bytes(m.total_bytes)),
        operations: stage_cell(result.operation_count(), |o| format_count(o.total)),
        intensity: optional_cell(derived.arithmetic_intensity, |ai| format!("{ai:.4} ops/B")),
        throughput: optional_cell(derived.throughput_ops_per_s, format_throughput),
        bandwidth: optional_cell(derived.bandwidth_bytes_per_s, format_bandwidth),
    }
}

fn build_table_with_style<T: Tabled>(rows: &[T], title: &str) -> String {
    // Line after panel header: use ┬ to connect with columns below
    let header_line = HorizontalLine::full('─', '┬', '├', '┤');
    // Line after column headers: keep intersection
    let column_line = HorizontalLine::inherit(Style::modern());

    let title_style = Color::BOLD | Color::rgb_fg(0, 175, 175);
    let title = title_style.colorize(title);

    let mut table = Table::new(rows);
    table
        .with(Panel::header(title))
        .with(
            Style::rounded()
                .remove_horizontals()
                .intersection_top('─')
                .horizontals([(1, header_line), (2, column_line)]),
        )
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .with(Modify::new(Rows::new(1..2)).with(Color::BOLD))
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()));
    table.to_string()
}

/// Reasons of the stages that produced no data, one line each.
fn stage_notes(result: &MeasurementResult) -> Vec<String> {
    [
        ("latency", result.latency().reason()),
        ("memory traffic", result.memory_traffic().reason()),
        ("operation count", result.operation_count().reason()),
    ]
    .into_iter()
    .filter_map(|(stage, reason)| reason.map(|reason| format!("{stage}: {reason}")))
    .collect()
}

fn notes_section(results: &[MeasurementResult]) -> String {
    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        for note in stage_notes(result) {
            if results.len() > 1 {
                out.push_str(&format!("\n  [{}] {note}", i + 1));
            } else {
                out.push_str(&format!("\n  {note}"));
            }
        }
    }
    out
}

pub fn render_result(result: &MeasurementResult) -> String {
    let table = build_table_with_style(&[result_row(result)], result.benchmark());
    format!("{table}{}", notes_section(std::slice::from_ref(result)))
}

pub fn render_sweep(benchmark: &str, results: &[MeasurementResult], speedups: &[Option<f64>]) -> String {
    let rows: Vec<SweepRow> = results
        .iter()
        .zip(speedups)
        .map(|(result, speedup)| SweepRow {
            result: result_row(result),
            speedup: optional_cell(*speedup, |s| format!("{s:.2}x")),
        })
        .collect();
    let table = build_table_with_style(&rows, &format!("{benchmark} sweep"));
    format!("{table}{}", notes_section(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use roofline_shared::configuration::{BenchmarkConfiguration, ParamValue};
    use roofline_shared::results::{Latency, MemoryTraffic, OperationCount};

    fn result() -> MeasurementResult {
        let configuration = BenchmarkConfiguration::from_entries([
            ("ring_dim", ParamValue::Int(8192)),
            ("threads", ParamValue::Int(2)),
        ])
        .unwrap();
        MeasurementResult::new(
            "addition".into(),
            configuration,
            StageResult::live(Latency {
                samples_s: vec![1.0, 1.2, 0.8],
                mean_s: 1.0,
                stdev_s: 0.2,
            }),
            StageResult::recovered(MemoryTraffic {
                read_bytes: None,
                write_bytes: None,
                total_bytes: 1 << 30,
            }),
            StageResult::unavailable("instrumentation tool not found at /opt/intel/pin/pin"),
        )
    }

    #[test]
    fn test_result_row() {
        let row = result_row(&result());
        assert_eq!(row.configuration, "--ring-dim=8192 --threads=2");
        assert_eq!(row.latency, "1.000 s");
        assert_eq!(row.rel_stdev, "20.00%");
        assert_eq!(row.memory_traffic, "1.00 GiB (from log)");
        assert_eq!(row.operations, "unavailable");
        assert_eq!(row.intensity, "-");
        assert_eq!(row.bandwidth, "1.000 GiB/s");
    }

    #[test]
    fn test_stage_cell() {
        let ops = StageResult::live(OperationCount {
            total: 2_000_000_000,
            breakdown: Default::default(),
        });
        assert_eq!(stage_cell(&ops, |o| format_count(o.total)), "2,000,000,000");
        let failed: StageResult<OperationCount> = StageResult::failed("exited with exit status: 1");
        assert_eq!(stage_cell(&failed, |o| format_count(o.total)), "failed");
    }

    #[test]
    fn test_notes() {
        assert_eq!(
            notes_section(&[result()]),
            "\n  operation count: instrumentation tool not found at /opt/intel/pin/pin"
        );
    }
}
