// SPDX-License-Identifier: MIT OR Apache-2.0
//! Prometheus text-exposition rendering for one pipeline's metrics.

use std::fmt::Write as _;

use crate::monitor::StepMetricsSnapshot;
use crate::telemetry::MetricsSnapshot;

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Render every tracked metric for one pipeline, given its overall run
/// metrics and one [`StepMetricsSnapshot`] per configured filter/weigher.
#[must_use]
pub fn render_pipeline_metrics(pipeline: &str, run: &MetricsSnapshot, steps: &[StepMetricsSnapshot]) -> String {
    let pipeline = escape(pipeline);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "pipeline_run_duration_seconds_sum{{pipeline=\"{pipeline}\"}} {}",
        run.run_duration_micros_total as f64 / 1_000_000.0
    );
    let _ = writeln!(
        out,
        "pipeline_run_duration_seconds_count{{pipeline=\"{pipeline}\"}} {}",
        run.runs_total
    );
    let _ = writeln!(
        out,
        "pipeline_host_number_in{{pipeline=\"{pipeline}\"}} {}",
        run.last_host_number_in
    );
    let _ = writeln!(
        out,
        "pipeline_host_number_out{{pipeline=\"{pipeline}\"}} {}",
        run.last_host_number_out
    );
    let _ = writeln!(
        out,
        "pipeline_requests_total{{pipeline=\"{pipeline}\"}} {}",
        run.runs_total
    );

    for step in steps {
        let step_name = escape(&step.step_name);

        let _ = writeln!(
            out,
            "pipeline_step_run_duration_seconds_sum{{pipeline=\"{pipeline}\",step=\"{step_name}\"}} {}",
            step.total_duration_micros as f64 / 1_000_000.0
        );
        let _ = writeln!(
            out,
            "pipeline_step_run_duration_seconds_count{{pipeline=\"{pipeline}\",step=\"{step_name}\"}} {}",
            step.invocations
        );
        let _ = writeln!(
            out,
            "pipeline_step_removed_hosts{{pipeline=\"{pipeline}\",step=\"{step_name}\"}} {}",
            step.last_removed_hosts
        );

        for (host, value) in &step.weight_modifications {
            let _ = writeln!(
                out,
                "pipeline_step_weight_modification{{pipeline=\"{pipeline}\",host=\"{}\",step=\"{step_name}\"}} {value}",
                escape(host)
            );
        }

        for shift in &step.last_shifts {
            let origin = shift
                .original_index
                .map_or(-1.0, |idx| idx as f64);
            let _ = writeln!(
                out,
                "pipeline_step_shift_origin{{pipeline=\"{pipeline}\",step=\"{step_name}\",outidx=\"{}\"}} {origin}",
                shift.out_idx
            );
        }

        for (stat_name, (value, unit)) in &step.last_impact {
            let _ = writeln!(
                out,
                "pipeline_step_impact{{pipeline=\"{pipeline}\",step=\"{step_name}\",stat=\"{}\",unit=\"{}\"}} {value}",
                escape(stat_name),
                escape(unit),
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn renders_pipeline_level_metrics_with_pipeline_label() {
        let run = MetricsSnapshot {
            runs_total: 3,
            runs_empty_total: 1,
            runs_failed_total: 0,
            run_duration_micros_total: 3_000_000,
            mean_run_duration_micros: 1_000_000.0,
            last_host_number_in: 5,
            last_host_number_out: 4,
        };
        let text = render_pipeline_metrics("nova-default", &run, &[]);
        assert!(text.contains("pipeline_requests_total{pipeline=\"nova-default\"} 3"));
        assert!(text.contains("pipeline_host_number_in{pipeline=\"nova-default\"} 5"));
        assert!(text.contains("pipeline_host_number_out{pipeline=\"nova-default\"} 4"));
        assert!(text.contains("pipeline_run_duration_seconds_sum{pipeline=\"nova-default\"} 3"));
    }

    #[test]
    fn renders_step_level_metrics_with_pipeline_and_step_labels() {
        let run = MetricsSnapshot {
            runs_total: 0,
            runs_empty_total: 0,
            runs_failed_total: 0,
            run_duration_micros_total: 0,
            mean_run_duration_micros: 0.0,
            last_host_number_in: 0,
            last_host_number_out: 0,
        };
        let step = StepMetricsSnapshot {
            step_name: "contention".to_string(),
            invocations: 2,
            skips: 0,
            failures: 0,
            total_duration_micros: 200,
            mean_duration_micros: 100.0,
            recent_mean_abs_activation: 0.5,
            last_removed_hosts: 1,
            removed_hosts_total: 1,
            last_shifts: vec![crate::reorder::Shift {
                out_idx: 0,
                subject: "h1".to_string(),
                original_index: Some(2),
            }],
            last_impact: BTreeMap::from([("free_ram".to_string(), (12.5, "MB".to_string()))]),
            weight_modifications: BTreeMap::from([("h1".to_string(), 0.3)]),
        };
        let text = render_pipeline_metrics("nova-default", &run, std::slice::from_ref(&step));
        assert!(text.contains(
            "pipeline_step_removed_hosts{pipeline=\"nova-default\",step=\"contention\"} 1"
        ));
        assert!(text.contains(
            "pipeline_step_weight_modification{pipeline=\"nova-default\",host=\"h1\",step=\"contention\"} 0.3"
        ));
        assert!(text.contains(
            "pipeline_step_shift_origin{pipeline=\"nova-default\",step=\"contention\",outidx=\"0\"} 2"
        ));
        assert!(text.contains(
            "pipeline_step_impact{pipeline=\"nova-default\",step=\"contention\",stat=\"free_ram\",unit=\"MB\"} 12.5"
        ));
    }

    #[test]
    fn shift_origin_is_negative_one_when_subject_is_new() {
        let run = MetricsSnapshot {
            runs_total: 0,
            runs_empty_total: 0,
            runs_failed_total: 0,
            run_duration_micros_total: 0,
            mean_run_duration_micros: 0.0,
            last_host_number_in: 0,
            last_host_number_out: 0,
        };
        let step = StepMetricsSnapshot {
            step_name: "s".to_string(),
            invocations: 1,
            skips: 0,
            failures: 0,
            total_duration_micros: 10,
            mean_duration_micros: 10.0,
            recent_mean_abs_activation: 0.0,
            last_removed_hosts: 0,
            removed_hosts_total: 0,
            last_shifts: vec![crate::reorder::Shift {
                out_idx: 0,
                subject: "h9".to_string(),
                original_index: None,
            }],
            last_impact: BTreeMap::new(),
            weight_modifications: BTreeMap::new(),
        };
        let text = render_pipeline_metrics("p", &run, std::slice::from_ref(&step));
        assert!(text.contains("pipeline_step_shift_origin{pipeline=\"p\",step=\"s\",outidx=\"0\"} -1"));
    }
}
