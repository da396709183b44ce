//! Benchmark configurations as seen by the engine: the shared data model plus the
//! resolution of unset controls and the mapping onto the subject's command line.

mod args;

pub use args::*;
pub use roofline_shared::configuration::{
    BenchmarkConfiguration, Controls, ParamValue, Parameters, normalize_key,
};

pub const DEFAULT_RUNS: u32 = 3;
pub const DEFAULT_WARMUP_RUNS: u32 = 1;
pub const DEFAULT_THREADS: u32 = 1;

/// Controls used when neither the request nor the project defaults set them.
pub fn builtin_controls() -> Controls {
    Controls {
        runs: Some(DEFAULT_RUNS),
        warmup_runs: Some(DEFAULT_WARMUP_RUNS),
        threads: Some(DEFAULT_THREADS),
        rebuild: Some(false),
        quiet: Some(true),
        skip_verify: Some(true),
    }
}

/// Layer `requested` over the project defaults, then fill the remaining controls from
/// [`builtin_controls`]. The result has every control set.
pub fn resolve(
    requested: &BenchmarkConfiguration,
    defaults: &BenchmarkConfiguration,
) -> BenchmarkConfiguration {
    let mut effective = requested.merged_over(defaults);
    effective.controls = effective.controls.or(&builtin_controls());
    effective
}

/// Fully resolved controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunControls {
    pub runs: u32,
    pub warmup_runs: u32,
    pub threads: u32,
    pub rebuild: bool,
    pub quiet: bool,
    pub skip_verify: bool,
}

impl From<&Controls> for RunControls {
    fn from(controls: &Controls) -> Self {
        RunControls {
            runs: controls.runs.unwrap_or(DEFAULT_RUNS),
            warmup_runs: controls.warmup_runs.unwrap_or(DEFAULT_WARMUP_RUNS),
            threads: controls.threads.unwrap_or(DEFAULT_THREADS),
            rebuild: controls.rebuild.unwrap_or(false),
            quiet: controls.quiet.unwrap_or(true),
            skip_verify: controls.skip_verify.unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_precedence() {
        let defaults = BenchmarkConfiguration::from_entries([
            ("ring_dim", ParamValue::Int(8192)),
            ("mult_depth", ParamValue::Int(1)),
            ("timing_runs", ParamValue::Int(5)),
            ("quiet", ParamValue::Bool(false)),
        ])
        .unwrap();
        let requested = BenchmarkConfiguration::from_entries([
            ("ring_dim", ParamValue::Int(16384)),
            ("threads", ParamValue::Int(8)),
        ])
        .unwrap();

        let effective = resolve(&requested, &defaults);
        let controls = RunControls::from(&effective.controls);
        assert_eq!(
            controls,
            RunControls {
                runs: 5,
                warmup_runs: DEFAULT_WARMUP_RUNS,
                threads: 8,
                rebuild: false,
                quiet: false,
                skip_verify: true,
            }
        );
        assert_eq!(
            to_args(&effective),
            vec!["--ring-dim=16384", "--mult-depth=1", "--threads=8"]
        );
    }

    #[test]
    fn test_resolve_without_defaults() {
        let effective = resolve(
            &BenchmarkConfiguration::default(),
            &BenchmarkConfiguration::default(),
        );
        assert_eq!(effective.controls, builtin_controls());
        assert_eq!(to_args(&effective), vec!["--threads=1"]);
    }
}
