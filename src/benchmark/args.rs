use super::{BenchmarkConfiguration, ParamValue, RunControls};
use crate::prelude::*;
use std::fmt;

pub const THREADS_FLAG: &str = "threads";

/// Value of the `--measure` flag, selecting which channel the subject instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureMode {
    None,
    Dram,
    Pin,
}

impl fmt::Display for MeasureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureMode::None => write!(f, "none"),
            MeasureMode::Dram => write!(f, "dram"),
            MeasureMode::Pin => write!(f, "pin"),
        }
    }
}

fn flag(key: &str, value: impl fmt::Display) -> String {
    format!("--{}={value}", key.replace('_', "-"))
}

/// Translate a configuration into the subject's flags.
///
/// Parameters come first, in insertion order, followed by `--threads=<n>` when a thread
/// count is set. Engine controls other than the thread count are never forwarded here.
pub fn to_args(configuration: &BenchmarkConfiguration) -> Vec<String> {
    let mut args: Vec<String> = configuration
        .params
        .iter()
        .map(|(key, value)| flag(key, value))
        .collect();
    if let Some(threads) = configuration.controls.threads {
        args.push(flag(THREADS_FLAG, threads));
    }
    args
}

/// Flags appended to every invocation: the stage's mode, then output and verification
/// suppression.
pub fn stage_flags(mode: MeasureMode, controls: &RunControls) -> Vec<String> {
    vec![
        flag("measure", mode),
        flag("quiet", controls.quiet),
        flag("skip_verify", controls.skip_verify),
    ]
}

/// Inverse of [`to_args`]: recover a configuration from `--key=value` flags.
pub fn parse_args<I, S>(args: I) -> Result<BenchmarkConfiguration>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let entries = args
        .into_iter()
        .map(|arg| -> Result<(String, ParamValue)> {
            let arg = arg.as_ref();
            let (key, value) = arg
                .strip_prefix("--")
                .and_then(|flag| flag.split_once('='))
                .with_context(|| format!("Expected `--key=value`, got `{arg}`"))?;
            ensure!(!key.is_empty(), "Empty parameter name in `{arg}`");
            Ok((key.to_string(), ParamValue::infer(value)))
        })
        .collect::<Result<Vec<_>>>()?;
    BenchmarkConfiguration::from_entries(entries)
}

/// Environment pinning the parallel runtimes of the subject: OpenMP gets the requested
/// thread count, the BLAS libraries stay single-threaded.
pub fn thread_env(threads: u32) -> Vec<(&'static str, String)> {
    vec![
        ("OMP_NUM_THREADS", threads.to_string()),
        ("MKL_NUM_THREADS", "1".to_string()),
        ("OPENBLAS_NUM_THREADS", "1".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::builtin_controls;
    use rstest::rstest;

    fn configuration() -> BenchmarkConfiguration {
        BenchmarkConfiguration::from_entries([
            ("ring_dim", ParamValue::Int(8192)),
            ("check-security", ParamValue::Bool(false)),
            ("scale", ParamValue::Float(1.0)),
            ("method", ParamValue::from("bsgs")),
            ("threads", ParamValue::Int(4)),
            ("timing_runs", ParamValue::Int(7)),
        ])
        .unwrap()
    }

    #[test]
    fn test_to_args() {
        insta::assert_snapshot!(to_args(&configuration()).join(" "), @"--ring-dim=8192 --check-security=false --scale=1.0 --method=bsgs --threads=4");
    }

    #[test]
    fn test_round_trip() {
        let original = configuration();
        let args = to_args(&original);
        let parsed = parse_args(&args).unwrap();

        assert_eq!(parsed.params, original.params);
        assert_eq!(parsed.controls.threads, original.controls.threads);
        assert_eq!(to_args(&parsed), args);
    }

    #[test]
    fn test_stage_flags() {
        let controls = RunControls::from(&builtin_controls());
        assert_eq!(
            stage_flags(MeasureMode::Dram, &controls),
            vec!["--measure=dram", "--quiet=true", "--skip-verify=true"]
        );
    }

    #[rstest]
    #[case(&["ring-dim=8192"], "Expected `--key=value`")]
    #[case(&["--ring-dim"], "Expected `--key=value`")]
    #[case(&["--=3"], "Empty parameter name")]
    #[case(&["--measure=pin"], "set by the engine")]
    #[case(&["--a=1", "--a=2"], "more than once")]
    fn test_parse_args_rejects(#[case] args: &[&str], #[case] message: &str) {
        let err = parse_args(args).unwrap_err();
        assert!(err.to_string().contains(message), "unexpected error: {err}");
    }

    #[test]
    fn test_thread_env() {
        assert_eq!(
            thread_env(16),
            vec![
                ("OMP_NUM_THREADS", "16".to_string()),
                ("MKL_NUM_THREADS", "1".to_string()),
                ("OPENBLAS_NUM_THREADS", "1".to_string()),
            ]
        );
    }
}
