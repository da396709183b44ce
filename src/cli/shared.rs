use crate::benchmark::{BenchmarkConfiguration, ParamValue};
use crate::prelude::*;
use clap::Args;
use roofline_shared::results::{MeasurementResult, save_to_file};
use std::path::PathBuf;

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected `key=value`, got `{s}`")),
    }
}

/// Arguments shared between the run and sweep commands
#[derive(Args, Debug, Clone, Default)]
pub struct MeasureArgs {
    /// A benchmark parameter, forwarded to the subject as `--key=value`. Can be repeated.
    ///
    /// Values are typed on a best-effort basis: integers, then floats, then booleans,
    /// everything else is a string.
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value, global = true)]
    pub params: Vec<(String, String)>,

    /// Number of timed runs of the latency stage
    #[arg(long, global = true)]
    pub runs: Option<u32>,

    /// Number of untimed runs before the timed ones
    #[arg(long, global = true)]
    pub warmup: Option<u32>,

    /// Thread count, forwarded to the subject and to its parallel runtimes
    #[arg(long, global = true)]
    pub threads: Option<u32>,

    /// Rebuild the executable even if it is up to date
    #[arg(long, global = true)]
    pub rebuild: bool,

    /// Also write the results as JSON to this path, or to stdout with `-`
    #[arg(long, value_name = "PATH", global = true)]
    pub json: Option<PathBuf>,
}

impl MeasureArgs {
    /// The configuration requested on the command line, before the project defaults apply.
    pub fn to_configuration(&self) -> Result<BenchmarkConfiguration> {
        let mut entries: Vec<(String, ParamValue)> = self
            .params
            .iter()
            .map(|(key, value)| (key.clone(), ParamValue::infer(value)))
            .collect();
        if let Some(runs) = self.runs {
            entries.push(("runs".into(), runs.into()));
        }
        if let Some(warmup) = self.warmup {
            entries.push(("warmup_runs".into(), warmup.into()));
        }
        if let Some(threads) = self.threads {
            entries.push(("threads".into(), threads.into()));
        }
        if self.rebuild {
            entries.push(("rebuild".into(), true.into()));
        }
        BenchmarkConfiguration::from_entries(entries).context("Invalid benchmark configuration")
    }

    /// The JSON goes to stdout, in place of the summary table.
    pub fn json_to_stdout(&self) -> bool {
        self.json.as_ref().is_some_and(|path| path.as_os_str() == "-")
    }

    pub fn export(&self, results: &[MeasurementResult]) -> Result<()> {
        match &self.json {
            Some(_) if self.json_to_stdout() => {
                let json = serde_json::to_string_pretty(results)
                    .context("Failed to serialize the results")?;
                println!("{json}");
            }
            Some(path) => {
                save_to_file(results, path)?;
                info!("Results written to {}", path.display());
            }
            None => {}
        }
        Ok(())
    }
}
