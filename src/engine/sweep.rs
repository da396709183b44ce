use super::Orchestrator;
use crate::benchmark::{self, BenchmarkConfiguration, ParamValue, RunControls};
use crate::builder::BuildError;
use crate::prelude::*;
use roofline_shared::results::MeasurementResult;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// The single dimension a sweep varies.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepAxis {
    Parameter { name: String, values: Vec<ParamValue> },
    Threads { counts: Vec<u32> },
}

impl SweepAxis {
    pub fn len(&self) -> usize {
        match self {
            SweepAxis::Parameter { values, .. } => values.len(),
            SweepAxis::Threads { counts } => counts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `fixed` with the axis set to each of its values in turn.
    fn configurations(
        &self,
        fixed: &BenchmarkConfiguration,
    ) -> Result<Vec<BenchmarkConfiguration>> {
        ensure!(!self.is_empty(), "no values to sweep over");
        match self {
            SweepAxis::Parameter { name, values } => values
                .iter()
                .map(|value| -> Result<BenchmarkConfiguration> {
                    // Reserved keys are routed to the controls, which a parameter axis cannot vary
                    let single = BenchmarkConfiguration::from_entries([(name, value.clone())])?;
                    ensure!(
                        single.params.contains(name),
                        "`{name}` is an engine control, not a benchmark parameter"
                    );
                    Ok(fixed.with_param(name, value.clone()))
                })
                .collect(),
            SweepAxis::Threads { counts } => counts
                .iter()
                .map(|&count| -> Result<BenchmarkConfiguration> {
                    ensure!(count > 0, "thread counts must be at least 1");
                    Ok(fixed.with_threads(count))
                })
                .collect(),
        }
    }
}

impl fmt::Display for SweepAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepAxis::Parameter { name, values } => {
                write!(f, "{name} over [{}]", values.iter().join(", "))
            }
            SweepAxis::Threads { counts } => write!(f, "threads over [{}]", counts.iter().join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    /// One result per axis value, in input order
    pub results: Vec<MeasurementResult>,
    /// Set when the sweep stopped before its last value
    pub cancelled: bool,
}

impl SweepReport {
    /// Runtime of the first configuration divided by each configuration's runtime.
    pub fn speedups(&self) -> Vec<Option<f64>> {
        match self.results.first() {
            Some(baseline) => self
                .results
                .iter()
                .map(|result| result.speedup_over(baseline))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Errors that prevent a sweep from starting.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("invalid sweep: {0:#}")]
    InvalidAxis(anyhow::Error),
    #[error(transparent)]
    Build(#[from] BuildError),
}

impl Orchestrator {
    /// Measure `benchmark` once per axis value, holding `fixed` constant.
    ///
    /// The executable is built once up front. A configuration whose stages fail still gets
    /// its result and the sweep moves on. `cancel` is honored between configurations.
    pub async fn sweep(
        &self,
        benchmark: &str,
        axis: &SweepAxis,
        fixed: &BenchmarkConfiguration,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, SweepError> {
        let configurations = axis
            .configurations(fixed)
            .map_err(SweepError::InvalidAxis)?;

        let rebuild = RunControls::from(
            &benchmark::resolve(fixed, &self.config.defaults).controls,
        )
        .rebuild;
        let artifact = self.builder.ensure(benchmark, rebuild).await?;

        info!("Sweeping {benchmark}: {axis}");
        let total = configurations.len();
        let mut results = Vec::with_capacity(total);
        for (i, configuration) in configurations.into_iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("Sweep cancelled after {i}/{total} configurations");
                return Ok(SweepReport {
                    results,
                    cancelled: true,
                });
            }
            debug!("Configuration {}/{total}", i + 1);
            let effective = benchmark::resolve(&configuration, &self.config.defaults);
            let result = self.measure_built(benchmark, &artifact, effective).await;
            if result.is_empty() {
                warn!("No stage produced data for configuration {}/{total}", i + 1);
            }
            results.push(result);
        }

        Ok(SweepReport {
            results,
            cancelled: false,
        })
    }
}
