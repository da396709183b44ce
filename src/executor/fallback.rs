//! Recovery of channel data from the output of the invocation that was just made or,
//! failing that, from the log the subject persisted on disk.

use super::Stage;
use super::helpers::run_captured::{CapturedRun, RunError};
use super::parse;
use crate::prelude::*;
use roofline_shared::results::{DataOrigin, MemoryTraffic, OperationCount, StageResult};
use std::path::{Path, PathBuf};

type Parser<T> = fn(&str) -> Option<T>;

pub trait DataSource<T> {
    fn origin(&self) -> DataOrigin;

    /// The data, or `None` if this source has nothing usable.
    fn fetch(&self) -> Option<T>;
}

/// Output captured from a successful live invocation.
pub struct LiveSource<'a, T> {
    output: Option<&'a str>,
    parse: Parser<T>,
}

impl<'a, T> LiveSource<'a, T> {
    /// `output` is `None` when the invocation failed, in which case its output is not trusted.
    pub fn new(output: Option<&'a str>, parse: Parser<T>) -> Self {
        Self { output, parse }
    }
}

impl<T> DataSource<T> for LiveSource<'_, T> {
    fn origin(&self) -> DataOrigin {
        DataOrigin::Live
    }

    fn fetch(&self) -> Option<T> {
        self.output.and_then(self.parse)
    }
}

/// Log file left behind by the subject, possibly by an earlier run.
pub struct PersistedSource<T> {
    path: PathBuf,
    parse: Parser<T>,
}

impl<T> PersistedSource<T> {
    pub fn new<P: Into<PathBuf>>(path: P, parse: Parser<T>) -> Self {
        Self {
            path: path.into(),
            parse,
        }
    }
}

impl<T> DataSource<T> for PersistedSource<T> {
    fn origin(&self) -> DataOrigin {
        DataOrigin::PersistedLog
    }

    fn fetch(&self) -> Option<T> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let data = (self.parse)(&content);
                if data.is_none() {
                    debug!("No usable data in {}", self.path.display());
                }
                data
            }
            Err(err) => {
                debug!("Cannot read {}: {err}", self.path.display());
                None
            }
        }
    }
}

/// Data from the first source that has any, with its origin.
pub fn fetch_first<T>(sources: &[&dyn DataSource<T>]) -> Option<(T, DataOrigin)> {
    sources
        .iter()
        .find_map(|source| source.fetch().map(|data| (data, source.origin())))
}

/// Output stream a channel reports on.
#[derive(Debug, Clone, Copy)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Settle a privileged stage from its live attempt, consulting the persisted log only when
/// the attempt failed, timed out or produced nothing parsable.
pub fn recover<T>(
    stage: Stage,
    attempt: &std::result::Result<CapturedRun, RunError>,
    stream: Stream,
    parse: Parser<T>,
    log_path: &Path,
) -> StageResult<T> {
    let (output, failure) = match attempt {
        Ok(run) if run.status.success() => {
            let output = match stream {
                Stream::Stdout => run.stdout.as_str(),
                Stream::Stderr => run.stderr.as_str(),
            };
            (Some(output), None)
        }
        Ok(run) => (None, Some(run.failure_reason())),
        Err(err) => (None, Some(err.to_string())),
    };

    let live = LiveSource::new(output, parse);
    let persisted = PersistedSource::new(log_path, parse);
    let sources: [&dyn DataSource<T>; 2] = [&live, &persisted];
    let failure = failure.unwrap_or_else(|| "produced no data".to_string());

    match fetch_first(&sources) {
        Some((data, DataOrigin::Live)) => StageResult::live(data),
        Some((data, DataOrigin::PersistedLog)) => {
            warn!(
                "The {stage} stage {failure}, recovered data from {}",
                log_path.display()
            );
            StageResult::recovered(data)
        }
        None => StageResult::failed(format!(
            "{failure}, and nothing usable in {}",
            log_path.display()
        )),
    }
}

pub fn read_memory_traffic(path: &Path) -> Option<MemoryTraffic> {
    PersistedSource::new(path, parse::memory_traffic).fetch()
}

pub fn read_operation_count(path: &Path) -> Option<OperationCount> {
    PersistedSource::new(path, parse::operation_count).fetch()
}
