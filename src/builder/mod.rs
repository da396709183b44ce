//! Artifact builder: keeps each subject executable at least as new as its source.

use crate::config::EngineConfig;
use crate::executor::helpers::command::CommandBuilder;
use crate::executor::helpers::run_captured::{CapturedRun, RunError, run_captured};
use crate::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Configure,
    Build,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildPhase::Configure => write!(f, "configure"),
            BuildPhase::Build => write!(f, "build"),
        }
    }
}

/// Fatal errors: without an executable no stage can run.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("source file not found: {}", path.display())]
    SourceNotFound { path: PathBuf },
    #[error("the {phase} phase failed:\n{diagnostics}")]
    BuildFailed { phase: BuildPhase, diagnostics: String },
    #[error("could not run the build tool: {0}")]
    Launch(#[from] RunError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// A subject executable together with the source it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableArtifact {
    pub executable: PathBuf,
    pub source: PathBuf,
    pub source_modified: SystemTime,
    /// `None` while the executable does not exist
    pub executable_modified: Option<SystemTime>,
}

impl ExecutableArtifact {
    /// Observe both files as they are now.
    fn observe(executable: PathBuf, source: PathBuf) -> Result<Self, BuildError> {
        let source_modified = match std::fs::metadata(&source) {
            Ok(metadata) => metadata.modified().map_err(|source_err| BuildError::Io {
                context: format!("cannot read the modification time of {}", source.display()),
                source: source_err,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(BuildError::SourceNotFound { path: source });
            }
            Err(err) => {
                return Err(BuildError::Io {
                    context: format!("cannot access {}", source.display()),
                    source: err,
                });
            }
        };
        let executable_modified = std::fs::metadata(&executable)
            .and_then(|metadata| metadata.modified())
            .ok();
        Ok(Self {
            executable,
            source,
            source_modified,
            executable_modified,
        })
    }

    /// Missing, or older than its source.
    pub fn is_stale(&self) -> bool {
        match self.executable_modified {
            Some(executable_modified) => self.source_modified > executable_modified,
            None => true,
        }
    }
}

pub struct ArtifactBuilder {
    config: Rc<EngineConfig>,
    lock: Mutex<()>,
}

impl ArtifactBuilder {
    pub fn new(config: Rc<EngineConfig>) -> Self {
        Self {
            config,
            lock: Mutex::new(()),
        }
    }

    /// Make sure the executable of `benchmark` exists and is up to date, building it if it
    /// is stale or if `force` is set. Freshness is checked anew on every call.
    pub async fn ensure(
        &self,
        benchmark: &str,
        force: bool,
    ) -> Result<ExecutableArtifact, BuildError> {
        let _guard = self.lock.lock().await;

        let artifact = ExecutableArtifact::observe(
            self.config.executable_path(benchmark),
            self.config.source_path(benchmark),
        )?;
        if !force && !artifact.is_stale() {
            debug!("{} is up to date", artifact.executable.display());
            return Ok(artifact);
        }

        start_group!(format!("Building {benchmark}"));
        let built = self.build(benchmark).await;
        end_group!();
        built?;

        let artifact = ExecutableArtifact::observe(artifact.executable, artifact.source)?;
        if artifact.executable_modified.is_none() {
            return Err(BuildError::BuildFailed {
                phase: BuildPhase::Build,
                diagnostics: format!(
                    "the build succeeded but produced no executable at {}",
                    artifact.executable.display()
                ),
            });
        }
        info!("Built {}", artifact.executable.display());
        Ok(artifact)
    }

    async fn build(&self, benchmark: &str) -> Result<(), BuildError> {
        let build_dir = self.config.build_dir();
        std::fs::create_dir_all(&build_dir).map_err(|source| BuildError::Io {
            context: format!("cannot create {}", build_dir.display()),
            source,
        })?;

        let configure = self.configure_command(benchmark, &build_dir);
        run_phase(BuildPhase::Configure, configure).await?;
        let build = self.build_command(&build_dir);
        run_phase(BuildPhase::Build, build).await
    }

    fn configure_command(&self, benchmark: &str, build_dir: &Path) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(&self.config.build_tool);
        cmd.arg("-S")
            .arg(&self.config.repo_root)
            .arg("-B")
            .arg(build_dir)
            .arg(format!(
                "-DBENCH_SOURCE={}",
                self.config.relative_source_path(benchmark).display()
            ))
            .arg(format!("-DCMAKE_BUILD_TYPE={}", self.config.build_type))
            .current_dir(&self.config.repo_root);
        cmd
    }

    fn build_command(&self, build_dir: &Path) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(&self.config.build_tool);
        cmd.arg("--build")
            .arg(build_dir)
            .arg("-j")
            .arg(self.config.build_jobs.to_string())
            .current_dir(&self.config.repo_root);
        cmd
    }
}

async fn run_phase(phase: BuildPhase, cmd: CommandBuilder) -> Result<(), BuildError> {
    debug!("Running the {phase} phase");
    let run = run_captured(cmd, None).await?;
    if run.status.success() {
        return Ok(());
    }
    Err(BuildError::BuildFailed {
        phase,
        diagnostics: diagnostics(&run),
    })
}

fn diagnostics(run: &CapturedRun) -> String {
    let stderr = run.stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = run.stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    format!("the build tool exited with {}", run.status)
}
