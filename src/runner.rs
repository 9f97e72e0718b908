use tracing::{info, warn};

use crate::checker::{Checker, Verification};
use crate::config::{FailurePolicy, RunConfig};
use crate::errors::{CheckError, IoOp};

/// Outcome of every iteration that ran
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Verification of each iteration, in order
    pub results: Vec<Verification>,
}

impl RunReport {
    /// Whether every iteration that ran passed
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(Verification::is_success)
    }

    /// First failed iteration and its verification
    pub fn first_failure(&self) -> Option<(usize, Verification)> {
        self.results
            .iter()
            .copied()
            .enumerate()
            .find(|(_, v)| !v.is_success())
    }

    /// Number of failed iterations
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|v| !v.is_success()).count()
    }
}

/// Run `config.iterations` checks in `config.dir`.
///
/// The directory is created if needed and removed afterwards unless
/// `keep_dir` is set. A failed verification ends the run early under
/// [`FailurePolicy::Abort`]; an I/O or setup error always does.
///
/// [`FailurePolicy::Abort`]: enum.FailurePolicy.html#variant.Abort
pub async fn run_iterations(config: &RunConfig) -> Result<RunReport, CheckError> {
    run_iterations_with(config, |_| ()).await
}

/// [`run_iterations`], calling `progress` with the index of every iteration
/// before it starts
///
/// [`run_iterations`]: fn.run_iterations.html
pub async fn run_iterations_with<F>(
    config: &RunConfig,
    progress: F,
) -> Result<RunReport, CheckError>
where
    F: FnMut(usize),
{
    tokio::fs::create_dir_all(&config.dir)
        .await
        .map_err(CheckError::io(IoOp::CreateDir, &config.dir))?;

    let checker = Checker::new(config.check.clone())?;
    let outcome = run_with(&checker, config, progress).await;
    checker.close().await;

    if !config.keep_dir {
        if let Err(e) = tokio::fs::remove_dir(&config.dir).await {
            warn!(dir = %config.dir.display(), "could not remove working directory: {}", e);
        }
    }

    outcome
}

async fn run_with<F>(
    checker: &Checker,
    config: &RunConfig,
    mut progress: F,
) -> Result<RunReport, CheckError>
where
    F: FnMut(usize),
{
    let mut report = RunReport::default();

    for iteration in 0..config.iterations {
        info!("iteration {}", iteration);
        progress(iteration);

        let verification = checker.run_check(&config.dir).await?;
        report.results.push(verification);

        if !verification.is_success() {
            warn!(iteration, "check failed: {}", verification);

            if config.policy == FailurePolicy::Abort {
                break;
            }
        }
    }

    Ok(report)
}
