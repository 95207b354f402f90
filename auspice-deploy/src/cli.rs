/// This module implements the full CLI interface for auspice-deploy—handling
/// argument parsing, flag validation and user-visible invocations.
///
/// All core business logic (key construction, tree annotation, the promotion
/// workflow) lives in the [`auspice-deploy-core`] crate. This module is
/// strictly for CLI glue and orchestration.
///
/// ## Features
/// - Entry struct [`Cli`] defines all user-facing flags (see below).
/// - Async entrypoint (`run`) for programmatic invocation and integration
///   testing; [`run_with_store`] accepts any `ObjectStore` so tests can pass
///   a fake.
/// - Per-build outcome reporting and a non-zero exit status if any build
///   failed.
///
/// ## How To Use
/// - For command-line users: use the installed `auspice-deploy` binary with
///   `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed
///   [`Cli`].
///
/// [`auspice-deploy-core`]: ../../auspice-deploy-core/
use anyhow::Result;
use clap::Parser;

use auspice_deploy_core::contract::ObjectStore;
use auspice_deploy_core::deploy::{deploy, BuildOutcome, DatedOutcome, DeployConfig};
use auspice_deploy_core::store::AwsCliStore;

/// Deploy builds from staging to production, generate dated builds where each
/// node has a random id.
#[derive(Parser)]
#[clap(name = "auspice-deploy", version)]
pub struct Cli {
    /// Prefix to builds
    #[clap(long)]
    pub prefix: String,

    /// Build names to upload
    #[clap(long = "build-names", num_args = 1.., required = true)]
    pub build_names: Vec<String>,

    /// Force overwrite of existing dated builds
    #[clap(short = 'f', long)]
    pub force: bool,

    /// Do not deploy dated build
    #[clap(long)]
    pub no_dated: bool,

    /// Deploy local files to staging
    #[clap(long)]
    pub staging: bool,
}

impl Cli {
    fn into_config(self) -> DeployConfig {
        let mut config = DeployConfig::new(self.prefix, self.build_names);
        config.force = self.force;
        config.no_dated = self.no_dated;
        config.staging = self.staging;
        config
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");
    let config = cli.into_config();
    let store = AwsCliStore::new();
    run_with_store(&config, &store).await
}

/// Deploy against any store implementation and map the report to an exit
/// status: non-zero if any build failed.
pub async fn run_with_store<S>(config: &DeployConfig, store: &S) -> Result<()>
where
    S: ObjectStore,
{
    let report = deploy(config, store).await;
    for build in &report.builds {
        match &build.outcome {
            BuildOutcome::Promoted { dated } => {
                let dated = match dated {
                    DatedOutcome::Created => "dated snapshot created",
                    DatedOutcome::SkippedExisting => "dated snapshot skipped (already exists)",
                    DatedOutcome::NotRequested => "dated snapshot not requested",
                };
                tracing::info!(build = %build.build_name, dated, "Build promoted to production");
            }
            BuildOutcome::PushedToStaging => {
                tracing::info!(build = %build.build_name, "Build pushed to staging");
            }
            BuildOutcome::Failed(e) => {
                tracing::error!(build = %build.build_name, error = %e, "Build failed");
            }
        }
    }
    if report.any_failed() {
        anyhow::bail!("one or more builds failed to deploy");
    }
    Ok(())
}
