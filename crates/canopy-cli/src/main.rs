//! canopy - metadata deploys and package installs for a target org
//!
//! Usage:
//!   canopy deploy --deploy-dir force-app --wait 10
//!   canopy deploy --zip-file pkg.zip --check-only
//!   canopy deploy --job-id 0Af...               # resume reporting
//!   canopy install --package core --wait 10

mod prompt;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use canopy_core::client::rest::RestClient;
use canopy_core::context::AppContext;
use canopy_core::deploy::{self, DEPLOY_ERROR_EXIT_CODE, DeployOptions, MdDeploy};
use canopy_core::error::CanopyError;
use canopy_core::install::{InstallOptions, PackageInstall};
use canopy_core::poll::TokioSleeper;

use crate::prompt::TerminalPrompt;

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Deploy metadata and install packages to a target org", version)]
struct Cli {
    /// Username or alias of the target org (defaults to the configured
    /// default_org)
    #[arg(short = 'u', long, global = true)]
    target_org: Option<String>,

    /// Print the final result as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a metadata directory or archive to the target org
    Deploy(Box<DeployArgs>),

    /// Install a package version into the target org
    Install(Box<InstallArgs>),
}

#[derive(Args)]
struct DeployArgs {
    /// Directory of metadata to package and deploy
    #[arg(short = 'd', long, value_name = "DIR")]
    deploy_dir: Option<PathBuf>,

    /// Pre-built archive to deploy as-is
    #[arg(short = 'f', long, value_name = "FILE")]
    zip_file: Option<PathBuf>,

    /// Quick-deploy a previously validated request id
    #[arg(short = 'q', long, value_name = "ID")]
    validated_deploy_request_id: Option<String>,

    /// Resume reporting on an already submitted deploy job
    #[arg(long, value_name = "ID")]
    job_id: Option<String>,

    /// Minutes to wait for the deploy to finish (-1 waits until done)
    #[arg(short = 'w', long, allow_negative_numbers = true)]
    wait: Option<i64>,

    /// Proceed past component errors instead of rolling back
    #[arg(short = 'o', long)]
    ignore_errors: bool,

    /// Test level to run with the deploy
    #[arg(
        short = 'l',
        long,
        value_parser = ["NoTestRun", "RunSpecifiedTests", "RunLocalTests", "RunAllTestsInOrg"]
    )]
    test_level: Option<String>,

    /// Tests to run when the test level is RunSpecifiedTests
    #[arg(short = 'r', long, value_delimiter = ',', value_name = "TEST")]
    run_tests: Vec<String>,

    /// Update the package descriptor before deploying
    #[arg(long)]
    auto_update_package: bool,

    /// Deploy even if warnings are reported
    #[arg(short = 'g', long)]
    ignore_warnings: bool,

    /// Validate only; do not save deployed components
    #[arg(short = 'c', long)]
    check_only: bool,

    /// Treat the archive as a single package rather than a set
    #[arg(long)]
    single_package: bool,

    /// Permanently delete components removed by destructive changes
    #[arg(long)]
    purge_on_delete: bool,

    /// Submit over SOAP instead of REST
    #[arg(long)]
    soap_deploy: bool,
}

#[derive(Args)]
struct InstallArgs {
    /// Subscriber package version id (starts with 04t)
    #[arg(short = 'i', long, value_name = "ID")]
    id: Option<String>,

    /// Package alias from canopy.toml, or a literal 04t id
    #[arg(short = 'p', long, value_name = "ALIAS")]
    package: Option<String>,

    /// Installation key for key-protected packages
    #[arg(short = 'k', long, value_name = "KEY")]
    installation_key: Option<String>,

    /// Minutes to wait for the install to finish
    #[arg(short = 'w', long)]
    wait: Option<u64>,

    /// Minutes to wait for the package version to replicate
    #[arg(short = 'b', long)]
    publish_wait: Option<u64>,

    /// How removed metadata is handled on upgrade
    #[arg(
        short = 't',
        long,
        default_value = "Mixed",
        value_parser = ["Delete", "DeprecateOnly", "Mixed"]
    )]
    upgrade_type: String,

    /// Which apex gets recompiled after the install
    #[arg(short = 'a', long, default_value = "all", value_parser = ["all", "package"])]
    apex_compile: String,

    /// Who gets access to the installed package
    #[arg(
        short = 's',
        long,
        default_value = "AdminsOnly",
        value_parser = ["AllUsers", "AdminsOnly"]
    )]
    security_type: String,

    /// Map source profiles to target org profiles by name
    #[arg(long)]
    auto_map_profiles: bool,

    /// Answer yes to all confirmation prompts
    #[arg(long)]
    no_prompt: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let json = cli.json;
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err, json),
    }
}

fn init_tracing(json: bool) {
    let default_filter = if json { "canopy=warn" } else { "canopy=debug,info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = AppContext::resolve(cli.target_org.as_deref())?;
    let client = RestClient::new(ctx.org().clone())?;
    let sleeper = TokioSleeper;

    match cli.command {
        Commands::Deploy(args) => run_deploy(&ctx, &client, &sleeper, *args, cli.json).await,
        Commands::Install(args) => run_install(&ctx, &client, &sleeper, *args, cli.json).await,
    }
}

async fn run_deploy(
    ctx: &AppContext,
    client: &RestClient,
    sleeper: &TokioSleeper,
    args: DeployArgs,
    json: bool,
) -> Result<()> {
    let options = DeployOptions {
        deploy_dir: args.deploy_dir,
        zip_file: args.zip_file,
        validated_deploy_request_id: args.validated_deploy_request_id,
        job_id: args.job_id,
        wait: args.wait,
        rollback_on_error: None,
        ignore_errors: args.ignore_errors.then_some(true),
        test_level: args
            .test_level
            .as_deref()
            .map(str::parse::<canopy_core::deploy::TestLevel>)
            .transpose()?,
        run_tests: args.run_tests,
        auto_update_package: args.auto_update_package,
        ignore_warnings: args.ignore_warnings,
        check_only: args.check_only,
        single_package: args.single_package,
        purge_on_delete: args.purge_on_delete,
        soap_deploy: args.soap_deploy,
    };

    deploy::validate(&options)?;
    let record = MdDeploy::new(ctx, client, sleeper).deploy(&options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else if record.status.is_terminal() {
        println!("Deploy {} finished: {}", record.id, record.status);
    } else {
        println!(
            "Deploy {} is {}; resume with: canopy deploy --job-id {}",
            record.id, record.status, record.id
        );
    }
    Ok(())
}

async fn run_install(
    ctx: &AppContext,
    client: &RestClient,
    sleeper: &TokioSleeper,
    args: InstallArgs,
    json: bool,
) -> Result<()> {
    let options = InstallOptions {
        id: args.id,
        package: args.package,
        installation_key: args.installation_key,
        wait: args.wait,
        publish_wait: args.publish_wait,
        upgrade_type: args.upgrade_type.parse()?,
        apex_compile: args.apex_compile.parse()?,
        security_type: args.security_type.parse()?,
        auto_map_profiles: args.auto_map_profiles,
        no_prompt: args.no_prompt,
    };

    let terminal_prompt = TerminalPrompt::new();
    let record = PackageInstall::new(ctx, client, sleeper, &terminal_prompt)
        .execute(&options)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("Install request {} is {}", record.id, record.status);
    }
    Ok(())
}

/// Print the failure and pick the exit code: terminal deploy outcomes get
/// the fixed deploy-error code, everything else the generic failure code.
fn report_failure(err: &anyhow::Error, json: bool) -> ExitCode {
    eprintln!("{} {err:#}", style("error:").red().bold());

    let Some(canopy_err) = err.downcast_ref::<CanopyError>() else {
        return ExitCode::FAILURE;
    };
    if let Some(result) = canopy_err.deploy_result() {
        if json {
            if let Ok(payload) = serde_json::to_string_pretty(result) {
                println!("{payload}");
            }
        } else if let Some(message) = &result.error_message {
            eprintln!("{message}");
        }
    }
    if canopy_err.is_deploy_failure() {
        ExitCode::from(DEPLOY_ERROR_EXIT_CODE)
    } else {
        ExitCode::FAILURE
    }
}
