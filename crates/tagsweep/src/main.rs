//! tagsweep: tear down every AWS resource carrying a given tag
//!
//! Discovers tagged resources through the Resource Groups Tagging API and
//! IAM, then destroys each one in dependency order. Dry-run is the default;
//! pass `--execute` to make changes.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use std::time::Duration;
use tagsweep::aws::{AccountId, AwsContext, get_current_account_id};
use tagsweep::orchestrator::Orchestrator;
use tagsweep::router::{self, RegionFilter};
use tagsweep::{config, discovery, registry, summary};
use tagsweep_common::Arn;
use tagsweep_common::defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_KMS_PENDING_WINDOW_DAYS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_REGION, DEFAULT_RETRY_DELAY_SECS,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "tagsweep")]
#[command(about = "Tear down AWS resources by tag")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Arguments for the destroy command (extracted to reduce enum size)
#[derive(clap::Args, Debug)]
struct DestroyArgs {
    /// Tag key identifying the resources to tear down
    #[arg(long)]
    tag_key: String,

    /// Tag value identifying the resources to tear down
    #[arg(long)]
    tag_value: String,

    /// AWS region
    #[arg(long, default_value = DEFAULT_REGION)]
    region: String,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long)]
    aws_profile: Option<String>,

    /// Actually delete resources (default is dry-run)
    #[arg(long)]
    execute: bool,

    /// Output JSON file for the step reports
    #[arg(short, long)]
    output: Option<String>,

    /// Number of resources torn down at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Skip ARNs whose region differs from --region
    #[arg(long)]
    target_region_only: bool,

    /// Attempts per mutating call
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Seconds between attempts
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    retry_delay_secs: u64,

    /// KMS key deletion pending window in days (7-30)
    #[arg(long, default_value_t = DEFAULT_KMS_PENDING_WINDOW_DAYS,
          value_parser = clap::value_parser!(i32).range(7..=30))]
    kms_pending_window_days: i32,
}

impl From<DestroyArgs> for config::TeardownConfig {
    fn from(args: DestroyArgs) -> Self {
        Self {
            target: config::TargetConfig {
                tag_key: args.tag_key,
                tag_value: args.tag_value,
                region: args.region,
                aws_profile: args.aws_profile,
            },
            retry: tagsweep::retry::RetryPolicy {
                max_attempts: args.max_attempts,
                delay: Duration::from_secs(args.retry_delay_secs),
            },
            flags: config::RuntimeFlags {
                dry_run: !args.execute,
                concurrency: args.concurrency,
                region_filter: if args.target_region_only {
                    RegionFilter::TargetOnly
                } else {
                    RegionFilter::Disabled
                },
                kms_pending_window_days: args.kms_pending_window_days,
                output: args.output,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tear down every resource carrying the tag
    Destroy(Box<DestroyArgs>),

    /// List tagged resources and the handler each would be routed to
    Scan {
        #[arg(long)]
        tag_key: String,

        #[arg(long)]
        tag_value: String,

        /// AWS region to scan
        #[arg(long, default_value = DEFAULT_REGION)]
        region: String,

        /// AWS profile to use (overrides AWS_PROFILE env var)
        #[arg(long)]
        aws_profile: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// List the supported resource types
    Handlers,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

async fn run() -> Result<()> {
    // Filter out bare "--" args that cargo-make may pass
    let filtered_args: Vec<String> = std::env::args().filter(|a| a != "--").collect();
    let args = Args::parse_from(filtered_args);

    // Reduce noise from AWS SDK (show only warnings and errors)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
                .add_directive("aws_config=warn".parse()?)
                .add_directive("aws_sdk=warn".parse()?)
                .add_directive("aws_smithy=warn".parse()?),
        )
        .init();

    match args.command {
        Command::Destroy(destroy_args) => {
            let config: config::TeardownConfig = (*destroy_args).into();
            handle_destroy(config).await?;
        }

        Command::Scan {
            tag_key,
            tag_value,
            region,
            aws_profile,
            format,
        } => {
            handle_scan(&tag_key, &tag_value, &region, aws_profile.as_deref(), format).await?;
        }

        Command::Handlers => print_handlers(),
    }

    Ok(())
}

/// Cancel `token` on Ctrl-C. In-flight calls finish; no new resources start.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight steps");
            token.cancel();
        }
    });
}

/// Drop ARNs that name a different account than the caller's
fn retain_owned(arns: Vec<String>, account: &AccountId) -> Vec<String> {
    arns.into_iter()
        .filter(|arn| {
            let owned = Arn::parse(arn.as_str()).map_or(true, |parsed| account.owns(parsed.account()));
            if !owned {
                warn!(arn = %arn, account = %account, "Skipping ARN owned by another account");
            }
            owned
        })
        .collect()
}

/// Handle the destroy command
async fn handle_destroy(config: config::TeardownConfig) -> Result<()> {
    if let Some(profile) = &config.target.aws_profile {
        info!(profile = %profile, "Using AWS profile");
    }

    let aws = AwsContext::new(config.region(), config.target.aws_profile.as_deref()).await;
    let account = get_current_account_id(&aws).await?;

    info!(
        tag_key = %config.target.tag_key,
        tag_value = %config.target.tag_value,
        region = %config.region(),
        dry_run = config.dry_run(),
        "Starting teardown"
    );
    if config.dry_run() {
        info!("Dry run: no changes will be made (pass --execute to delete)");
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let arns = discovery::discover(
        &aws,
        config.region(),
        &config.target.tag_key,
        &config.target.tag_value,
    )
    .await?;
    let arns = retain_owned(arns, &account);

    let orchestrator = Orchestrator::new(&aws, &config, cancel);
    let reports = orchestrator.process_resources(&arns, config.region()).await?;

    summary::print_summary(&reports, config.dry_run());
    summary::write_report(&config, &reports)?;

    let failed = reports.iter().filter(|r| !r.succeeded()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} resource(s) were not fully torn down", failed, reports.len());
    }
    Ok(())
}

/// Handle the scan command
async fn handle_scan(
    tag_key: &str,
    tag_value: &str,
    region: &str,
    aws_profile: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    info!(tag_key = %tag_key, tag_value = %tag_value, region = %region, "Scanning for tagged resources");

    let aws = AwsContext::new(region, aws_profile).await;
    let arns = discovery::discover(&aws, region, tag_key, tag_value).await?;
    let routes = router::route(&arns, region, RegionFilter::Disabled);

    if routes.is_empty() {
        println!("No resources tagged {tag_key}={tag_value} found.");
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&routes)?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL_CONDENSED)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![Cell::new("Kind"), Cell::new("ARN")]);
            for route in &routes {
                table.add_row(vec![Cell::new(route.kind), Cell::new(&route.arn)]);
            }
            println!("{table}");
        }
    }

    Ok(())
}

fn print_handlers() {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_header(vec![Cell::new("Service"), Cell::new("Resource type")]);
    for service in registry::services() {
        for (resource_type, _) in service.resources {
            table.add_row(vec![Cell::new(service.service_type), Cell::new(resource_type)]);
        }
    }
    println!("{table}");
}
