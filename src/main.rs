//! Stackpilot CLI entrypoint.
//!
//! This is the main entrypoint for the stackpilot command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use stackpilot::classify;
use stackpilot::cli::{Cli, Commands, LogFormat, OutputFormatter};
use stackpilot::config::{find_config_file, ConfigParser, ConfigValidator, DeployConfig};
use stackpilot::error::Result;
use stackpilot::gateway::types::{DeleteStackInput, DescribeStacksInput, DescribeStacksOutput};
use stackpilot::gateway::{call, AwsGateway, SharedGateway, CLOUDFORMATION};
use stackpilot::monitor::{
    MonitorOptions, MonitorTarget, OperationKind, StackHandle, StackMonitor,
};
use stackpilot::planner::ChangeSetPlanner;

use clap::Parser;
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_logging(verbose: bool, format: LogFormat) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Validate => cmd_validate(cli.config.as_ref(), &formatter),
        Commands::Plan { force } => cmd_plan(cli.config.as_ref(), force, &formatter).await,
        Commands::Monitor {
            operation,
            stack_id,
            disable_rollback,
            timeout,
        } => {
            cmd_monitor(
                cli.config.as_ref(),
                operation,
                stack_id,
                disable_rollback,
                timeout,
                &formatter,
            )
            .await
        }
        Commands::Remove { yes } => cmd_remove(cli.config.as_ref(), yes, &formatter).await,
    }
}

/// Validate configuration.
fn cmd_validate(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_dir(&config_file));
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    let result = ConfigValidator::new().check(&config);

    emit(formatter, &formatter.format_validation(&config, &result))?;

    // Surface the first error as the exit status
    ConfigValidator::new().validate(&config)?;
    Ok(())
}

/// Preview a deployment through a change set.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    force: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, base_dir) = load_config(config_path)?;
    let gateway = create_gateway(&config).await;

    let planner = ChangeSetPlanner::from_config(gateway, &config, base_dir, force);
    let outcome = planner.plan().await?;

    emit(formatter, &formatter.format_plan(&outcome))
}

/// Follow an in-flight stack operation.
async fn cmd_monitor(
    config_path: Option<&PathBuf>,
    operation: OperationKind,
    stack_id: Option<String>,
    disable_rollback: bool,
    timeout: Option<u64>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let gateway = create_gateway(&config).await;

    let options = MonitorOptions::new(
        Duration::from_millis(config.monitor.poll_interval_ms),
        config.monitor.verbose,
        disable_rollback || config.monitor.disable_rollback,
        timeout.or(config.monitor.timeout_secs).map(Duration::from_secs),
    )?;

    let stack_name = config.stack_name();
    let handle = stack_id.map_or_else(
        || StackHandle::from_name(stack_name.clone()),
        |id| StackHandle::new(id, stack_name.clone()),
    );

    let monitor = StackMonitor::new(gateway, options);
    let outcome = monitor
        .attach(operation, &MonitorTarget::Stack(handle))
        .await?;

    emit(formatter, &formatter.format_monitor(&stack_name, operation, &outcome))
}

/// Delete the stack and wait for the deletion to finish.
async fn cmd_remove(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let gateway = create_gateway(&config).await;
    let stack_name = config.stack_name();

    let described: std::result::Result<DescribeStacksOutput, _> = call(
        gateway.as_ref(),
        CLOUDFORMATION,
        "describeStacks",
        DescribeStacksInput {
            stack_name: stack_name.clone(),
        },
    )
    .await;

    let target = match described {
        Ok(output) => {
            let id = output
                .stacks
                .into_iter()
                .next()
                .and_then(|stack| stack.stack_id)
                .unwrap_or_else(|| stack_name.clone());
            MonitorTarget::Stack(StackHandle::new(id, stack_name.clone()))
        }
        Err(e) if classify::is_stack_missing(&e) => {
            debug!("Stack {stack_name} not found: {e}");
            MonitorTarget::AlreadySettled
        }
        Err(e) => return Err(e.into()),
    };

    if let MonitorTarget::Stack(handle) = &target {
        // Confirm
        if !auto_approve {
            eprint!("Stack {} will be deleted. Continue? [y/N] ", handle.name);
            std::io::stderr().flush()?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                eprintln!("Removal cancelled.");
                return Ok(());
            }
        }

        let _: Value = call(
            gateway.as_ref(),
            CLOUDFORMATION,
            "deleteStack",
            DeleteStackInput {
                stack_name: handle.id.clone(),
                role_arn: config.provider.role_arn.clone(),
            },
        )
        .await?;
    }

    let options = MonitorOptions::from_config(&config.monitor)?;
    let monitor = StackMonitor::new(gateway, options);
    let outcome = monitor.monitor(OperationKind::Delete, &target).await?;

    emit(
        formatter,
        &formatter.format_monitor(&stack_name, OperationKind::Delete, &outcome),
    )
}

// ============================================================================
// Helper functions
// ============================================================================

/// Writes command output: JSON to stdout, text to stderr.
fn emit(formatter: &OutputFormatter, output: &str) -> Result<()> {
    if formatter.is_json() {
        writeln!(std::io::stdout(), "{output}")?;
    } else {
        eprintln!("{output}");
    }
    Ok(())
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Returns the directory holding the configuration file.
fn config_dir(config_file: &Path) -> PathBuf {
    config_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Loads and validates the configuration.
///
/// Returns the configuration along with the directory holding it. The parser
/// resolves a relative template path against that directory.
fn load_config(config_path: Option<&PathBuf>) -> Result<(DeployConfig, PathBuf)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let base_dir = config_dir(&config_file);
    let parser = ConfigParser::new().with_base_path(&base_dir);
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;

    // Validate
    let validator = ConfigValidator::new();
    for warning in validator.validate(&config)?.warnings {
        debug!("Configuration warning: {warning}");
    }

    Ok((config, base_dir))
}

/// Creates the AWS-backed gateway for the configured region.
async fn create_gateway(config: &DeployConfig) -> SharedGateway {
    Arc::new(AwsGateway::new(config.region.as_deref()).await)
}
