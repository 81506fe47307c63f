mod cli; // Console reporting for runs

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{debug, info, warn};
use vantage_core::plugin_system::PluginKind;
use vantage_core::{
    InstanceId, ManagerCore, PluginRegistry, RunMode, SchemaDocument, ValidationSchema,
    ValidatorConfig,
};

use crate::cli::CliReporter;

/// Exit code of a run that completed with at least one failed check
const EXIT_FAILED: u8 = 1;
/// Exit code of an aborted run or an unusable schema/config
const EXIT_ABORTED: u8 = 2;

/// Vantage: run declarative validation schemas
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Log at debug level (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a schema
    Run(RunArgs),
    /// Print every stage of a schema with its path
    Inspect {
        /// Schema document (.json, .yaml, .yml or .toml)
        schema: PathBuf,
    },
    /// List the registered plugins
    Plugins,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Schema document (.json, .yaml, .yml or .toml)
    schema: PathBuf,

    /// Which stages run; overrides the config file
    #[arg(short, long)]
    mode: Option<RunMode>,

    /// Stage path targeted by the mode, e.g. `check[1]` (repeatable)
    #[arg(short, long = "target", value_name = "PATH")]
    targets: Vec<String>,

    /// Validator configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not print progress
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: bool, config_level: &str) {
    let default_level = if verbose { "debug" } else { config_level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

/// Registry with every statically linked plugin
fn build_registry() -> Result<PluginRegistry, String> {
    let mut registry = PluginRegistry::new();
    core_stages::register(&mut registry)
        .map_err(|e| format!("Failed to register core stages: {}", e))?;
    Ok(registry)
}

fn load_schema(path: &Path, registry: &PluginRegistry) -> Result<ValidationSchema, String> {
    let document = SchemaDocument::load(path)
        .map_err(|e| format!("Failed to load schema '{}': {}", path.display(), e))?;
    ValidationSchema::from_document(document, registry)
        .map_err(|e| format!("Failed to build schema '{}': {}", path.display(), e))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command-line arguments
    let args = CliArgs::parse();

    // The config file may set the log level, so it is read before logging starts
    let config = match &args.command {
        Commands::Run(RunArgs {
            config: Some(path), ..
        }) => match ValidatorConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config '{}': {}", path.display(), e);
                return ExitCode::from(EXIT_ABORTED);
            }
        },
        _ => ValidatorConfig::default(),
    };
    init_logging(args.verbose, &config.log_level);
    debug!("Parsed args: {:?}", args);

    let registry = match build_registry() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Fatal: {}", e);
            return ExitCode::from(EXIT_ABORTED);
        }
    };

    match args.command {
        Commands::Run(run) => run_schema(run, config, &registry).await,
        Commands::Inspect { schema } => inspect_schema(&schema, &registry),
        Commands::Plugins => list_plugins(&registry),
    }
}

async fn run_schema(args: RunArgs, config: ValidatorConfig, registry: &PluginRegistry) -> ExitCode {
    let schema = match load_schema(&args.schema, registry) {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_ABORTED);
        }
    };
    let targets = match args
        .targets
        .iter()
        .map(|path| schema.resolve(path))
        .collect::<Result<Vec<InstanceId>, _>>()
    {
        Ok(targets) => targets,
        Err(e) => {
            eprintln!("Invalid target: {}", e);
            return ExitCode::from(EXIT_ABORTED);
        }
    };
    let mode = args.mode.unwrap_or(config.run_mode);
    if mode != RunMode::All && targets.is_empty() {
        warn!("Run mode '{}' without targets enables no check group", mode);
    }

    let mut manager = ManagerCore::new(schema);
    let reporter = CliReporter::attach(&manager, config.print_progress && !args.quiet);

    // Ctrl-C asks the run to stop at its next suspension point
    let control = manager.control();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping validation");
            control.stop();
        }
    });

    info!("Running schema '{}' in mode '{}'", manager.schema().name, mode);
    let result = manager.run(mode, &targets).await;
    interrupt.abort();
    drop(reporter);

    let code = match result {
        Ok(true) => {
            println!("Validation passed");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("Validation failed: {}", manager.schema().finished().1);
            if config.fail_on_check_failure {
                ExitCode::from(EXIT_FAILED)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Validation aborted: {}", e);
            ExitCode::from(EXIT_ABORTED)
        }
    };
    manager.destroy();
    code
}

fn inspect_schema(path: &Path, registry: &PluginRegistry) -> ExitCode {
    let schema = match load_schema(path, registry) {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_ABORTED);
        }
    };

    println!("Schema '{}' ({} check group(s))", schema.name, schema.check_groups.len());
    schema.walk(&mut |location, node| {
        let status = if node.is_enabled() { "Enabled" } else { "Disabled" };
        println!(
            "  {:<24} {:<9} {:<20} {}",
            location.to_string(),
            node.kind().to_string(),
            node.name(),
            status
        );
    });
    ExitCode::SUCCESS
}

fn list_plugins(registry: &PluginRegistry) -> ExitCode {
    println!("Registered plugins:");
    for (name, kind) in registry.entries() {
        let description = describe(registry, &name, kind).unwrap_or_default();
        println!("  - {:<16} {:<9} {}", name, kind.to_string(), description);
    }
    ExitCode::SUCCESS
}

fn describe(registry: &PluginRegistry, name: &str, kind: PluginKind) -> Option<String> {
    let description = match kind {
        PluginKind::Context => registry.create_context(name).ok()?.description().to_string(),
        PluginKind::Selector => registry.create_selector(name).ok()?.description().to_string(),
        PluginKind::Check => registry.create_check(name).ok()?.description().to_string(),
        PluginKind::Resultor => registry.create_resultor(name).ok()?.description().to_string(),
    };
    Some(description)
}
