//! Mod Asset Builder CLI
//!
//! Commands: build, plan, licenses
//! Outputs JSON to stdout, the log trail to stderr on failure
//! Returns non-zero on any fatal condition

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use modassets_core::{
    logging::init_tracing,
    mod_config::MOD_CONFIG_FILENAME,
    pipeline::{BUILDABLE_ASSETS_PATH, BUILT_ASSETS_PATH},
    AssetPipeline, BuildError, ErrorCategory, PipelineSettings,
};

#[derive(Parser)]
#[command(name = "modassets-cli")]
#[command(about = "Mod Asset Builder - turns an asset manifest into packaged images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding source images and the asset manifest
    #[arg(short, long, default_value = BUILDABLE_ASSETS_PATH)]
    assets_root: PathBuf,

    /// Manifest file name, relative to the assets root
    #[arg(short, long, default_value = "assets-config.yml")]
    manifest: PathBuf,

    /// Root for build output directories
    #[arg(short, long, default_value = BUILT_ASSETS_PATH)]
    output_root: PathBuf,

    /// Mod metadata file supplying $mod.*$ and $build.*$ placeholders
    #[arg(long, default_value = MOD_CONFIG_FILENAME)]
    mod_config: PathBuf,

    /// Run without mod metadata
    #[arg(long)]
    no_mod_config: bool,

    /// Log every event, not just warnings
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline and write outputs
    Build,

    /// Resolve the build graph and list outputs without writing
    Plan,

    /// List each asset's resolved license
    Licenses,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = PipelineSettings {
        assets_root: cli.assets_root,
        manifest_file: cli.manifest,
        output_root: cli.output_root,
        mod_config: (!cli.no_mod_config).then_some(cli.mod_config),
    };
    let mut pipeline = AssetPipeline::new(settings);

    let result = match cli.command {
        Commands::Build => pipeline.build().and_then(|report| print_json(&report)),
        Commands::Plan => pipeline.plan().and_then(|plan| {
            let outputs: Vec<_> = plan.outputs().collect();
            print_json(&outputs)
        }),
        Commands::Licenses => pipeline.licenses().and_then(|licenses| print_json(&licenses)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let output = serde_json::json!({
                "success": false,
                "error": e.to_string(),
                "category": e.category(),
            });
            println!("{}", output);
            for event in pipeline.trail().events() {
                eprintln!("[{:?}] {}: {}", event.severity, event.phase, event.message);
            }
            exit_code(&e)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), BuildError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(error: &BuildError) -> ExitCode {
    match error.category() {
        ErrorCategory::Io => ExitCode::FAILURE,
        _ => ExitCode::from(2), // Build failure
    }
}
