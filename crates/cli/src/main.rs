//! CLI entry point for fetal brain segmentation inference planning
//!
//! Loads the inference configuration, prepares the inference plan and prints it.

use fbs_config::Config;
use fbs_inference::{CheckpointResolver, InferencePlan, PlanOptions};
use clap::Parser;
use std::fmt::Display;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Fetal brain segmentation - validate an inference configuration and show the derived plan
#[derive(Parser, Debug)]
#[command(name = "fbs-seg")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the inference configuration file
    #[arg(short, long, default_value = "config/monai_dynUnet_inference_config.yml")]
    config: PathBuf,

    /// Directory holding the bundled checkpoint (defaults to $FBS_MODELS_DIR or ./models)
    #[arg(short, long)]
    models_dir: Option<PathBuf>,

    /// Compute device: cpu or cuda:<index>
    #[arg(short, long, default_value = "cpu")]
    device: String,

    /// Ignore FBS_* environment overrides
    #[arg(long, default_value = "false")]
    no_env: bool,

    /// Do not require the checkpoint file to exist
    #[arg(long, default_value = "false")]
    skip_checkpoint_check: bool,

    /// Print the plan as JSON instead of text
    #[arg(long, default_value = "false")]
    json: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    debug!(config = %args.config.display(), "loading configuration");

    let config = if args.no_env {
        Config::load(&args.config)
    } else {
        Config::load_with_env(&args.config)
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => return fail("Failed to load configuration", &e),
    };

    let options = PlanOptions {
        models_dir: CheckpointResolver::models_dir_from(args.models_dir.as_deref()),
        device: args.device.clone(),
        available_cores: None,
        require_checkpoint: !args.skip_checkpoint_check,
    };

    let plan = match InferencePlan::prepare(&config, &options) {
        Ok(plan) => plan,
        Err(e) => return fail("Failed to prepare inference plan", &e),
    };

    if args.json {
        match plan.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => return fail("Failed to serialize plan", &e),
        }
        return ExitCode::SUCCESS;
    }

    match config.to_yaml() {
        Ok(yaml) => {
            println!("Config file: {}", args.config.display());
            print!("{}", yaml);
        }
        Err(e) => return fail("Failed to serialize configuration", &e),
    }

    print_plan(&plan);
    ExitCode::SUCCESS
}

fn failure_message(context: &str, err: &dyn Display) -> String {
    format!("Error: {}: {}", context, err)
}

/// Report a fatal error on stderr, independent of the log filter
fn fail(context: &str, err: &dyn Display) -> ExitCode {
    eprintln!("{}", failure_message(context, err));
    ExitCode::FAILURE
}

fn print_plan(plan: &InferencePlan) {
    println!();
    println!("Device: {}", plan.device.compute);
    if plan.device.in_process_loading {
        println!("Data loading: main thread");
    } else {
        println!(
            "Data loading: {} workers ({} cores available)",
            plan.device.loader_workers, plan.device.available_cores
        );
    }
    println!(
        "Checkpoint: {} ({:?})",
        plan.checkpoint.path.display(),
        plan.checkpoint.source
    );
    println!("Output channels: {}", plan.nr_out_channels);
    println!("Batch size: {}", plan.batch_size);
    println!("Patch size: {:?}", plan.patch_size);
    println!("Target spacing: {:?}", plan.target_spacing.as_array());
    println!("Kernels: {:?}", plan.topology.kernels);
    println!("Strides: {:?}", plan.topology.strides);
    println!(
        "Downsampling factor: {:?}{}",
        plan.topology.downsampling_factor(),
        if plan.patch_divisible { "" } else { " (patch size not divisible)" }
    );
    println!("Probability threshold: {}", plan.binarizer.threshold());
}
