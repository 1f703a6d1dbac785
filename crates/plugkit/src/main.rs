mod cli; // Declare the cli module

use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use plugkit_core::kernel::bootstrap::Application;
use plugkit_core::storage::PluginSettings;
use plugkit_core::KernelError;

use cli::CliArgs;

/// Exit code for a malformed command line or settings file
const USAGE_ERROR: u8 = 2;

fn exit_code_for(error: &KernelError) -> ExitCode {
    if error.as_options_error().is_some() {
        ExitCode::from(USAGE_ERROR)
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    cli::init_logging(args.log_level);

    let mut app = Application::new();
    if let Some(path) = &args.settings {
        match PluginSettings::load(path) {
            Ok(settings) => app = app.with_settings(settings),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(USAGE_ERROR);
            }
        }
    }

    if args.plugin_options || args.plugin_versions {
        if let Err(e) = app.discover(&args.runtime_args).await {
            eprintln!("Error: {}", e);
            return exit_code_for(&e);
        }
        if args.plugin_options {
            print!("{}", cli::render_option_help(app.plugin_manager()));
        }
        if args.plugin_versions {
            print!("{}", cli::render_versions(app.plugin_manager()));
        }
        return ExitCode::SUCCESS;
    }

    let report = match app.start(&args.runtime_args).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_code_for(&e);
        }
    };
    info!(
        "Discovered {} plugin(s), {} running",
        report.discovered,
        report.load.running.len()
    );
    if !report.free_arguments.is_empty() {
        info!("Unused arguments: {}", report.free_arguments.join(" "));
    }

    match cli::render_statuses(&app.statuses(), args.format) {
        Ok(output) => println!("{}", output),
        Err(e) => error!("Failed to render plugin states: {}", e),
    }

    if let Err(e) = app.shutdown() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
