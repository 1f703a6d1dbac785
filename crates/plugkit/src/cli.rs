use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use plugkit_core::kernel::constants;
use plugkit_core::plugin_system::options;
use plugkit_core::plugin_system::{PluginManager, PluginStatus};

/// Column of option names in help listings
const OPTION_INDENT: usize = 4;
/// Column of option descriptions in help listings
const DESCRIPTION_INDENT: usize = 24;

/// Plugkit: loads the plugins found on the search paths and reports their state
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Settings file (.json, .toml, .yaml) with search paths and enablement overrides
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// How to print plugin states
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Log level, overriding RUST_LOG
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the runtime options and the options of every discovered plugin, then exit
    #[arg(long)]
    pub plugin_options: bool,

    /// Print the version of every discovered plugin, then exit
    #[arg(long)]
    pub plugin_versions: bool,

    /// Plugin runtime arguments, given after `--`
    /// (-pluginpath <dir>, -noload <plugin>, -load <plugin>, -profile, plugin options)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub runtime_args: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Installs env_logger, reading RUST_LOG unless a level was given
pub fn init_logging(level: Option<LogLevel>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = level {
        builder.filter_level(level.into());
    }
    // a logger may already be installed when embedded
    let _ = builder.try_init();
}

/// Runtime options followed by the options each plugin declares
pub fn render_option_help(manager: &PluginManager) -> String {
    let mut help = String::from("Runtime options (give them after --):\n");
    help.push_str(&options::format_options(OPTION_INDENT, DESCRIPTION_INDENT));
    help.push_str(&manager.format_plugin_options(OPTION_INDENT, DESCRIPTION_INDENT));
    help
}

/// Application version followed by one line per plugin
pub fn render_versions(manager: &PluginManager) -> String {
    format!(
        "{} {}\n\n{}",
        constants::APP_NAME,
        constants::APP_VERSION,
        manager.format_plugin_versions()
    )
}

/// Renders plugin states in the requested format
pub fn render_statuses(statuses: &[PluginStatus], format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(statuses),
        OutputFormat::Text => {
            if statuses.is_empty() {
                return Ok("No plugins found.".to_string());
            }
            let lines: Vec<String> = statuses
                .iter()
                .map(|status| {
                    let mut line = format!(
                        "  - Name: {}, Version: {}, State: {}",
                        status.name,
                        status.version,
                        status.state.label()
                    );
                    if !status.enabled {
                        line.push_str(" (disabled)");
                    }
                    if let Some(error) = &status.error {
                        line.push_str(&format!("\n      Error: {}", error.replace('\n', "\n      ")));
                    }
                    line
                })
                .collect();
            Ok(lines.join("\n"))
        }
    }
}
