//! Command-line options of the plugin runtime.
//!
//! Parsing happens in two phases. [`extract_plugin_paths`] runs before
//! discovery and takes out every `-pluginpath <dir>`. [`OptionsParser`] runs
//! after discovery and before resolution, when the declared plugin
//! arguments are known:
//!
//! - `-noload <plugin>` / `-load <plugin>`: disable or enable a plugin
//!   (`all` names every plugin);
//! - `-profile`: log the duration of every lifecycle transition;
//! - any argument declared in a descriptor's argument list, followed by a
//!   value when the declaration names a parameter;
//! - `--` ends option processing.
//!
//! Everything not starting with `-` is a free argument.
// crates/plugkit-core/src/plugin_system/options.rs
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::plugin_system::error::OptionsError;
use crate::plugin_system::registry::PluginRegistry;

pub const PLUGIN_PATH_OPTION: &str = "-pluginpath";
pub const NO_LOAD_OPTION: &str = "-noload";
pub const LOAD_OPTION: &str = "-load";
pub const PROFILE_OPTION: &str = "-profile";
pub const END_OF_OPTIONS: &str = "--";
const ALL_PLUGINS: &str = "all";

/// Appends one help line: the option and its `<parameter>` indented by
/// `option_indent`, then the description starting at column
/// `description_indent`, or one space further when the option is too long.
pub fn format_option(
    out: &mut String,
    option: &str,
    parameter: Option<&str>,
    description: &str,
    option_indent: usize,
    description_indent: usize,
) {
    let mut head = format!("{:option_indent$}{option}", "");
    if let Some(parameter) = parameter {
        let _ = write!(head, " <{parameter}>");
    }
    let padding = description_indent.saturating_sub(head.chars().count()).max(1);
    let _ = writeln!(out, "{head}{:padding$}{}", "", description.trim());
}

/// Help text for the runtime's own options
pub fn format_options(option_indent: usize, description_indent: usize) -> String {
    let mut out = String::new();
    let options = [
        (PLUGIN_PATH_OPTION, Some("dir"), "Also search <dir> for plugins"),
        (LOAD_OPTION, Some("plugin"), "Load <plugin>, or every plugin with 'all'"),
        (NO_LOAD_OPTION, Some("plugin"), "Do not load <plugin>, or any plugin with 'all'"),
        (PROFILE_OPTION, None, "Profile plugin loading"),
    ];
    for (option, parameter, description) in options {
        format_option(&mut out, option, parameter, description, option_indent, description_indent);
    }
    out
}

/// Takes every `-pluginpath <dir>` out of `args`. Returns the paths and the
/// remaining arguments in their original order.
pub fn extract_plugin_paths(args: &[String]) -> Result<(Vec<PathBuf>, Vec<String>), OptionsError> {
    let mut paths = Vec::new();
    let mut rest = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == END_OF_OPTIONS {
            rest.push(arg.clone());
            rest.extend(iter.cloned());
            break;
        }
        if arg == PLUGIN_PATH_OPTION {
            let dir = iter
                .next()
                .ok_or_else(|| OptionsError::RequiresArgument(arg.clone()))?;
            paths.push(PathBuf::from(dir));
        } else {
            rest.push(arg.clone());
        }
    }
    Ok((paths, rest))
}

/// An enable or disable request from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enablement {
    Enable(usize),
    Disable(usize),
}

/// Result of parsing the runtime command line.
///
/// Nothing is applied to the registry until [`ParsedOptions::apply`], so a
/// malformed command line leaves every descriptor as it was.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOptions {
    pub free_arguments: Vec<String>,
    pub profile: bool,
    /// `-pluginpath` given after discovery; only used by the next discovery
    pub plugin_paths: Vec<PathBuf>,
    /// Enablement changes in command-line order
    pub enablement: Vec<Enablement>,
    /// Plugin-scoped arguments, keyed by descriptor index
    pub plugin_arguments: Vec<(usize, String)>,
}

impl ParsedOptions {
    /// Applies enablement changes and hands plugin arguments to their plugins
    pub fn apply(&self, registry: &mut PluginRegistry) {
        for change in &self.enablement {
            let (index, enabled) = match *change {
                Enablement::Enable(index) => (index, true),
                Enablement::Disable(index) => (index, false),
            };
            if let Some(descriptor) = registry.get_mut(index) {
                log::debug!(
                    "Plugin '{}' {} on the command line",
                    descriptor.name,
                    if enabled { "enabled" } else { "disabled" }
                );
                descriptor.set_enabled(enabled);
            }
        }
        for (index, argument) in &self.plugin_arguments {
            if let Some(descriptor) = registry.get_mut(*index) {
                descriptor.add_argument_passed(argument.clone());
            }
        }
    }
}

/// Parses the runtime command line against the discovered plugins
pub struct OptionsParser<'a> {
    args: &'a [String],
    registry: &'a PluginRegistry,
}

impl<'a> OptionsParser<'a> {
    pub fn new(args: &'a [String], registry: &'a PluginRegistry) -> Self {
        Self { args, registry }
    }

    pub fn parse(&self) -> Result<ParsedOptions, OptionsError> {
        let mut parsed = ParsedOptions::default();
        let mut iter = self.args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                END_OF_OPTIONS => {
                    parsed.free_arguments.extend(iter.cloned());
                    break;
                }
                NO_LOAD_OPTION | LOAD_OPTION => {
                    let name = iter
                        .next()
                        .ok_or_else(|| OptionsError::RequiresArgument(arg.clone()))?;
                    let enable = arg == LOAD_OPTION;
                    for index in self.plugins_named(name)? {
                        parsed.enablement.push(if enable {
                            Enablement::Enable(index)
                        } else {
                            Enablement::Disable(index)
                        });
                    }
                }
                PROFILE_OPTION => parsed.profile = true,
                PLUGIN_PATH_OPTION => {
                    let dir = iter
                        .next()
                        .ok_or_else(|| OptionsError::RequiresArgument(arg.clone()))?;
                    parsed.plugin_paths.push(PathBuf::from(dir));
                }
                option if option.starts_with('-') => {
                    let (index, takes_value) = self
                        .declared_argument(option)
                        .ok_or_else(|| OptionsError::UnknownOption(option.to_string()))?;
                    parsed.plugin_arguments.push((index, option.to_string()));
                    if takes_value {
                        let value = iter
                            .next()
                            .ok_or_else(|| OptionsError::RequiresArgument(option.to_string()))?;
                        parsed.plugin_arguments.push((index, value.clone()));
                    }
                }
                _ => parsed.free_arguments.push(arg.clone()),
            }
        }

        Ok(parsed)
    }

    /// Indices addressed by a plugin name on the command line
    fn plugins_named(&self, name: &str) -> Result<Vec<usize>, OptionsError> {
        if name == ALL_PLUGINS {
            return Ok((0..self.registry.len()).collect());
        }
        self.registry
            .find(name)
            .map(|index| vec![index])
            .ok_or_else(|| OptionsError::UnknownPlugin(name.to_string()))
    }

    /// The first plugin declaring `option`, and whether it takes a value
    fn declared_argument(&self, option: &str) -> Option<(usize, bool)> {
        self.registry
            .iter()
            .enumerate()
            .find_map(|(index, descriptor)| {
                descriptor
                    .argument(option)
                    .map(|declared| (index, declared.parameter.is_some()))
            })
    }
}
