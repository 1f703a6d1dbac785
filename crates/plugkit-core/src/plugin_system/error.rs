//! # Plugkit Plugin System Errors
//!
//! Defines error types specific to the plugin system.
//!
//! - [`DescriptorError`]: a descriptor file could not be read or parsed. Parse
//!   errors always carry the file path and a 1-based line and column.
//! - [`ResolutionError`]: a dependency could not be matched, a cycle was found,
//!   or a required provider was already excluded.
//! - [`LifecycleError`]: a state transition failed or was attempted out of
//!   order. The `Display` text of each variant is exactly what gets recorded
//!   on the descriptor.
//! - [`OptionsError`]: the plugin runtime's command line was malformed.
//!
//! [`PluginSystemError`] wraps the ones that abort an operation for
//! propagation into the kernel error. Resolution and lifecycle failures are
//! recorded per plugin instead.
// crates/plugkit-core/src/plugin_system/error.rs
use std::path::PathBuf;

use thiserror::Error;

/// What went wrong while reading a descriptor document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("'{element}' misses attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    #[error("'{0}' has invalid format")]
    InvalidFormat(String),

    #[error("Invalid element '{0}'")]
    InvalidElement(String),

    #[error("Unexpected closing element '{0}'")]
    UnexpectedClosingElement(String),

    #[error("Unexpected token")]
    UnexpectedToken,

    #[error("Expected element '{expected}' as top level element")]
    UnexpectedTopLevelElement { expected: String },
}

/// Failure to produce a descriptor from a descriptor file.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Cannot open file {} for reading: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing file {}: {kind}, at line {line}, column {column}", .path.display())]
    Parse {
        path: PathBuf,
        line: u32,
        column: u32,
        kind: ParseErrorKind,
    },
}

impl DescriptorError {
    /// The parse failure kind, `None` for I/O failures.
    pub fn kind(&self) -> Option<&ParseErrorKind> {
        match self {
            DescriptorError::Parse { kind, .. } => Some(kind),
            DescriptorError::Io { .. } => None,
        }
    }

    /// 1-based `(line, column)` of a parse failure.
    pub fn position(&self) -> Option<(u32, u32)> {
        match self {
            DescriptorError::Parse { line, column, .. } => Some((*line, *column)),
            DescriptorError::Io { .. } => None,
        }
    }
}

/// Per-plugin failure found while resolving the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// No discovered descriptor provides the required name and version.
    #[error("Could not resolve dependency '{dependency}'")]
    UnresolvedDependency { plugin: String, dependency: String },

    /// The plugin participates in a dependency cycle. `report` is the full
    /// multi-line cycle description.
    #[error("{report}")]
    CircularDependency { plugin: String, report: String },

    /// A required provider was excluded earlier in the same resolution pass.
    #[error("Cannot load plugin because dependency failed to load: {dependency}\nReason: {reason}")]
    DependencyFailed {
        plugin: String,
        dependency: String,
        reason: String,
    },
}

impl ResolutionError {
    /// Name of the plugin this failure was recorded on.
    pub fn plugin(&self) -> &str {
        match self {
            ResolutionError::UnresolvedDependency { plugin, .. }
            | ResolutionError::CircularDependency { plugin, .. }
            | ResolutionError::DependencyFailed { plugin, .. } => plugin,
        }
    }
}

/// Failure of a single lifecycle transition.
///
/// Precondition violations ([`LifecycleError::is_precondition_violation`])
/// leave the descriptor untouched; every other variant has already been
/// recorded on the descriptor, which is now `Invalid`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("No plugin with index {0}")]
    UnknownPlugin(usize),

    #[error("Cannot load plugin because dependencies are not resolved")]
    NotResolved { plugin: String },

    #[error("Plugin is disabled")]
    Disabled { plugin: String },

    #[error("Cannot load plugin because dependency failed to load: {dependency}\nReason: {reason}")]
    DependencyFailed {
        plugin: String,
        dependency: String,
        reason: String,
    },

    #[error("{message}")]
    LibraryLoad { plugin: String, message: String },

    #[error("Plugin is not valid (does not derive from the required plugin base capability)")]
    InvalidPlugin { plugin: String },

    #[error("Plugin factory panicked: {message}")]
    FactoryPanicked { plugin: String, message: String },

    #[error("Initializing the plugin failed because state != Loaded")]
    InitializeWrongState { plugin: String },

    #[error("Internal error: have no plugin instance to initialize")]
    MissingInstanceForInitialize { plugin: String },

    #[error("Plugin initialization failed: {message}")]
    InitializationFailed { plugin: String, message: String },

    #[error("Cannot perform cross-initialization because state != Initialized")]
    CrossInitializeWrongState { plugin: String },

    #[error("Internal error: have no plugin instance to perform cross-initialization")]
    MissingInstanceForCrossInitialize { plugin: String },

    #[error("Cannot perform delayed initialization because state != Running")]
    DelayedInitializeWrongState { plugin: String },

    #[error("Cannot stop plugin because state != Running")]
    StopWrongState { plugin: String },

    #[error("Cannot delete plugin because state != Stopped")]
    DeleteWrongState { plugin: String },
}

impl LifecycleError {
    /// True when the transition was attempted out of order. These are
    /// controller bugs, not plugin failures, and never touch the descriptor.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            LifecycleError::UnknownPlugin(_)
                | LifecycleError::NotResolved { .. }
                | LifecycleError::Disabled { .. }
                | LifecycleError::InitializeWrongState { .. }
                | LifecycleError::MissingInstanceForInitialize { .. }
                | LifecycleError::CrossInitializeWrongState { .. }
                | LifecycleError::MissingInstanceForCrossInitialize { .. }
                | LifecycleError::DelayedInitializeWrongState { .. }
                | LifecycleError::StopWrongState { .. }
                | LifecycleError::DeleteWrongState { .. }
        )
    }

    /// Name of the plugin the transition was attempted on, if known.
    pub fn plugin(&self) -> Option<&str> {
        match self {
            LifecycleError::UnknownPlugin(_) => None,
            LifecycleError::NotResolved { plugin }
            | LifecycleError::Disabled { plugin }
            | LifecycleError::DependencyFailed { plugin, .. }
            | LifecycleError::LibraryLoad { plugin, .. }
            | LifecycleError::InvalidPlugin { plugin }
            | LifecycleError::FactoryPanicked { plugin, .. }
            | LifecycleError::InitializeWrongState { plugin }
            | LifecycleError::MissingInstanceForInitialize { plugin }
            | LifecycleError::InitializationFailed { plugin, .. }
            | LifecycleError::CrossInitializeWrongState { plugin }
            | LifecycleError::MissingInstanceForCrossInitialize { plugin }
            | LifecycleError::DelayedInitializeWrongState { plugin }
            | LifecycleError::StopWrongState { plugin }
            | LifecycleError::DeleteWrongState { plugin } => Some(plugin),
        }
    }
}

/// Malformed plugin runtime command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("Unknown option {0}")]
    UnknownOption(String),

    #[error("The option {0} requires an argument.")]
    RequiresArgument(String),

    #[error("The plugin '{0}' does not exist.")]
    UnknownPlugin(String),
}

#[derive(Debug, Error)]
pub enum PluginSystemError {
    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error("Plugin discovery failed in '{}': {source}", .path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
