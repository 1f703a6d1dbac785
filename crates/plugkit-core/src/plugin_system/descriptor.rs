use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::plugin_system::loader::PluginHandle;
use crate::plugin_system::version::PluginVersion;

/// Lifecycle state of a plugin descriptor.
///
/// States only ever move forward: `Read → Resolved → Loaded → Initialized →
/// Running → Stopped → Deleted`. `Invalid` is absorbing and can be reached
/// from any state on error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PluginState {
    Invalid,
    Read,
    Resolved,
    Loaded,
    Initialized,
    Running,
    Stopped,
    Deleted,
}

impl PluginState {
    /// Short name of the state
    pub fn label(&self) -> &'static str {
        match self {
            PluginState::Invalid => "Invalid",
            PluginState::Read => "Read",
            PluginState::Resolved => "Resolved",
            PluginState::Loaded => "Loaded",
            PluginState::Initialized => "Initialized",
            PluginState::Running => "Running",
            PluginState::Stopped => "Stopped",
            PluginState::Deleted => "Deleted",
        }
    }

    /// Human-readable description, e.g. "Resolved: Dependencies are successfully resolved"
    pub fn description(&self) -> &'static str {
        match self {
            PluginState::Invalid => "Invalid: Description file found, but error on read",
            PluginState::Read => "Read: Description successfully read",
            PluginState::Resolved => "Resolved: Dependencies are successfully resolved",
            PluginState::Loaded => "Loaded: Library is loaded",
            PluginState::Initialized => "Initialized: Plugin's initialization function succeeded",
            PluginState::Running => "Running: Plugin successfully loaded and running",
            PluginState::Stopped => "Stopped: Plugin was shut down",
            PluginState::Deleted => "Deleted: Plugin ended its life cycle and was deleted",
        }
    }

    /// States in which the descriptor owns a live plugin instance
    pub fn holds_instance(&self) -> bool {
        matches!(
            self,
            PluginState::Loaded | PluginState::Initialized | PluginState::Running | PluginState::Stopped
        )
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a dependency must be satisfied for the dependent to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DependencyKind {
    #[default]
    Required,
    Optional,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Required => "required",
            DependencyKind::Optional => "optional",
        }
    }

    /// Parses the descriptor spelling ("required" / "optional")
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "required" => Some(DependencyKind::Required),
            "optional" => Some(DependencyKind::Optional),
            _ => None,
        }
    }
}

/// Represents a dependency on another plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDependency {
    /// The name of the required plugin
    pub name: String,
    /// The version the provider must be compatible with
    pub version: PluginVersion,
    pub kind: DependencyKind,
}

impl PluginDependency {
    /// Create a new required dependency
    pub fn required(name: &str, version: PluginVersion) -> Self {
        Self {
            name: name.to_string(),
            version,
            kind: DependencyKind::Required,
        }
    }

    /// Create a new optional dependency
    pub fn optional(name: &str, version: PluginVersion) -> Self {
        Self {
            name: name.to_string(),
            version,
            kind: DependencyKind::Optional,
        }
    }

    pub fn is_required(&self) -> bool {
        self.kind == DependencyKind::Required
    }
}

impl fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.version)
    }
}

/// A plugin-scoped command-line option declared in a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginArgumentDescription {
    /// Option as typed on the command line, e.g. "-theme"
    pub name: String,
    /// Name of the value the option consumes, if any
    pub parameter: Option<String>,
    pub description: String,
}

/// Serializable snapshot of a descriptor for diagnostic display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginStatus {
    pub name: String,
    pub version: String,
    pub state: PluginState,
    pub state_description: String,
    pub enabled: bool,
    pub error: Option<String>,
}

/// Parsed metadata of one plugin plus its runtime lifecycle fields.
///
/// Declared fields are public. Runtime fields (`state`, `error_message`,
/// the plugin handle) are only changed by the resolver and the lifecycle
/// controller, which keep two invariants:
/// - a plugin handle is present iff the state holds an instance
///   (`Loaded`, `Initialized`, `Running`, `Stopped`);
/// - an error message forces the state to `Invalid`.
///
/// Equality compares declared fields only.
pub struct PluginDescriptor {
    pub name: String,
    pub version: PluginVersion,
    pub compat_version: PluginVersion,
    pub vendor: Option<String>,
    pub copyright: Option<String>,
    pub license: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub disabled_by_default: bool,
    pub experimental: bool,
    pub dependencies: Vec<PluginDependency>,
    pub arguments: Vec<PluginArgumentDescription>,

    descriptor_path: Option<PathBuf>,
    location: PathBuf,
    state: PluginState,
    error_message: Option<String>,
    enabled: bool,
    arguments_passed: Vec<String>,
    handle: Option<PluginHandle>,
}

impl PluginDescriptor {
    /// Create a new descriptor in state `Read`, compatible back to its own version
    pub fn new(name: &str, version: PluginVersion) -> Self {
        Self {
            name: name.to_string(),
            compat_version: version.clone(),
            version,
            vendor: None,
            copyright: None,
            license: None,
            description: None,
            url: None,
            category: None,
            disabled_by_default: false,
            experimental: false,
            dependencies: Vec::new(),
            arguments: Vec::new(),
            descriptor_path: None,
            location: library_file_for(name),
            state: PluginState::Read,
            error_message: None,
            enabled: true,
            arguments_passed: Vec::new(),
            handle: None,
        }
    }

    /// Descriptor for a file that could not be read or parsed. It is named
    /// after the directory containing the file so the failure stays visible.
    pub fn invalid(descriptor_path: &Path, message: impl Into<String>) -> Self {
        let name = descriptor_path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| descriptor_path.display().to_string());
        let mut descriptor = Self::new(&name, PluginVersion::new(0, 0, 0));
        descriptor.set_descriptor_path(descriptor_path);
        descriptor.state = PluginState::Invalid;
        descriptor.error_message = Some(message.into());
        descriptor.enabled = false;
        descriptor
    }

    /// Start building a descriptor
    pub fn builder(name: &str, version: PluginVersion) -> DescriptorBuilder {
        DescriptorBuilder::new(name, version)
    }

    /// Path of the descriptor file this record was read from
    pub fn descriptor_path(&self) -> Option<&Path> {
        self.descriptor_path.as_deref()
    }

    /// Record where the descriptor was read from. The library is expected
    /// next to it.
    pub fn set_descriptor_path(&mut self, path: &Path) {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        self.location = dir.join(library_file_for(&self.name));
        self.descriptor_path = Some(path.to_path_buf());
    }

    /// Filesystem path of the loadable library
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn set_location(&mut self, location: impl Into<PathBuf>) {
        self.location = location.into();
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn has_error(&self) -> bool {
        self.error_message.is_some()
    }

    /// Effective enablement after descriptor defaults, settings and command line
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the descriptor asks not to be loaded unless explicitly enabled
    pub fn is_disabled_by_default(&self) -> bool {
        self.disabled_by_default || self.experimental
    }

    /// Plugin-scoped arguments collected from the command line
    pub fn arguments_passed(&self) -> &[String] {
        &self.arguments_passed
    }

    pub fn add_argument_passed(&mut self, argument: impl Into<String>) {
        self.arguments_passed.push(argument.into());
    }

    /// Declared argument matching a command-line option
    pub fn argument(&self, option: &str) -> Option<&PluginArgumentDescription> {
        self.arguments.iter().find(|arg| arg.name == option)
    }

    /// Whether this plugin provides `name` in a version compatible with `required`
    pub fn provides(&self, name: &str, required: &PluginVersion) -> bool {
        self.name == name && self.version.provides(&self.compat_version, required)
    }

    /// `name(version)`, the form used in every diagnostic message
    pub fn display_name(&self) -> String {
        format!("{}({})", self.name, self.version)
    }

    /// Serializes the declared fields back to a descriptor document
    pub fn to_xml(&self) -> String {
        crate::plugin_system::parser::write_descriptor(self)
    }

    pub fn status(&self) -> PluginStatus {
        PluginStatus {
            name: self.name.clone(),
            version: self.version.to_string(),
            state: self.state,
            state_description: self.state.description().to_string(),
            enabled: self.enabled,
            error: self.error_message.clone(),
        }
    }

    /// The owning handle of the loaded plugin, present iff the state holds an instance
    pub fn handle(&self) -> Option<&PluginHandle> {
        self.handle.as_ref()
    }

    pub(crate) fn handle_mut(&mut self) -> Option<&mut PluginHandle> {
        self.handle.as_mut()
    }

    pub(crate) fn set_state(&mut self, state: PluginState) {
        debug_assert!(
            state == PluginState::Invalid || state >= self.state,
            "plugin '{}' cannot move back from {} to {}",
            self.name,
            self.state,
            state
        );
        log::debug!("Plugin '{}': {} -> {}", self.name, self.state, state);
        self.state = state;
    }

    /// Enter `Loaded`, taking ownership of the instantiated plugin
    pub(crate) fn attach(&mut self, handle: PluginHandle) {
        self.handle = Some(handle);
        self.set_state(PluginState::Loaded);
    }

    /// Leave the lifecycle for good: records the error, releases any instance
    /// and enters `Invalid`.
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("Plugin '{}' is invalid: {}", self.display_name(), message);
        self.error_message = Some(message);
        self.handle = None;
        self.state = PluginState::Invalid;
    }

    /// Release the instance and library, entering `Deleted`
    pub(crate) fn release(&mut self) {
        self.handle = None;
        self.set_state(PluginState::Deleted);
    }
}

impl PartialEq for PluginDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.compat_version == other.compat_version
            && self.vendor == other.vendor
            && self.copyright == other.copyright
            && self.license == other.license
            && self.description == other.description
            && self.url == other.url
            && self.category == other.category
            && self.disabled_by_default == other.disabled_by_default
            && self.experimental == other.experimental
            && self.dependencies == other.dependencies
            && self.arguments == other.arguments
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("version", &self.version.to_string())
            .field("compat_version", &self.compat_version.to_string())
            .field("dependencies", &self.dependencies)
            .field("state", &self.state)
            .field("enabled", &self.enabled)
            .field("error_message", &self.error_message)
            .field("loaded", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

/// Platform file name of a plugin's library: `libname.so`, `name.dll`, ...
fn library_file_for(name: &str) -> PathBuf {
    PathBuf::from(libloading::library_filename(name.to_lowercase()))
}

/// Builder for creating a plugin descriptor
pub struct DescriptorBuilder {
    descriptor: PluginDescriptor,
}

impl DescriptorBuilder {
    pub fn new(name: &str, version: PluginVersion) -> Self {
        Self {
            descriptor: PluginDescriptor::new(name, version),
        }
    }

    pub fn compat_version(mut self, version: PluginVersion) -> Self {
        self.descriptor.compat_version = version;
        self
    }

    pub fn vendor(mut self, vendor: &str) -> Self {
        self.descriptor.vendor = Some(vendor.to_string());
        self
    }

    pub fn copyright(mut self, copyright: &str) -> Self {
        self.descriptor.copyright = Some(copyright.to_string());
        self
    }

    pub fn license(mut self, license: &str) -> Self {
        self.descriptor.license = Some(license.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.descriptor.description = Some(description.to_string());
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.descriptor.url = Some(url.to_string());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.descriptor.category = Some(category.to_string());
        self
    }

    pub fn disabled_by_default(mut self, disabled: bool) -> Self {
        self.descriptor.disabled_by_default = disabled;
        self.descriptor.enabled = !self.descriptor.is_disabled_by_default();
        self
    }

    pub fn experimental(mut self, experimental: bool) -> Self {
        self.descriptor.experimental = experimental;
        self.descriptor.enabled = !self.descriptor.is_disabled_by_default();
        self
    }

    /// Add a dependency
    pub fn dependency(mut self, dependency: PluginDependency) -> Self {
        self.descriptor.dependencies.push(dependency);
        self
    }

    /// Declare a plugin-scoped command-line option
    pub fn argument(mut self, name: &str, parameter: Option<&str>, description: &str) -> Self {
        self.descriptor.arguments.push(PluginArgumentDescription {
            name: name.to_string(),
            parameter: parameter.map(str::to_string),
            description: description.to_string(),
        });
        self
    }

    /// Set the library location explicitly
    pub fn location(mut self, location: impl Into<PathBuf>) -> Self {
        self.descriptor.location = location.into();
        self
    }

    /// Build the descriptor
    pub fn build(self) -> PluginDescriptor {
        self.descriptor
    }
}
