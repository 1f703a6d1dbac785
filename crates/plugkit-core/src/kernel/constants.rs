/// Application name
pub const APP_NAME: &str = "Plugkit";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// File name of a plugin descriptor inside a plugin directory
pub const DESCRIPTOR_FILE_NAME: &str = "plugin.xml";

/// Symbol every dynamically loaded plugin library exports
pub const PLUGIN_CREATE_SYMBOL: &[u8] = b"plugkit_plugin_create\0";
