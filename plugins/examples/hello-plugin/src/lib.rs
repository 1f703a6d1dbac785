//! Example plugin exercising the dynamic loading path.
//!
//! Build it as a `cdylib` and copy the library next to `plugin.xml` into a
//! directory on the plugin search path.
use log::info;
use plugkit_core::plugin_system::{Plugin, PluginContext, PluginError};

/// Name under which the greeting is published
pub const GREETING_OBJECT: &str = "hello.greeting";

const GREETING_OPTION: &str = "-greeting";

pub struct HelloPlugin {
    greeting: String,
}

impl Default for HelloPlugin {
    fn default() -> Self {
        Self {
            greeting: "Hello".to_string(),
        }
    }
}

impl HelloPlugin {
    pub fn greeting(&self) -> &str {
        &self.greeting
    }
}

impl Plugin for HelloPlugin {
    fn initialize(
        &mut self,
        arguments: &[String],
        ctx: &mut PluginContext<'_>,
    ) -> Result<(), PluginError> {
        let mut iter = arguments.iter();
        while let Some(arg) = iter.next() {
            if arg == GREETING_OPTION {
                let text = iter
                    .next()
                    .ok_or_else(|| PluginError::new("-greeting needs a text"))?;
                self.greeting = text.clone();
            }
        }
        if !ctx.add_object(GREETING_OBJECT, self.greeting.clone()) {
            return Err(PluginError::new(format!(
                "Object '{}' is already published",
                GREETING_OBJECT
            )));
        }
        Ok(())
    }

    fn extensions_initialized(&mut self, ctx: &mut PluginContext<'_>) {
        info!("{} from {}", self.greeting, ctx.plugin_name());
    }

    fn about_to_shutdown(&mut self) {
        info!("Goodbye from Hello");
    }
}

plugkit_core::declare_plugin!(HelloPlugin, HelloPlugin::default);
