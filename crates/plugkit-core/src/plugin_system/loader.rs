//! Opening plugin libraries and instantiating the plugins they contain.
//!
//! A [`LibraryLoader`] turns a descriptor into a [`PluginLibrary`]: an
//! opened library plus the factory it exports. [`instantiate`] runs the
//! factory, checks that the product really is a [`Plugin`], and wraps both in
//! a [`PluginHandle`] that owns them for the rest of the plugin's life.
// crates/plugkit-core/src/plugin_system/loader.rs
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use libloading::{Library, Symbol};

use crate::kernel::constants::PLUGIN_CREATE_SYMBOL;
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::error::LifecycleError;
use crate::plugin_system::traits::Plugin;

/// What a plugin factory returns. A valid product is a `Box<dyn Plugin>`
/// behind the `Any`; anything else is rejected by [`instantiate`].
pub type PluginProduct = Box<dyn Any + Send>;

/// Signature of the factory symbol exported by dynamic plugin libraries
pub type PluginCreateFn = unsafe fn() -> PluginProduct;

/// Factory registered with a [`StaticLibraryLoader`]
pub type PluginFactory = Arc<dyn Fn() -> PluginProduct + Send + Sync>;

/// Wraps a plugin into the product form factories return
pub fn plugin_product<P: Plugin + 'static>(plugin: P) -> PluginProduct {
    let plugin: Box<dyn Plugin> = Box::new(plugin);
    Box::new(plugin)
}

/// Exports the factory symbol the dynamic loader looks up.
///
/// ```ignore
/// plugkit_core::declare_plugin!(HelloPlugin, HelloPlugin::default);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($plugin:ty, $constructor:path) => {
        #[unsafe(no_mangle)]
        pub fn plugkit_plugin_create() -> $crate::plugin_system::loader::PluginProduct {
            let plugin: $plugin = $constructor();
            $crate::plugin_system::loader::plugin_product(plugin)
        }
    };
}

/// An opened plugin library and the factory that creates its plugin
pub struct PluginLibrary {
    create: Box<dyn FnOnce() -> PluginProduct + Send>,
    library: Option<Library>,
}

impl PluginLibrary {
    /// A library backed by an in-process factory
    pub fn from_factory(create: impl FnOnce() -> PluginProduct + Send + 'static) -> Self {
        Self {
            create: Box::new(create),
            library: None,
        }
    }

    /// Whether a shared library was opened for this plugin
    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }
}

impl fmt::Debug for PluginLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLibrary")
            .field("dynamic", &self.is_dynamic())
            .finish_non_exhaustive()
    }
}

/// Opens the library a descriptor points to
pub trait LibraryLoader: Send + Sync {
    /// Returns the opened library, or a message describing why it could not
    /// be opened. The message is recorded on the descriptor as is.
    fn open(&self, descriptor: &PluginDescriptor) -> Result<PluginLibrary, String>;
}

/// Loads plugins from shared libraries with `libloading`
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicLibraryLoader;

impl DynamicLibraryLoader {
    pub fn new() -> Self {
        Self
    }
}

impl LibraryLoader for DynamicLibraryLoader {
    fn open(&self, descriptor: &PluginDescriptor) -> Result<PluginLibrary, String> {
        let path = descriptor.location();
        let library = unsafe { Library::new(path) }
            .map_err(|e| format!("Cannot load library {}: {}", path.display(), e))?;

        let create = {
            let symbol: Symbol<PluginCreateFn> = unsafe { library.get(PLUGIN_CREATE_SYMBOL) }
                .map_err(|e| {
                    format!(
                        "Library {} does not export a plugin factory: {}",
                        path.display(),
                        e
                    )
                })?;
            *symbol
        };

        log::debug!("Opened library {} for plugin '{}'", path.display(), descriptor.name);
        Ok(PluginLibrary {
            create: Box::new(move || unsafe { create() }),
            library: Some(library),
        })
    }
}

/// Creates plugins from factories compiled into the host
#[derive(Default, Clone)]
pub struct StaticLibraryLoader {
    factories: HashMap<String, PluginFactory>,
}

impl StaticLibraryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw factory for the plugin named `name`
    pub fn register(
        &mut self,
        name: &str,
        factory: impl Fn() -> PluginProduct + Send + Sync + 'static,
    ) -> &mut Self {
        self.factories.insert(name.to_string(), Arc::new(factory));
        self
    }

    /// Register a plugin constructor for the plugin named `name`
    pub fn register_plugin<P, F>(&mut self, name: &str, constructor: F) -> &mut Self
    where
        P: Plugin + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.register(name, move || plugin_product(constructor()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl LibraryLoader for StaticLibraryLoader {
    fn open(&self, descriptor: &PluginDescriptor) -> Result<PluginLibrary, String> {
        let factory = self
            .factories
            .get(&descriptor.name)
            .cloned()
            .ok_or_else(|| format!("No plugin library registered for '{}'", descriptor.name))?;
        Ok(PluginLibrary::from_factory(move || factory()))
    }
}

impl fmt::Debug for StaticLibraryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("StaticLibraryLoader")
            .field("plugins", &names)
            .finish()
    }
}

/// Owns a live plugin instance and the library its code lives in.
///
/// The instance is always dropped before the library is unloaded.
pub struct PluginHandle {
    instance: Option<Box<dyn Plugin>>,
    library: Option<Library>,
}

impl PluginHandle {
    pub fn plugin(&self) -> Option<&dyn Plugin> {
        self.instance.as_deref()
    }

    pub fn plugin_mut(&mut self) -> Option<&mut (dyn Plugin + 'static)> {
        self.instance.as_deref_mut()
    }

    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }
}

impl Drop for PluginHandle {
    fn drop(&mut self) {
        drop(self.instance.take());
        drop(self.library.take());
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle")
            .field("instance", &self.instance.is_some())
            .field("dynamic", &self.is_dynamic())
            .finish()
    }
}

/// Runs the library's factory and checks the product is a plugin
pub fn instantiate(library: PluginLibrary, plugin: &str) -> Result<PluginHandle, LifecycleError> {
    let PluginLibrary { create, library } = library;

    let product = match panic::catch_unwind(AssertUnwindSafe(create)) {
        Ok(product) => product,
        Err(payload) => {
            return Err(LifecycleError::FactoryPanicked {
                plugin: plugin.to_string(),
                message: panic_message(payload.as_ref()),
            });
        }
    };

    match product.downcast::<Box<dyn Plugin>>() {
        Ok(instance) => Ok(PluginHandle {
            instance: Some(*instance),
            library,
        }),
        Err(product) => {
            // the product's code may live in the library
            drop(product);
            drop(library);
            Err(LifecycleError::InvalidPlugin {
                plugin: plugin.to_string(),
            })
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic reason".to_string()
    }
}
