use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Type-erased shared object published by a plugin
pub type PoolObject = Arc<dyn Any + Send + Sync>;

struct PoolEntry {
    /// Arena index of the publishing plugin
    owner: usize,
    owner_name: String,
    object: PoolObject,
}

/// Named objects plugins publish for each other.
///
/// The pool holds the only strong reference to each object. Other plugins
/// only ever receive `Weak` references, so removing an object (or its owner
/// being deleted) really releases it.
#[derive(Default)]
pub struct ObjectPool {
    objects: BTreeMap<String, PoolEntry>,
}

impl ObjectPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `object` under `name` on behalf of the plugin at arena index
    /// `owner`. Returns false if the name is already taken, in which case the
    /// pool is unchanged.
    pub fn add(&mut self, owner: usize, owner_name: &str, name: &str, object: PoolObject) -> bool {
        if self.objects.contains_key(name) {
            log::warn!(
                "Plugin '{}' tried to publish object '{}' which already exists",
                owner_name,
                name
            );
            return false;
        }
        log::debug!("Plugin '{}' published object '{}'", owner_name, name);
        self.objects.insert(
            name.to_string(),
            PoolEntry {
                owner,
                owner_name: owner_name.to_string(),
                object,
            },
        );
        true
    }

    /// Weak reference to the object published under `name`, if it exists and
    /// has type `T`
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Weak<T>> {
        let entry = self.objects.get(name)?;
        let object = Arc::clone(&entry.object).downcast::<T>().ok()?;
        Some(Arc::downgrade(&object))
    }

    /// Remove the object published under `name`. Only its owner may remove it.
    pub fn remove(&mut self, owner: usize, name: &str) -> bool {
        match self.objects.get(name) {
            Some(entry) if entry.owner == owner => {
                self.objects.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Remove every object published by the plugin at arena index `owner`
    pub fn remove_owned_by(&mut self, owner: usize) -> usize {
        let before = self.objects.len();
        self.objects.retain(|_, entry| entry.owner != owner);
        before - self.objects.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Published object names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    /// Name of the plugin that published `name`
    pub fn owner_of(&self, name: &str) -> Option<&str> {
        self.objects.get(name).map(|entry| entry.owner_name.as_str())
    }

    /// Arena index of the plugin that published `name`
    pub fn owner_index_of(&self, name: &str) -> Option<usize> {
        self.objects.get(name).map(|entry| entry.owner)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

impl std::fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.objects.iter().map(|(name, entry)| (name, &entry.owner_name)))
            .finish()
    }
}
