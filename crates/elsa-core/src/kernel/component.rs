use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::definition::{CapabilityKey, Export, Instantiated};
use crate::kernel::error::{Error, Result};

/// Core component lifecycle trait for all kernel components
///
/// `initialize` runs while the context is instantiating components, before it
/// is `Running`. `start` runs after the transition to `Running`; components
/// that open listeners bind there. `stop` releases resources and may be called
/// on a component that was initialized but never started.
#[async_trait]
pub trait KernelComponent: Any + Send + Sync + Debug {
    fn name(&self) -> &'static str;

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()>;
}

/// Registry of instantiated components and the capabilities they export.
#[derive(Default, Debug)]
pub struct DependencyRegistry {
    // Keyed by the *concrete* type's TypeId
    instances: HashMap<TypeId, (String, Arc<dyn Any + Send + Sync>)>,
    // Keyed by component id
    by_id: HashMap<String, Arc<dyn KernelComponent>>,
    exports: HashMap<CapabilityKey, Vec<(String, Export)>>,
}

impl DependencyRegistry {
    /// Create a new empty dependency registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instantiated component under its definition id.
    ///
    /// The concrete type is recorded as well so it can be fetched back with
    /// [`get_concrete`](Self::get_concrete).
    pub fn register_instance(&mut self, id: &str, built: Instantiated) -> Result<()> {
        if self.by_id.contains_key(id) {
            return Err(Error::ComponentRegistryError {
                operation: "RegisterInstance".to_string(),
                component_name: Some(id.to_string()),
                message: "an instance with this id is already registered".to_string(),
            });
        }
        self.instances
            .insert(built.type_id, (id.to_string(), built.concrete));
        self.by_id.insert(id.to_string(), built.component);
        for (key, export) in built.exports {
            self.exports
                .entry(key)
                .or_default()
                .push((id.to_string(), export));
        }
        Ok(())
    }

    /// Get a component instance by its definition id.
    pub fn get_by_id(&self, id: &str) -> Option<Arc<dyn KernelComponent>> {
        self.by_id.get(id).cloned()
    }

    /// Get a component instance by concrete type T.
    /// Returns Arc<T> if found and downcast is successful.
    pub fn get_concrete<T: KernelComponent + 'static>(&self) -> Option<Arc<T>> {
        self.instances
            .get(&TypeId::of::<T>())
            .and_then(|(_, arc_any)| Arc::downcast::<T>(arc_any.clone()).ok())
    }

    /// Get the capability `C` exported by the component with the given id.
    pub fn get_export<C: ?Sized + 'static>(&self, provider_id: &str) -> Option<Arc<C>> {
        self.exports
            .get(&CapabilityKey::of::<C>())?
            .iter()
            .find(|(id, _)| id.as_str() == provider_id)
            .and_then(|(_, export)| export.downcast_ref::<Arc<C>>().cloned())
    }

    /// The type-erased export of `key` by `provider_id`.
    pub fn export_of(&self, provider_id: &str, key: &CapabilityKey) -> Option<Export> {
        self.exports
            .get(key)?
            .iter()
            .find(|(id, _)| id.as_str() == provider_id)
            .map(|(_, export)| export.clone())
    }

    /// Ids of the components exporting `key`.
    pub fn providers_of(&self, key: &CapabilityKey) -> Vec<String> {
        self.exports
            .get(key)
            .map(|list| list.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }

    /// Remove a component and everything it exported.
    pub fn remove(&mut self, id: &str) -> Option<Arc<dyn KernelComponent>> {
        let instance = self.by_id.remove(id)?;
        self.instances.retain(|_, (owner, _)| owner.as_str() != id);
        for list in self.exports.values_mut() {
            list.retain(|(provider, _)| provider.as_str() != id);
        }
        self.exports.retain(|_, list| !list.is_empty());
        Some(instance)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Clear all instances.
    pub fn clear(&mut self) {
        self.instances.clear();
        self.by_id.clear();
        self.exports.clear();
    }
}
