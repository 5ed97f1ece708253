//! Component definitions: what the bootstrap knows about a component before
//! it exists.
//!
//! A [`ComponentDefinition`] names a component by a namespace-qualified id,
//! lists the capabilities it provides and requires, and carries the factory
//! that builds it once its requirements are bound.
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::kernel::catalog::Namespace;
use crate::kernel::component::KernelComponent;
use crate::kernel::error::{Error, Result};
use crate::kernel::shutdown::ShutdownHandle;

/// Type-erased `Arc<C>` for some capability type `C`.
pub type Export = Arc<dyn Any + Send + Sync>;

/// Identity of a capability type, usually a trait object type such as
/// `dyn ConnectionHandler`.
#[derive(Clone, Copy)]
pub struct CapabilityKey {
    type_id: TypeId,
    name: &'static str,
}

impl CapabilityKey {
    pub fn of<C: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name: type_name::<C>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for CapabilityKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for CapabilityKey {}

impl Hash for CapabilityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityKey({})", self.name)
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A freshly built component with its exports, before registration.
pub struct Instantiated {
    pub type_id: TypeId,
    pub component: Arc<dyn KernelComponent>,
    /// The same instance as `component`, kept as `Any` for downcasting.
    pub concrete: Arc<dyn Any + Send + Sync>,
    pub exports: Vec<(CapabilityKey, Export)>,
}

type ErasedFactory = Box<dyn Fn(&Wiring<'_>) -> Result<Instantiated> + Send + Sync>;

/// Describes one component: its id, capabilities and factory.
pub struct ComponentDefinition {
    id: String,
    provides: Vec<CapabilityKey>,
    requires: Vec<CapabilityKey>,
    primary: bool,
    factory: ErasedFactory,
    exporters: Vec<Box<dyn Fn(&Arc<dyn Any + Send + Sync>) -> Option<Export> + Send + Sync>>,
}

impl ComponentDefinition {
    /// Define a component of concrete type `C` built by `factory`.
    pub fn new<C, F>(id: impl Into<String>, factory: F) -> Self
    where
        C: KernelComponent + 'static,
        F: Fn(&Wiring<'_>) -> Result<C> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            provides: Vec::new(),
            requires: Vec::new(),
            primary: false,
            factory: Box::new(move |wiring: &Wiring<'_>| {
                let component = Arc::new(factory(wiring)?);
                Ok(Instantiated {
                    type_id: TypeId::of::<C>(),
                    component: component.clone(),
                    concrete: component,
                    exports: Vec::new(),
                })
            }),
            exporters: Vec::new(),
        }
    }

    /// Declare that the component provides capability `T`.
    ///
    /// `cast` turns the concrete component into the capability, typically
    /// `|c| c as Arc<dyn SomeTrait>`.
    pub fn provides<C, T>(mut self, cast: fn(Arc<C>) -> Arc<T>) -> Self
    where
        C: KernelComponent + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        self.provides.push(CapabilityKey::of::<T>());
        self.exporters.push(Box::new(move |any: &Arc<dyn Any + Send + Sync>| {
            let concrete = Arc::downcast::<C>(any.clone()).ok()?;
            let export: Export = Arc::new(cast(concrete));
            Some(export)
        }));
        self
    }

    /// Declare that the component requires capability `T`.
    pub fn requires<T: ?Sized + 'static>(mut self) -> Self {
        let key = CapabilityKey::of::<T>();
        if !self.requires.contains(&key) {
            self.requires.push(key);
        }
        self
    }

    /// Mark this definition as the preferred provider when several components
    /// provide the same capability.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn provided(&self) -> &[CapabilityKey] {
        &self.provides
    }

    pub fn required(&self) -> &[CapabilityKey] {
        &self.requires
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Run the factory and collect the declared exports.
    pub(crate) fn instantiate(&self, wiring: &Wiring<'_>) -> Result<Instantiated> {
        let mut built = (self.factory)(wiring)?;
        for (key, exporter) in self.provides.iter().zip(&self.exporters) {
            let export = exporter(&built.concrete).ok_or_else(|| Error::ComponentRegistryError {
                operation: "ExportCapability".to_string(),
                component_name: Some(self.id.clone()),
                message: format!("could not export capability '{}'", key),
            })?;
            built.exports.push((*key, export));
        }
        Ok(built)
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("id", &self.id)
            .field("provides", &self.provides)
            .field("requires", &self.requires)
            .field("primary", &self.primary)
            .finish_non_exhaustive()
    }
}

/// What a factory sees while building its component.
pub struct Wiring<'a> {
    component: &'a str,
    namespace: &'a Namespace,
    arguments: &'a [String],
    shutdown: &'a ShutdownHandle,
    bindings: HashMap<CapabilityKey, Export>,
}

impl<'a> Wiring<'a> {
    pub(crate) fn new(
        component: &'a str,
        namespace: &'a Namespace,
        arguments: &'a [String],
        shutdown: &'a ShutdownHandle,
        bindings: HashMap<CapabilityKey, Export>,
    ) -> Self {
        Self {
            component,
            namespace,
            arguments,
            shutdown,
            bindings,
        }
    }

    /// Id of the component being built.
    pub fn component_id(&self) -> &str {
        self.component
    }

    pub fn namespace(&self) -> &Namespace {
        self.namespace
    }

    /// Process arguments, passed through unmodified.
    pub fn arguments(&self) -> &[String] {
        self.arguments
    }

    /// Handle for reporting faults or requesting shutdown at runtime.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// The provider bound to the declared requirement `T`.
    pub fn resolve<T: ?Sized + 'static>(&self) -> Result<Arc<T>> {
        let key = CapabilityKey::of::<T>();
        self.bindings
            .get(&key)
            .and_then(|export| export.downcast_ref::<Arc<T>>().cloned())
            .ok_or_else(|| Error::UndeclaredDependency {
                component: self.component.to_string(),
                capability: key.name().to_string(),
            })
    }
}
