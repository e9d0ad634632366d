//! Process-wide descriptor cache.
//!
//! Descriptors are built once per model type and published atomically: a
//! build, including every descriptor it pulls in transitively, either
//! becomes visible as a whole or not at all. Types reachable from each
//! other through their properties are wired to the same descriptor shells,
//! so recursive models terminate.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};
use tracing::{debug, warn};

use crate::binding::{BindingDescriptor, BuildContext};
use crate::config::BindingConfig;
use crate::error::{Error, Result};
use crate::model::XmlModel;
use crate::parse::ValueParserFactory;
use crate::types::{Bindable, TypeInfo, TypeShape};
use crate::xpath::XPathCompiler;

#[derive(Default)]
struct BuildState {
    pending: HashMap<TypeId, Arc<BindingDescriptor>>,
    depth: usize,
}

/// Type to descriptor map shared by every binder over one backend
pub struct BindingRegistry {
    compiler: Arc<dyn XPathCompiler>,
    config: BindingConfig,
    ready: RwLock<HashMap<TypeId, Arc<BindingDescriptor>>>,
    building: ReentrantMutex<RefCell<BuildState>>,
}

impl BindingRegistry {
    pub fn new(compiler: Arc<dyn XPathCompiler>) -> Self {
        Self::with_config(compiler, BindingConfig::default())
    }

    pub fn with_config(compiler: Arc<dyn XPathCompiler>, config: BindingConfig) -> Self {
        Self {
            compiler,
            config,
            ready: RwLock::new(HashMap::new()),
            building: ReentrantMutex::new(RefCell::new(BuildState::default())),
        }
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    pub fn compiler(&self) -> &dyn XPathCompiler {
        self.compiler.as_ref()
    }

    /// Descriptor for `T`, building it on first use
    pub fn resolve<T: Bindable>(&self) -> Result<Arc<BindingDescriptor>> {
        self.resolve_binding(&TypeInfo::of::<T>())
    }

    /// Build and cache the descriptor for a model ahead of binding
    pub fn register<T: XmlModel>(&self) -> Result<Arc<BindingDescriptor>> {
        self.resolve::<T>()
    }

    /// Descriptor for a model type.
    ///
    /// Types that are not models fail with [`Error::BindingNotFound`].
    /// While a build is in progress on this thread, a type already being
    /// built resolves to its (not yet initialized) shell.
    pub fn resolve_binding(&self, info: &TypeInfo) -> Result<Arc<BindingDescriptor>> {
        if let Some(descriptor) = self.ready.read().get(&info.id()) {
            return Ok(Arc::clone(descriptor));
        }
        let TypeShape::Model(shape) = info.shape() else {
            return Err(Error::binding_not_found(info.name()));
        };

        let guard = self.building.lock();
        if let Some(descriptor) = self.ready.read().get(&info.id()) {
            return Ok(Arc::clone(descriptor));
        }

        let descriptor = {
            let mut state = guard.borrow_mut();
            if let Some(shell) = state.pending.get(&info.id()) {
                return Ok(Arc::clone(shell));
            }
            let descriptor = Arc::new(BindingDescriptor::shell(*info, &shape));
            state.pending.insert(info.id(), Arc::clone(&descriptor));
            state.depth += 1;
            descriptor
        };

        let cx = BuildContext {
            registry: self,
            compiler: self.compiler.as_ref(),
            parsers: ValueParserFactory::new(&self.config),
        };
        let outcome = descriptor.initialize(&cx);

        let mut state = guard.borrow_mut();
        state.depth -= 1;
        match outcome {
            Ok(()) => {
                if state.depth == 0 {
                    let built = std::mem::take(&mut state.pending);
                    let mut ready = self.ready.write();
                    for (id, built) in built {
                        debug!(
                            model = built.model_type().name(),
                            properties = built.properties().len(),
                            "binding descriptor ready"
                        );
                        ready.insert(id, built);
                    }
                }
                Ok(descriptor)
            }
            Err(e) => {
                if state.depth == 0 {
                    state.pending.clear();
                }
                warn!(model = info.name(), error = %e, "failed to build binding descriptor");
                Err(e)
            }
        }
    }

    /// True when a descriptor for `T` has been published
    pub fn contains<T: Bindable>(&self) -> bool {
        self.ready.read().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.ready.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.read().is_empty()
    }

    /// Every published descriptor, in no particular order
    pub fn descriptors(&self) -> Vec<Arc<BindingDescriptor>> {
        self.ready.read().values().cloned().collect()
    }
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("config", &self.config)
            .field("descriptors", &self.len())
            .finish_non_exhaustive()
    }
}
