//!
//! A hierarchical name → object directory.
//!
//! Every replication owns a root [`Context`]. Collaborators bind shared
//! objects under it; statistics observers bind themselves under the
//! `statistics/` sub-context using their description as name.
//!

use crate::runtime::SimError;
use fxhash::FxHashMap;
use std::any::Any;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

///
/// One directory level of the naming hierarchy.
///
/// Sub-contexts are created on demand and shared; bound names within one
/// context are unique.
///
#[derive(Default)]
pub struct Context {
    name: String,
    subs: RwLock<FxHashMap<String, Arc<Context>>>,
    bindings: RwLock<FxHashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Context {
    /// Creates an empty root context.
    #[must_use]
    pub fn root() -> Arc<Context> {
        Arc::new(Context::named(String::new()))
    }

    fn named(name: String) -> Context {
        Context {
            name,
            subs: RwLock::default(),
            bindings: RwLock::default(),
        }
    }

    /// The name of this context level. Empty for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    ///
    /// Walks a `/`-separated path below the given context, creating missing
    /// levels on the way.
    ///
    #[must_use]
    pub fn lookup_or_create_sub_context(this: &Arc<Context>, path: &str) -> Arc<Context> {
        let mut current = Arc::clone(this);
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let next = {
                let mut subs = current.subs.write().expect("context poisoned");
                Arc::clone(
                    subs.entry(component.to_string())
                        .or_insert_with(|| Arc::new(Context::named(component.to_string()))),
                )
            };
            current = next;
        }
        current
    }

    ///
    /// Binds an object under a name in this context.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::BindingFailure`] if the name is already bound.
    ///
    pub fn bind_object(
        &self,
        name: impl Into<String>,
        object: Arc<dyn Any + Send + Sync>,
    ) -> Result<(), SimError> {
        let name = name.into();
        let mut bindings = self.bindings.write().expect("context poisoned");
        if bindings.contains_key(&name) {
            return Err(SimError::BindingFailure(name));
        }
        bindings.insert(name, object);
        Ok(())
    }

    /// Looks up a bound object by name in this context level.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.bindings
            .read()
            .expect("context poisoned")
            .get(name)
            .map(Arc::clone)
    }

    /// The number of objects bound directly in this context level.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.read().expect("context poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("bindings", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_contexts_are_created_once() {
        let root = Context::root();
        let a = Context::lookup_or_create_sub_context(&root, "statistics/queue");
        let statistics = Context::lookup_or_create_sub_context(&root, "statistics");
        let b = Context::lookup_or_create_sub_context(&statistics, "queue");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "queue");
    }

    #[test]
    fn duplicate_binding_fails() {
        let root = Context::root();
        root.bind_object("waiting time", Arc::new(1u32)).unwrap();

        let err = root.bind_object("waiting time", Arc::new(2u32));
        assert!(matches!(err, Err(SimError::BindingFailure(_))));

        let bound = root.lookup("waiting time").unwrap();
        assert_eq!(*bound.downcast::<u32>().unwrap(), 1);
    }
}
