#![forbid(unsafe_code)]

//! Hierarchical, type-keyed registry of live node instances.
//!
//! # Design
//!
//! A [`Scope`] stores at most one node per concrete type, keyed by
//! [`TypeId`] (the compile-time type tag; no runtime reflection). Scopes
//! form an explicit parent chain: a child holds a handle to its parent, and
//! [`find`](Scope::find) walks that chain on a miss. The scope's lifetime is
//! tied to a UI subtree by the host: create on mount, [`dispose_all`]
//! (Scope::dispose_all) on unmount.
//!
//! Registration drives the node lifecycle: `register` attaches the node,
//! connects its pending bridges in FIFO order, and invokes `on_init`;
//! `unregister` runs the full teardown sequence.

use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use tracing::debug;

use crate::error::{Result, RuntimeError};
use crate::node::{Node, dispose_node};

struct Entry {
    /// For downcasting back to the concrete node type.
    instance: Rc<dyn Any>,
    /// For lifecycle dispatch without knowing the concrete type.
    node: Rc<dyn Node>,
    type_name: &'static str,
}

struct ScopeInner {
    parent: Option<Scope>,
    nodes: RefCell<AHashMap<TypeId, Entry>>,
}

/// A shared handle to one scope level. Cloning shares the level; see
/// [`child()`](Scope::child) for nesting.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// A fresh root scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                parent: None,
                nodes: RefCell::new(AHashMap::new()),
            }),
        }
    }

    /// A nested scope whose lookups fall back to `self`.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                parent: Some(self.clone()),
                nodes: RefCell::new(AHashMap::new()),
            }),
        }
    }

    /// Register `node` at this level and run its attach sequence: set the
    /// back-reference, connect pending bridges FIFO, invoke `on_init`.
    ///
    /// Fails fast if a node of the same type is already registered at this
    /// level, or if `node` was already attached somewhere.
    pub fn register<N: Node>(&self, node: Rc<N>) -> Result<()> {
        let key = TypeId::of::<N>();
        let name = type_name::<N>();
        if self.inner.nodes.borrow().contains_key(&key) {
            return Err(RuntimeError::DuplicateNode { type_name: name });
        }
        node.base().attach(self, name)?;
        node.base().connect_pending(self)?;
        self.inner.nodes.borrow_mut().insert(
            key,
            Entry {
                instance: node.clone(),
                node: node.clone(),
                type_name: name,
            },
        );
        debug!(node = name, "node attached");
        node.on_init();
        Ok(())
    }

    /// Remove the node of type `N` from this level and run its full
    /// teardown sequence.
    pub fn unregister<N: Node>(&self) -> Result<()> {
        let entry = self
            .inner
            .nodes
            .borrow_mut()
            .remove(&TypeId::of::<N>())
            .ok_or(RuntimeError::NotRegistered {
                type_name: type_name::<N>(),
            })?;
        dispose_node(entry.node.as_ref(), entry.type_name);
        Ok(())
    }

    /// The node of type `N` registered at **this** level, if any.
    #[must_use]
    pub fn get<N: Node>(&self) -> Option<Rc<N>> {
        self.inner
            .nodes
            .borrow()
            .get(&TypeId::of::<N>())
            .and_then(|entry| Rc::clone(&entry.instance).downcast::<N>().ok())
    }

    /// The node of type `N` at this level or the nearest enclosing scope.
    /// Exhausting the ancestor chain is a configuration error naming the
    /// requested type.
    pub fn find<N: Node>(&self) -> Result<Rc<N>> {
        let mut current = Some(self.clone());
        while let Some(scope) = current {
            if let Some(node) = scope.get::<N>() {
                return Ok(node);
            }
            current = scope.inner.parent.clone();
        }
        Err(RuntimeError::NodeNotFound {
            type_name: type_name::<N>(),
        })
    }

    /// Dispose every registered node (sibling order unspecified) and clear
    /// the level. The host calls this when the owning UI subtree is torn
    /// down.
    pub fn dispose_all(&self) {
        let entries: Vec<Entry> = {
            let mut nodes = self.inner.nodes.borrow_mut();
            nodes.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &entries {
            dispose_node(entry.node.as_ref(), entry.type_name);
        }
        debug!(count = entries.len(), "scope disposed");
    }

    /// Number of nodes registered at this level.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.nodes.borrow().len()
    }

    /// Whether this level holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.nodes.borrow().is_empty()
    }

    /// A non-owning handle, used as the node-side back-reference.
    #[must_use]
    pub fn downgrade(&self) -> WeakScope {
        WeakScope {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Weak counterpart of [`Scope`].
#[derive(Clone)]
pub struct WeakScope {
    inner: Weak<ScopeInner>,
}

impl WeakScope {
    /// Upgrade to a strong handle if the scope is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Scope> {
        self.inner.upgrade().map(|inner| Scope { inner })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
