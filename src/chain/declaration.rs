//! Declaration graph
//!
//! Immutable, reference-counted step descriptions. Each node points back at its
//! predecessor, so chains that share a prefix share the very same nodes.

use super::context::CallContext;
use super::ElementChain;
use crate::browser::{BrowserHandle, ElementHandle};
use crate::error::ChainError;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Future returned by a node callback
pub type NodeFuture = BoxFuture<'static, anyhow::Result<Vec<ElementHandle>>>;

/// Step body: current elements in, new elements out
pub type NodeCallback =
    Arc<dyn Fn(Vec<ElementHandle>, BrowserHandle, CancellationToken) -> NodeFuture + Send + Sync>;

/// Merges one element list per branch (in declared order) into a single list
pub type Reducer =
    Arc<dyn Fn(Vec<Vec<ElementHandle>>) -> anyhow::Result<Vec<ElementHandle>> + Send + Sync>;

pub enum NodeKind {
    Single {
        callback: NodeCallback,
    },
    Grouping {
        branches: Vec<ElementChain>,
        reducer: Reducer,
    },
}

pub struct DeclarationNode {
    descriptor: String,
    modifies_set: bool,
    previous: Option<Arc<DeclarationNode>>,
    context: Option<Arc<CallContext>>,
    kind: NodeKind,
    // The only mutable state in the graph. Shared by every chain holding this
    // node as a prefix; the executor writes it after a successful evaluation.
    cached: Mutex<Option<Vec<ElementHandle>>>,
}

impl DeclarationNode {
    pub(crate) fn new(
        previous: Option<Arc<DeclarationNode>>,
        descriptor: String,
        modifies_set: bool,
        context: Option<Arc<CallContext>>,
        kind: NodeKind,
    ) -> Result<Self, ChainError> {
        if descriptor.trim().is_empty() {
            return Err(ChainError::InvalidDeclaration(
                "node descriptor must not be blank".to_string(),
            ));
        }

        Ok(Self {
            descriptor,
            modifies_set,
            previous,
            context,
            kind,
            cached: Mutex::new(None),
        })
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Whether this step can change the element set (as opposed to only observing it)
    pub fn modifies_set(&self) -> bool {
        self.modifies_set
    }

    pub fn previous(&self) -> Option<&Arc<DeclarationNode>> {
        self.previous.as_ref()
    }

    pub fn context(&self) -> Option<&Arc<CallContext>> {
        self.context.as_ref()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_grouping(&self) -> bool {
        matches!(self.kind, NodeKind::Grouping { .. })
    }

    /// Output proven by an earlier successful evaluation, if any
    pub fn cached_elements(&self) -> Option<Vec<ElementHandle>> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_cache(&self) -> bool {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub(crate) fn store_cache(&self, elements: Vec<ElementHandle>) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(elements);
    }

    /// Every node from the root of the chain up to and including `leaf`, root first
    pub fn lineage(leaf: &Arc<DeclarationNode>) -> Vec<Arc<DeclarationNode>> {
        let mut nodes = Vec::new();
        let mut current = Some(leaf);

        while let Some(node) = current {
            nodes.push(Arc::clone(node));
            current = node.previous.as_ref();
        }

        nodes.reverse();
        nodes
    }
}

impl fmt::Debug for DeclarationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclarationNode")
            .field("descriptor", &self.descriptor)
            .field("modifies_set", &self.modifies_set)
            .field("grouping", &self.is_grouping())
            .field("cached", &self.has_cache())
            .finish()
    }
}
