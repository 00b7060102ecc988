//! Element chains
//!
//! An [`ElementChain`] is an immutable handle on the last step of a declared
//! sequence of element queries, filters, assertions and actions. Appending a step
//! returns a new handle and leaves the old one usable, so a common prefix can be
//! extended in several directions (which is how grouping branches are built).
//!
//! Nothing touches the browser until a [`ChainExecutor`] evaluates the chain.

pub mod context;
pub mod declaration;
pub mod describer;
pub mod execution;
pub mod executor;
pub mod ops;

pub use context::CallContext;
pub use declaration::{DeclarationNode, NodeCallback, NodeKind, Reducer};
pub use describer::ChainDescriber;
pub use execution::{ExecutionChain, ExecutionNode, NodeFailure};
pub use executor::{ChainExecutor, ChainOutcome};

use crate::browser::{BrowserHandle, ElementHandle};
use crate::config::ChainOptions;
use crate::error::ChainError;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builds one branch of a grouping node from a fresh, empty chain
pub type BranchBuilder = Box<dyn FnOnce(ElementChain) -> Result<ElementChain, ChainError> + Send>;

/// Box a branch builder closure for [`ElementChain::add_grouping_node`] and [`ElementChain::union`]
pub fn branch<F>(build: F) -> BranchBuilder
where
    F: FnOnce(ElementChain) -> Result<ElementChain, ChainError> + Send + 'static,
{
    Box::new(build)
}

#[derive(Clone)]
pub struct ElementChain {
    leaf: Option<Arc<DeclarationNode>>,
    options: ChainOptions,
    context: Option<Arc<CallContext>>,
}

impl ElementChain {
    /// An empty chain. Evaluates to no elements without touching the browser.
    pub fn new(options: ChainOptions) -> Self {
        Self {
            leaf: None,
            options,
            context: None,
        }
    }

    /// Same chain; nodes appended from here on are attributed to `context`.
    pub fn with_context(&self, context: Arc<CallContext>) -> Self {
        Self {
            leaf: self.leaf.clone(),
            options: self.options.clone(),
            context: Some(context),
        }
    }

    pub fn leaf(&self) -> Option<&Arc<DeclarationNode>> {
        self.leaf.as_ref()
    }

    pub fn options(&self) -> &ChainOptions {
        &self.options
    }

    pub fn context(&self) -> Option<&Arc<CallContext>> {
        self.context.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.leaf.is_none()
    }

    /// Number of top-level nodes in the chain
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut current = self.leaf.as_ref();
        while let Some(node) = current {
            count += 1;
            current = node.previous();
        }
        count
    }

    /// Append a step that produces a new element set.
    pub fn add_node<F, Fut>(&self, descriptor: impl Into<String>, callback: F) -> Result<Self, ChainError>
    where
        F: Fn(Vec<ElementHandle>, BrowserHandle, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<ElementHandle>>> + Send + 'static,
    {
        let callback: NodeCallback = Arc::new(
            move |elements: Vec<ElementHandle>, browser: BrowserHandle, cancel: CancellationToken| {
                callback(elements, browser, cancel).boxed()
            },
        );

        self.append(descriptor.into(), true, NodeKind::Single { callback })
    }

    /// Append a step that only observes or acts on the set; its input passes through unchanged.
    pub fn add_action<F, Fut>(&self, descriptor: impl Into<String>, action: F) -> Result<Self, ChainError>
    where
        F: Fn(Vec<ElementHandle>, BrowserHandle, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let callback: NodeCallback = Arc::new(
            move |elements: Vec<ElementHandle>, browser: BrowserHandle, cancel: CancellationToken| {
                let pending = action(elements.clone(), browser, cancel);
                async move {
                    pending.await?;
                    Ok::<_, anyhow::Error>(elements)
                }
                .boxed()
            },
        );

        self.append(descriptor.into(), false, NodeKind::Single { callback })
    }

    /// Synchronous form of [`add_node`](Self::add_node).
    pub fn add_filter<F>(&self, descriptor: impl Into<String>, filter: F) -> Result<Self, ChainError>
    where
        F: Fn(&[ElementHandle]) -> anyhow::Result<Vec<ElementHandle>> + Send + Sync + 'static,
    {
        self.add_node(descriptor, move |elements, _browser, _cancel| {
            futures::future::ready(filter(&elements))
        })
    }

    /// Synchronous form of [`add_action`](Self::add_action).
    pub fn add_check<F>(&self, descriptor: impl Into<String>, check: F) -> Result<Self, ChainError>
    where
        F: Fn(&[ElementHandle]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add_action(descriptor, move |elements, _browser, _cancel| {
            futures::future::ready(check(&elements))
        })
    }

    /// Append a step that forks into independent nested chains.
    ///
    /// Each builder gets a fresh empty chain carrying this chain's options and
    /// context. At evaluation every branch receives this node's input, the branches
    /// run one after another in declared order, and `reducer` merges their outputs.
    pub fn add_grouping_node<R>(
        &self,
        descriptor: impl Into<String>,
        reducer: R,
        branches: Vec<BranchBuilder>,
    ) -> Result<Self, ChainError>
    where
        R: Fn(Vec<Vec<ElementHandle>>) -> anyhow::Result<Vec<ElementHandle>> + Send + Sync + 'static,
    {
        let branches = branches
            .into_iter()
            .map(|build| build(self.fresh()))
            .collect::<Result<Vec<_>, _>>()?;

        let kind = NodeKind::Grouping {
            branches,
            reducer: Arc::new(reducer),
        };

        self.append(descriptor.into(), true, kind)
    }

    /// An empty chain sharing this chain's options and context
    fn fresh(&self) -> Self {
        Self {
            leaf: None,
            options: self.options.clone(),
            context: self.context.clone(),
        }
    }

    fn append(&self, descriptor: String, modifies_set: bool, kind: NodeKind) -> Result<Self, ChainError> {
        let node = DeclarationNode::new(
            self.leaf.clone(),
            descriptor,
            modifies_set,
            self.context.clone(),
            kind,
        )?;

        Ok(Self {
            leaf: Some(Arc::new(node)),
            options: self.options.clone(),
            context: self.context.clone(),
        })
    }
}

impl fmt::Debug for ElementChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementChain")
            .field("leaf", &self.leaf.as_ref().map(|n| n.descriptor()))
            .field("len", &self.len())
            .field("options", &self.options)
            .finish()
    }
}
