//! Execution graph
//!
//! A mutable, per-attempt mirror of a declaration chain that records what each
//! node saw and produced. The executor builds a fresh one for every attempt; the
//! describer renders the most recent one.

use super::declaration::{DeclarationNode, NodeKind};
use crate::browser::ElementHandle;
use crate::error::{AssertionError, BrowserError, ChainError};
use std::sync::Arc;

/// Why a node did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    /// Short error category, e.g. `AssertionError`
    pub kind: &'static str,
    pub message: String,
}

impl NodeFailure {
    pub fn from_error(err: &ChainError) -> Self {
        let kind = match err {
            ChainError::InvalidDeclaration(_) => "InvalidDeclaration",
            ChainError::Cancelled => "Cancelled",
            ChainError::PageNotReady(_) => "PageNotReady",
            ChainError::Node(inner) if inner.is::<AssertionError>() => "AssertionError",
            ChainError::Node(inner) if inner.is::<BrowserError>() => "BrowserError",
            ChainError::Node(_) => "Error",
        };

        Self {
            kind,
            message: format!("{:#}", err),
        }
    }
}

#[derive(Debug)]
pub struct ExecutionNode {
    declaration: Arc<DeclarationNode>,
    input: Option<Vec<ElementHandle>>,
    output: Option<Vec<ElementHandle>>,
    failure: Option<NodeFailure>,
    children: Vec<ExecutionChain>,
}

impl ExecutionNode {
    fn new(declaration: Arc<DeclarationNode>) -> Self {
        let children = match declaration.kind() {
            NodeKind::Grouping { branches, .. } => branches
                .iter()
                .map(|branch| ExecutionChain::build(branch.leaf()))
                .collect(),
            NodeKind::Single { .. } => Vec::new(),
        };

        Self {
            declaration,
            input: None,
            output: None,
            failure: None,
            children,
        }
    }

    pub fn declaration(&self) -> &Arc<DeclarationNode> {
        &self.declaration
    }

    pub fn descriptor(&self) -> &str {
        self.declaration.descriptor()
    }

    pub fn input(&self) -> Option<&[ElementHandle]> {
        self.input.as_deref()
    }

    pub fn output(&self) -> Option<&[ElementHandle]> {
        self.output.as_deref()
    }

    pub fn failure(&self) -> Option<&NodeFailure> {
        self.failure.as_ref()
    }

    /// One nested chain per grouping branch, empty for single nodes
    pub fn children(&self) -> &[ExecutionChain] {
        &self.children
    }

    pub fn was_executed(&self) -> bool {
        self.input.is_some()
    }

    pub(crate) fn children_mut(&mut self) -> &mut [ExecutionChain] {
        &mut self.children
    }

    pub(crate) fn set_input(&mut self, elements: Vec<ElementHandle>) {
        self.input = Some(elements);
    }

    pub(crate) fn set_output(&mut self, elements: Vec<ElementHandle>) {
        self.output = Some(elements);
    }

    pub(crate) fn set_failure(&mut self, err: &ChainError) {
        self.failure = Some(NodeFailure::from_error(err));
    }
}

/// Execution nodes in declared order
#[derive(Debug, Default)]
pub struct ExecutionChain {
    nodes: Vec<ExecutionNode>,
}

impl ExecutionChain {
    /// Mirror the chain ending at `leaf`. `None` gives an empty chain.
    pub fn build(leaf: Option<&Arc<DeclarationNode>>) -> Self {
        let nodes = match leaf {
            Some(leaf) => DeclarationNode::lineage(leaf)
                .into_iter()
                .map(ExecutionNode::new)
                .collect(),
            None => Vec::new(),
        };

        Self { nodes }
    }

    pub fn nodes(&self) -> &[ExecutionNode] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [ExecutionNode] {
        &mut self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of the node nearest the tail whose declaration holds cached elements
    pub fn last_with_cache(&self) -> Option<usize> {
        self.nodes
            .iter()
            .rposition(|node| node.declaration.has_cache())
    }
}
