//! Chain describer
//!
//! Renders declaration and execution graphs as indented, human-readable traces.
//! Consecutive nodes appended by the same caller are grouped under that caller:
//!
//! ```text
//! ClickButton('Log in') : [
//!   Select('button')
//!   WithText('Log in')
//! ]
//!  -> nodes : [
//!   Click()
//! ]
//! ```

use super::context::CallContext;
use super::declaration::DeclarationNode;
use super::execution::{ExecutionChain, ExecutionNode};
use super::ElementChain;
use crate::browser::{ElementHandle, Location};
use crate::error::BrowserError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;

const INDENT_SIZE: usize = 4;

/// Elements rendered in detail per element list; the rest are only counted
const MAX_ELEMENT_DETAILS: usize = 20;

const DETAIL_ATTRIBUTES: [&str; 4] = ["id", "class", "aria-label", "text"];

/// Width of the longest detail attribute name, used to align values
const DETAIL_NAME_WIDTH: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct ChainDescriber;

impl ChainDescriber {
    pub fn new() -> Self {
        Self
    }

    /// Describe the declared steps of `chain`. No browser access.
    pub fn describe(&self, chain: &ElementChain) -> String {
        let Some(leaf) = chain.leaf() else {
            return "[empty]".to_string();
        };

        let mut out = String::new();
        let mut groups = ContextGroups::default();

        for node in DeclarationNode::lineage(leaf) {
            groups.enter(&mut out, node.context());
            out.push_str("  ");
            out.push_str(node.descriptor());
            out.push('\n');
        }

        groups.finish(&mut out);
        out
    }

    /// Describe what happened during one evaluation attempt.
    ///
    /// With `element_detail` set, each recorded element list is followed by the
    /// tag, position and a few identifying attributes of its first elements. That
    /// costs several browser round trips per element; without it only counts are shown.
    pub async fn describe_execution(&self, execution: &ExecutionChain, element_detail: bool) -> String {
        if execution.is_empty() {
            return "[empty]".to_string();
        }

        let mut out = String::new();
        let mut groups = ContextGroups::default();
        let mut failed = false;

        for node in execution.nodes() {
            groups.enter(&mut out, node.declaration().context());
            render_node(&mut out, node, 0, element_detail, &mut failed).await;
        }

        groups.finish(&mut out);
        out
    }
}

/// Tracks which calling context the trace is currently inside
#[derive(Default)]
struct ContextGroups {
    current: Option<Option<Arc<CallContext>>>,
}

impl ContextGroups {
    fn enter(&mut self, out: &mut String, context: Option<&Arc<CallContext>>) {
        if let Some(current) = &self.current {
            let same = match (current, context) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if same {
                return;
            }
            out.push_str("]\n -> ");
        }

        match context {
            Some(ctx) => out.push_str(&ctx.to_string()),
            None => out.push_str("nodes"),
        }
        out.push_str(" : [\n");

        self.current = Some(context.cloned());
    }

    fn finish(&self, out: &mut String) {
        if self.current.is_some() {
            out.push_str("]\n");
        }
    }
}

fn render_node<'a>(
    out: &'a mut String,
    node: &'a ExecutionNode,
    depth: usize,
    element_detail: bool,
    failed: &'a mut bool,
) -> BoxFuture<'a, ()> {
    async move {
        line(out, depth, node.descriptor());

        if !node.was_executed() {
            if *failed {
                line(out, depth + 1, "not run - previous node failed");
            } else {
                line(out, depth + 1, "skipped - using cached results from previous evaluation");
            }
            return;
        }

        line(out, depth + 2, "Input:");
        render_elements(out, node.input().unwrap_or_default(), element_detail, depth + 3).await;

        if !node.children().is_empty() {
            line(out, depth + 2, "Children: [");
            for child in node.children() {
                line(out, depth + 3, "Nested Chain:");
                for nested in child.nodes() {
                    render_node(out, nested, depth + 4, element_detail, failed).await;
                }
            }
            line(out, depth + 2, "]");
        }

        if let Some(failure) = node.failure() {
            *failed = true;
            line(out, depth + 2, &format!("NODE FAILED - {}", failure.kind));
            line(out, depth + 3, &failure.message);
        } else if node.output().is_none() {
            line(out, depth + 2, "Node Incomplete - nested chain failed");
        } else if node.declaration().modifies_set() {
            line(out, depth + 2, "Node Passed - Output:");
            render_elements(out, node.output().unwrap_or_default(), element_detail, depth + 3).await;
        } else {
            line(out, depth + 2, "Node Passed");
        }
    }
    .boxed()
}

async fn render_elements(out: &mut String, elements: &[ElementHandle], element_detail: bool, depth: usize) {
    match elements.len() {
        0 => line(out, depth, "No elements."),
        1 => line(out, depth, "1 element."),
        n => line(out, depth, &format!("{} elements.", n)),
    }

    if !element_detail {
        return;
    }

    for (idx, element) in elements.iter().take(MAX_ELEMENT_DETAILS).enumerate() {
        match ElementDetail::read(element).await {
            Ok(detail) => detail.render(out, idx, depth),
            Err(err) if err.is_stale() => {
                line(out, depth, &format!("[{}] - element stale - no detail available", idx));
            }
            Err(err) => {
                line(out, depth, &format!("[{}] - error reading element info - {}", idx, err));
            }
        }
    }

    if elements.len() > MAX_ELEMENT_DETAILS {
        line(
            out,
            depth,
            &format!("... {} more not shown", elements.len() - MAX_ELEMENT_DETAILS),
        );
    }
}

/// Everything shown for one element, read up front so a stale element never
/// leaves a half-written entry behind
struct ElementDetail {
    tag: String,
    position: Option<Location>,
    attributes: Vec<(&'static str, String)>,
}

impl ElementDetail {
    async fn read(element: &ElementHandle) -> Result<Self, BrowserError> {
        let tag = element.tag_name().await?;
        let position = if element.is_displayed().await? {
            Some(element.location().await?)
        } else {
            None
        };

        let mut attributes = Vec::new();
        for name in DETAIL_ATTRIBUTES {
            if let Some(value) = element.attribute(name).await? {
                if !value.trim().is_empty() {
                    attributes.push((name, value));
                }
            }
        }

        Ok(Self {
            tag,
            position,
            attributes,
        })
    }

    fn render(&self, out: &mut String, idx: usize, depth: usize) {
        let header = match self.position {
            Some(at) => format!("[{}] - <{} /> at X {:.0}, Y {:.0}", idx, self.tag, at.x, at.y),
            None => format!("[{}] - <{} /> - not displayed", idx, self.tag),
        };
        line(out, depth, &header);

        for (name, value) in &self.attributes {
            line(
                out,
                depth + 1,
                &format!("{:<width$}{}", format!("{}: ", name), value, width = DETAIL_NAME_WIDTH + 2),
            );
        }
    }
}

fn line(out: &mut String, depth: usize, text: &str) {
    out.extend(std::iter::repeat(' ').take(INDENT_SIZE * depth));
    out.push_str(text);
    out.push('\n');
}
