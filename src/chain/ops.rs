//! Built-in chain steps
//!
//! Selection, filtering, assertion, action, set and script steps expressed on top
//! of [`ElementChain::add_node`], [`ElementChain::add_action`] and
//! [`ElementChain::add_grouping_node`].

use super::{BranchBuilder, ElementChain};
use crate::browser::{BrowserHandle, ElementHandle};
use crate::error::{AssertionError, ChainError};
use crate::script::ScriptRunner;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

impl ElementChain {
    /// Find elements matching `css`. On an empty chain the query runs from the
    /// document root; otherwise it runs inside each element currently in the set.
    pub fn select(&self, css: &str) -> Result<Self, ChainError> {
        require_non_blank("css query", css)?;

        if self.is_empty() {
            return self.select_from_root(css);
        }

        let query = css.to_string();
        self.add_node(format!("Select('{}')", css), move |elements, _browser, _cancel| {
            select_within(elements, query.clone())
        })
    }

    /// Find elements matching `css` from the document root, ignoring the current set.
    pub fn select_from_root(&self, css: &str) -> Result<Self, ChainError> {
        require_non_blank("css query", css)?;

        let query = css.to_string();
        self.add_node(format!("Select('{}')", css), move |_elements, browser, _cancel| {
            select_from_document(browser, query.clone())
        })
    }

    /// Keep elements whose `name` attribute equals `value`.
    pub fn with_attribute(&self, name: &str, value: &str) -> Result<Self, ChainError> {
        require_non_blank("attribute name", name)?;

        let name = name.to_string();
        let value = value.to_string();
        self.add_node(
            format!("WithAttribute({}, {})", name, value),
            move |elements, _browser, _cancel| keep_with_attribute(elements, name.clone(), value.clone()),
        )
    }

    /// Keep elements whose rendered text equals `text`.
    pub fn with_text(&self, text: &str) -> Result<Self, ChainError> {
        let expected = text.to_string();
        self.add_node(format!("WithText('{}')", text), move |elements, _browser, _cancel| {
            keep_with_text(elements, expected.clone())
        })
    }

    /// Keep elements that are currently displayed.
    pub fn displayed(&self) -> Result<Self, ChainError> {
        self.add_node("Displayed()", |elements, _browser, _cancel| keep_displayed(elements))
    }

    pub fn first(&self) -> Result<Self, ChainError> {
        self.add_filter("First()", |elements| Ok(elements.iter().take(1).cloned().collect()))
    }

    /// Fail unless the set holds exactly one element.
    pub fn assert_single(&self) -> Result<Self, ChainError> {
        self.add_check("AssertSingle()", |elements| {
            if elements.len() != 1 {
                return Err(AssertionError::new(format!(
                    "Expecting a single element, but found {}.",
                    elements.len()
                ))
                .into());
            }
            Ok(())
        })
    }

    /// Fail unless the set holds at least `minimum` elements.
    pub fn assert_at_least(&self, minimum: usize) -> Result<Self, ChainError> {
        self.add_check(format!("AssertAtLeast({})", minimum), move |elements| {
            if elements.len() < minimum {
                return Err(AssertionError::new(format!(
                    "Expecting at least {} element(s), but found {}.",
                    minimum,
                    elements.len()
                ))
                .into());
            }
            Ok(())
        })
    }

    /// Fail unless every element in the set has `value` for attribute `name`.
    pub fn assert_attribute(&self, name: &str, value: &str) -> Result<Self, ChainError> {
        require_non_blank("attribute name", name)?;

        let name = name.to_string();
        let value = value.to_string();
        self.add_action(
            format!("AssertAttribute('{}', '{}')", name, value),
            move |elements, _browser, _cancel| check_attribute(elements, name.clone(), value.clone()),
        )
    }

    /// Click the first element. It must exist and be displayed.
    pub fn click(&self) -> Result<Self, ChainError> {
        self.add_action("Click()", |elements, _browser, _cancel| click_first(elements))
    }

    /// Type into the first element, which must be displayed and enabled. With an
    /// empty set the text is typed onto the page.
    pub fn type_text(&self, text: &str) -> Result<Self, ChainError> {
        let keys = text.to_string();
        self.add_action(format!("Type('{}')", text), move |elements, browser, _cancel| {
            type_into_first(elements, browser, keys.clone())
        })
    }

    /// Evaluate each branch against the current set and combine the results,
    /// keeping the first occurrence of every element.
    pub fn union(&self, branches: Vec<BranchBuilder>) -> Result<Self, ChainError> {
        self.add_grouping_node("Union", |sets| Ok(distinct(sets)), branches)
    }

    /// Call a function exported by a script module with the current set as its
    /// first argument. A function that returns nothing leaves the set unchanged.
    pub fn invoke_script(
        &self,
        runner: Arc<dyn ScriptRunner>,
        module: &str,
        function: Option<&str>,
        args: Vec<Value>,
    ) -> Result<Self, ChainError> {
        require_non_blank("script module name", module)?;

        let descriptor = match function {
            Some(function) => format!("js.{}.{}", module, function),
            None => format!("js.{}", module),
        };

        let module = module.to_string();
        let function = function.map(str::to_string);
        self.add_node(descriptor, move |elements, _browser, _cancel| {
            invoke(
                Arc::clone(&runner),
                module.clone(),
                function.clone(),
                elements,
                args.clone(),
            )
        })
    }
}

fn require_non_blank(what: &str, value: &str) -> Result<(), ChainError> {
    if value.trim().is_empty() {
        return Err(ChainError::InvalidDeclaration(format!("{} must not be blank", what)));
    }
    Ok(())
}

async fn select_within(elements: Vec<ElementHandle>, query: String) -> anyhow::Result<Vec<ElementHandle>> {
    let mut found = Vec::new();
    for element in &elements {
        found.extend(element.find_elements(&query).await?);
    }
    Ok(found)
}

async fn select_from_document(browser: BrowserHandle, query: String) -> anyhow::Result<Vec<ElementHandle>> {
    Ok(browser.find_elements(&query).await?)
}

async fn keep_with_attribute(
    elements: Vec<ElementHandle>,
    name: String,
    value: String,
) -> anyhow::Result<Vec<ElementHandle>> {
    let mut kept = Vec::new();
    for element in elements {
        if element.attribute(&name).await?.as_deref() == Some(value.as_str()) {
            kept.push(element);
        }
    }
    Ok(kept)
}

async fn keep_with_text(elements: Vec<ElementHandle>, expected: String) -> anyhow::Result<Vec<ElementHandle>> {
    let mut kept = Vec::new();
    for element in elements {
        if element.text().await? == expected {
            kept.push(element);
        }
    }
    Ok(kept)
}

async fn keep_displayed(elements: Vec<ElementHandle>) -> anyhow::Result<Vec<ElementHandle>> {
    let mut kept = Vec::new();
    for element in elements {
        if element.is_displayed().await? {
            kept.push(element);
        }
    }
    Ok(kept)
}

async fn check_attribute(elements: Vec<ElementHandle>, name: String, value: String) -> anyhow::Result<()> {
    for (idx, element) in elements.iter().enumerate() {
        let actual = element.attribute(&name).await?;
        if actual.as_deref() != Some(value.as_str()) {
            return Err(AssertionError::new(format!(
                "Expecting an '{}' of '{}' for element at index {} but found '{}'.",
                name,
                value,
                idx,
                actual.unwrap_or_default()
            ))
            .into());
        }
    }
    Ok(())
}

async fn click_first(elements: Vec<ElementHandle>) -> anyhow::Result<()> {
    let Some(element) = elements.first() else {
        return Err(AssertionError::new("Expecting an element to click, but no elements found.").into());
    };

    if !element.is_displayed().await? {
        return Err(AssertionError::new(
            "Element is not displayed. Cannot click on an invisible element.",
        )
        .into());
    }

    element.click().await?;
    Ok(())
}

async fn type_into_first(elements: Vec<ElementHandle>, browser: BrowserHandle, text: String) -> anyhow::Result<()> {
    let Some(element) = elements.first() else {
        browser.send_keys(&text).await?;
        return Ok(());
    };

    if !element.is_displayed().await? {
        return Err(AssertionError::new(
            "Element is not displayed. Cannot type into an invisible element.",
        )
        .into());
    }

    if !element.is_enabled().await? {
        return Err(AssertionError::new(
            "Element is not enabled. Cannot type in a disabled element.",
        )
        .into());
    }

    element.send_keys(&text).await?;
    Ok(())
}

async fn invoke(
    runner: Arc<dyn ScriptRunner>,
    module: String,
    function: Option<String>,
    elements: Vec<ElementHandle>,
    args: Vec<Value>,
) -> anyhow::Result<Vec<ElementHandle>> {
    let result = runner
        .invoke_function(&module, function.as_deref(), &elements, &args)
        .await?;

    Ok(result.unwrap_or(elements))
}

/// Concatenate the sets in order, dropping repeats of the same DOM node
fn distinct(sets: Vec<Vec<ElementHandle>>) -> Vec<ElementHandle> {
    let mut seen = HashSet::new();
    sets.into_iter()
        .flatten()
        .filter(|element| seen.insert(element.element_id()))
        .collect()
}
