//! Chain executor
//!
//! Evaluates an [`ElementChain`] against a live browser. Transient failures are
//! retried until the chain's wall-clock budget runs out; a chain whose prefix
//! was proven by an earlier evaluation resumes after that prefix until the first
//! failure shows the cached elements can no longer be trusted.

use super::declaration::NodeKind;
use super::describer::ChainDescriber;
use super::execution::{ExecutionChain, ExecutionNode};
use super::ElementChain;
use crate::browser::{BrowserHandle, ElementHandle};
use crate::config::ChainOptions;
use crate::error::ChainError;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::Level;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// What one call to [`ChainExecutor::execute_with_trace`] produced
#[derive(Debug)]
pub struct ChainOutcome {
    pub result: Result<Vec<ElementHandle>, ChainError>,
    /// Execution graph of the last attempt (unexecuted if no attempt ran)
    pub execution: ExecutionChain,
    pub attempts: u32,
}

pub struct ChainExecutor {
    browser: BrowserHandle,
    describer: ChainDescriber,
}

impl ChainExecutor {
    pub fn new(browser: BrowserHandle) -> Self {
        Self {
            browser,
            describer: ChainDescriber::new(),
        }
    }

    /// Evaluate `chain` and return the elements its last node produced.
    ///
    /// Errors from node callbacks come back as they were raised (wrapped only in
    /// [`ChainError::Node`]). Cancellation stops evaluation at once and is never
    /// retried.
    pub async fn execute(
        &self,
        chain: &ElementChain,
        cancel: &CancellationToken,
    ) -> Result<Vec<ElementHandle>, ChainError> {
        self.execute_with_trace(chain, cancel).await.result
    }

    /// Like [`execute`](Self::execute), but also hands back the execution graph of
    /// the last attempt so the caller can render or inspect it.
    pub async fn execute_with_trace(&self, chain: &ElementChain, cancel: &CancellationToken) -> ChainOutcome {
        let Some(leaf) = chain.leaf() else {
            return ChainOutcome {
                result: Ok(Vec::new()),
                execution: ExecutionChain::default(),
                attempts: 0,
            };
        };

        let options = chain.options();
        let mut execution = ExecutionChain::build(Some(leaf));
        let mut resume_from = execution.last_with_cache();

        let started = Instant::now();
        let deadline = started + options.total_retry_timeout();

        let mut attempts: u32 = 0;
        let mut retry_pending = false;
        let mut last_error: Option<ChainError> = None;
        let mut results: Option<Vec<ElementHandle>> = None;

        loop {
            if retry_pending {
                if log::log_enabled!(Level::Debug) {
                    match &last_error {
                        Some(err) => {
                            log::debug!("Element chain attempt {} failed: {}", attempts, err);
                            let trace = self.describer.describe_execution(&execution, false).await;
                            log::debug!("{}", trace);
                        }
                        None => log::debug!("Page not ready after attempt {}", attempts),
                    }
                    log::debug!("Retrying element chain in {}ms", options.retry_delay_ms);
                }

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        last_error = Some(ChainError::Cancelled);
                        break;
                    }
                    _ = tokio::time::sleep(options.retry_delay()) => {}
                }
            }

            attempts += 1;
            retry_pending = true;

            match self.page_ready(options, cancel).await {
                Err(err) => {
                    last_error = Some(err);
                    break;
                }
                Ok(false) => {}
                Ok(true) => {
                    execution = ExecutionChain::build(Some(leaf));

                    match self.attempt(&mut execution, resume_from, cancel).await {
                        Ok(elements) => {
                            leaf.store_cache(elements.clone());
                            results = Some(elements);
                            last_error = None;
                            break;
                        }
                        Err(err) if err.is_cancelled() => {
                            last_error = Some(err);
                            break;
                        }
                        Err(err) => {
                            log::warn!("Element chain attempt {} failed: {}", attempts, err);
                            // Whatever was cached may be what broke this attempt.
                            resume_from = None;
                            last_error = Some(err);
                        }
                    }
                }
            }

            if Instant::now() >= deadline {
                break;
            }
        }

        if let Some(elements) = results {
            log::debug!(
                "Element chain succeeded after {} attempt(s) in {:?}",
                attempts,
                started.elapsed()
            );
            if log::log_enabled!(Level::Debug) {
                let trace = self.describer.describe_execution(&execution, true).await;
                log::debug!("{}", trace);
            }
            return ChainOutcome {
                result: Ok(elements),
                execution,
                attempts,
            };
        }

        let result = match last_error {
            Some(ChainError::Cancelled) => {
                log::warn!("Element chain evaluation cancelled after {} attempt(s)", attempts);
                Err(ChainError::Cancelled)
            }
            Some(err) => {
                log::error!(
                    "Element chain failed after {} attempt(s) in {:?}: {}",
                    attempts,
                    started.elapsed(),
                    err
                );
                let trace = self.describer.describe_execution(&execution, true).await;
                log::error!("{}", trace);
                Err(err)
            }
            None => {
                let elapsed = started.elapsed();
                log::error!(
                    "Page did not become ready for element chain within {:?}",
                    elapsed
                );
                Err(ChainError::PageNotReady(elapsed))
            }
        };

        ChainOutcome {
            result,
            execution,
            attempts,
        }
    }

    /// Ask the browser whether the page is ready. A wait that outlives its
    /// budget counts as not ready; cancellation is an error.
    async fn page_ready(
        &self,
        options: &ChainOptions,
        cancel: &CancellationToken,
    ) -> Result<bool, ChainError> {
        let budget = options.page_wait_budget();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChainError::Cancelled),
            ready = tokio::time::timeout(budget, self.browser.wait_for_page_ready(cancel)) => {
                match ready {
                    Ok(ready) => Ok(ready),
                    Err(_) => {
                        log::debug!("Page readiness check timed out after {:?}", budget);
                        Ok(false)
                    }
                }
            }
        }
    }

    /// One pass over a fresh execution graph, optionally resuming after the cached node at `resume_from`.
    async fn attempt(
        &self,
        execution: &mut ExecutionChain,
        resume_from: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ElementHandle>, ChainError> {
        let cached = resume_from.and_then(|idx| {
            execution
                .nodes()
                .get(idx)
                .and_then(|node| node.declaration().cached_elements())
                .map(|elements| (idx + 1, elements))
        });

        let (start, input) = match cached {
            Some((start, elements)) => {
                log::trace!("Resuming element chain at node {} from cached elements", start);
                (start, elements)
            }
            None => (0, Vec::new()),
        };

        run_chain(&self.browser, execution, start, input, cancel).await
    }
}

fn run_chain<'a>(
    browser: &'a BrowserHandle,
    chain: &'a mut ExecutionChain,
    start: usize,
    input: Vec<ElementHandle>,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, Result<Vec<ElementHandle>, ChainError>> {
    async move {
        let mut elements = input;
        for node in chain.nodes_mut().iter_mut().skip(start) {
            elements = run_node(browser, node, elements, cancel).await?;
        }
        Ok(elements)
    }
    .boxed()
}

async fn run_node(
    browser: &BrowserHandle,
    node: &mut ExecutionNode,
    input: Vec<ElementHandle>,
    cancel: &CancellationToken,
) -> Result<Vec<ElementHandle>, ChainError> {
    node.set_input(input.clone());

    if cancel.is_cancelled() {
        let err = ChainError::Cancelled;
        node.set_failure(&err);
        return Err(err);
    }

    let declaration = Arc::clone(node.declaration());
    let result = match declaration.kind() {
        NodeKind::Single { callback } => callback(input, Arc::clone(browser), cancel.clone())
            .await
            .map_err(ChainError::from_callback),
        NodeKind::Grouping { reducer, .. } => {
            let mut outputs = Vec::with_capacity(node.children().len());
            for child in node.children_mut() {
                if child.is_empty() {
                    outputs.push(Vec::new());
                    continue;
                }
                // The failing node inside the branch already carries the failure.
                outputs.push(run_chain(browser, child, 0, input.clone(), cancel).await?);
            }
            reducer(outputs).map_err(ChainError::from_callback)
        }
    };

    match result {
        Ok(elements) => {
            node.set_output(elements.clone());
            Ok(elements)
        }
        Err(err) => {
            node.set_failure(&err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::Browser;
    use crate::error::BrowserError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NeverReady {
        checks: AtomicUsize,
    }

    #[async_trait]
    impl Browser for NeverReady {
        async fn find_elements(&self, css: &str) -> crate::error::Result<Vec<ElementHandle>> {
            Err(BrowserError::ElementNotFound(css.to_string()))
        }

        async fn send_keys(&self, _text: &str) -> crate::error::Result<()> {
            Ok(())
        }

        async fn wait_for_page_ready(&self, _cancel: &CancellationToken) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    #[tokio::test]
    async fn test_page_never_ready() {
        let browser = Arc::new(NeverReady {
            checks: AtomicUsize::new(0),
        });
        let executor = ChainExecutor::new(browser.clone());

        let options = ChainOptions::default()
            .with_retry_delay_ms(10)
            .with_total_retry_timeout_ms(100);
        let chain = ElementChain::new(options)
            .add_filter("never runs", |_| panic!("node ran on an unready page"))
            .unwrap();

        let err = executor
            .execute(&chain, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::PageNotReady(_)));
        assert!(browser.checks.load(Ordering::SeqCst) > 1);
    }
}
