//! Diagnostic traces rendered from real evaluations


use element_chain::{
    branch, AssertionError, CallContext, ChainDescriber, ChainExecutor, ChainOptions, ElementChain,
};
use mock_browser::{init_logging, MockBrowser, MockElement};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn options() -> ChainOptions {
    ChainOptions::default()
        .with_retry_delay_ms(10)
        .with_total_retry_timeout_ms(60)
}

#[tokio::test]
async fn test_failed_assertion_trace_with_element_detail() {
    init_logging();
    let go = MockElement::new("go", "button")
        .attr("id", "go")
        .attr("class", "btn primary")
        .at(10.4, 20.6)
        .build();
    let spare = MockElement::new("spare", "button").hidden().build();
    let browser = MockBrowser::new().with_query("button", &[go, spare]);
    let executor = ChainExecutor::new(browser);

    let chain = ElementChain::new(options())
        .select("button")
        .unwrap()
        .assert_single()
        .unwrap();
    let outcome = executor
        .execute_with_trace(&chain, &CancellationToken::new())
        .await;
    assert!(outcome.result.is_err());

    let trace = ChainDescriber::new()
        .describe_execution(&outcome.execution, true)
        .await;
    println!("{}", trace);

    let expected = "\
nodes : [
Select('button')
        Input:
            No elements.
        Node Passed - Output:
            2 elements.
            [0] - <button /> at X 10, Y 21
                id:         go
                class:      btn primary
            [1] - <button /> - not displayed
AssertSingle()
        Input:
            2 elements.
            [0] - <button /> at X 10, Y 21
                id:         go
                class:      btn primary
            [1] - <button /> - not displayed
        NODE FAILED - AssertionError
            Expecting a single element, but found 2.
]
";
    assert_eq!(trace, expected);
}

#[tokio::test]
async fn test_trace_without_detail_only_counts() {
    init_logging();
    let browser = MockBrowser::new().with_query("p", &[MockElement::new("p", "p").build()]);
    let executor = ChainExecutor::new(browser);

    let chain = ElementChain::new(options()).select("p").unwrap().click().unwrap();
    let outcome = executor
        .execute_with_trace(&chain, &CancellationToken::new())
        .await;
    outcome.result.expect("click should succeed");

    let trace = ChainDescriber::new()
        .describe_execution(&outcome.execution, false)
        .await;

    assert_eq!(
        trace,
        "nodes : [\nSelect('p')\n        Input:\n            No elements.\n        Node Passed - Output:\n            1 element.\nClick()\n        Input:\n            1 element.\n        Node Passed\n]\n"
    );
}

#[tokio::test]
async fn test_unreadable_elements_do_not_abort_trace() {
    init_logging();
    let gone = MockElement::new("gone", "li").build();
    let broken = MockElement::new("broken", "li").broken("boom").build();
    let fine = MockElement::new("fine", "li").build();
    let browser = MockBrowser::new().with_query("li", &[gone.clone(), broken, fine]);
    let executor = ChainExecutor::new(browser);

    let chain = ElementChain::new(options()).select("li").unwrap();
    let outcome = executor
        .execute_with_trace(&chain, &CancellationToken::new())
        .await;
    outcome.result.expect("select should succeed");

    gone.make_stale();
    let trace = ChainDescriber::new()
        .describe_execution(&outcome.execution, true)
        .await;
    println!("{}", trace);

    assert!(trace.contains("            [0] - element stale - no detail available\n"));
    assert!(trace.contains("            [1] - error reading element info - Other error: boom\n"));
    assert!(trace.contains("            [2] - <li /> at X 0, Y 0\n"));
}

#[tokio::test]
async fn test_element_detail_is_capped() {
    init_logging();
    let items: Vec<_> = (0..25)
        .map(|idx| MockElement::new(&format!("item{}", idx), "li").build())
        .collect();
    let browser = MockBrowser::new().with_query("li", &items);
    let executor = ChainExecutor::new(browser);

    let chain = ElementChain::new(options()).select("li").unwrap();
    let outcome = executor
        .execute_with_trace(&chain, &CancellationToken::new())
        .await;
    outcome.result.expect("select should succeed");

    let trace = ChainDescriber::new()
        .describe_execution(&outcome.execution, true)
        .await;

    assert!(trace.contains("25 elements."));
    assert!(trace.contains("[19] - <li />"));
    assert!(!trace.contains("[20] - <li />"));
    assert!(trace.contains("... 5 more not shown"));
}

#[tokio::test]
async fn test_nodes_after_failure_are_not_run() {
    init_logging();
    let executor = ChainExecutor::new(MockBrowser::new());

    let chain = ElementChain::new(options())
        .add_filter("Broken()", |_| Err(AssertionError::new("no luck").into()))
        .unwrap()
        .first()
        .unwrap();
    let outcome = executor
        .execute_with_trace(&chain, &CancellationToken::new())
        .await;
    assert!(outcome.result.is_err());

    let trace = ChainDescriber::new()
        .describe_execution(&outcome.execution, false)
        .await;

    assert!(trace.contains("        NODE FAILED - AssertionError\n            no luck\n"));
    assert!(trace.contains("First()\n    not run - previous node failed\n"));
}

#[tokio::test]
async fn test_cached_prefix_is_reported_as_skipped() {
    init_logging();
    let browser = MockBrowser::new().with_query("ul", &[MockElement::new("ul", "ul").build()]);
    let executor = ChainExecutor::new(browser);
    let cancel = CancellationToken::new();

    let prefix = ElementChain::new(options()).select("ul").unwrap();
    executor.execute(&prefix, &cancel).await.unwrap();

    let extended = prefix.assert_single().unwrap();
    let outcome = executor.execute_with_trace(&extended, &cancel).await;
    outcome.result.expect("cached prefix still holds one element");

    let trace = ChainDescriber::new()
        .describe_execution(&outcome.execution, false)
        .await;

    assert_eq!(
        trace,
        "nodes : [\nSelect('ul')\n    skipped - using cached results from previous evaluation\nAssertSingle()\n        Input:\n            1 element.\n        Node Passed\n]\n"
    );
}

#[tokio::test]
async fn test_failed_branch_marks_grouping_incomplete() {
    init_logging();
    let executor = ChainExecutor::new(MockBrowser::new());

    let chain = ElementChain::new(options())
        .union(vec![
            branch(|c| c.add_filter("Fine()", |elements| Ok(elements.to_vec()))),
            branch(|c| c.add_filter("Fails()", |_| Err(AssertionError::new("branch broke").into()))),
        ])
        .unwrap();
    let outcome = executor
        .execute_with_trace(&chain, &CancellationToken::new())
        .await;
    assert!(outcome.result.is_err());

    let trace = ChainDescriber::new()
        .describe_execution(&outcome.execution, false)
        .await;
    println!("{}", trace);

    let expected = "\
nodes : [
Union
        Input:
            No elements.
        Children: [
            Nested Chain:
                Fine()
                        Input:
                            No elements.
                        Node Passed - Output:
                            No elements.
            Nested Chain:
                Fails()
                        Input:
                            No elements.
                        NODE FAILED - AssertionError
                            branch broke
        ]
        Node Incomplete - nested chain failed
]
";
    assert_eq!(trace, expected);
}

#[tokio::test]
async fn test_execution_trace_grouped_by_context() {
    init_logging();
    let field = MockElement::new("field", "input").build();
    let browser = MockBrowser::new().with_query("input", &[field]);
    let executor = ChainExecutor::new(browser);

    let find = Arc::new(CallContext::method("FindField", vec![json!("input")]));
    let step = Arc::new(CallContext::step("When", "I type hello"));

    let chain = ElementChain::new(options())
        .with_context(find)
        .select("input")
        .unwrap()
        .with_context(step)
        .type_text("hello")
        .unwrap();
    let outcome = executor
        .execute_with_trace(&chain, &CancellationToken::new())
        .await;
    outcome.result.expect("typing should succeed");

    let trace = ChainDescriber::new()
        .describe_execution(&outcome.execution, false)
        .await;

    assert!(trace.starts_with("FindField('input') : [\nSelect('input')\n"));
    assert!(trace.contains("]\n -> When I type hello : [\nType('hello')\n"));
    assert!(trace.ends_with("        Node Passed\n]\n"));
}
