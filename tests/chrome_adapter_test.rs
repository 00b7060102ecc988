//! Chain evaluation against a real Chrome page
//!
//! These tests launch a local Chrome and are ignored by default.
//! Run them with: `cargo test --test chrome_adapter_test -- --ignored --test-threads=1`

use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use element_chain::{Browser, ChainExecutor, ChainOptions, ChromeBrowser, ElementChain, WebElement};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const PAGE: &str = "data:text/html,<html><body>\
<ul><li class='item'>One</li><li class='item' style='display:none'>Two</li></ul>\
<button id='go' onclick='this.textContent=\"Clicked\"'>Go</button>\
<input id='name' />\
</body></html>";

async fn launch() -> (CdpBrowser, tokio::task::JoinHandle<()>, ChromeBrowser) {
    let config = BrowserConfig::builder()
        .build()
        .expect("Failed to build browser config");
    let (browser, mut handler) = CdpBrowser::launch(config)
        .await
        .expect("Failed to launch Chrome");

    let events = tokio::spawn(async move {
        while handler.next().await.is_some() {}
    });

    let page = browser.new_page(PAGE).await.expect("Failed to open page");
    let chrome = ChromeBrowser::from_page(page);
    chrome.initialise().await.expect("Page should be attached");

    (browser, events, chrome)
}

#[tokio::test]
#[ignore = "requires a local Chrome installation"]
async fn test_select_filter_and_click() {
    let (mut browser, events, chrome) = launch().await;
    let executor = ChainExecutor::new(Arc::new(chrome));
    let cancel = CancellationToken::new();

    let items = ElementChain::new(ChainOptions::default())
        .select("li.item")
        .unwrap()
        .displayed()
        .unwrap()
        .with_text("One")
        .unwrap()
        .assert_single()
        .unwrap();
    let elements = executor.execute(&items, &cancel).await.expect("Chain failed");
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0].tag_name().await.unwrap(), "li");
    println!("✅ Found visible list item");

    let button = ElementChain::new(ChainOptions::default())
        .select("#go")
        .unwrap()
        .click()
        .unwrap();
    let elements = executor.execute(&button, &cancel).await.expect("Click failed");
    assert_eq!(elements[0].text().await.unwrap(), "Clicked");
    println!("✅ Clicked button");

    browser.close().await.expect("Failed to close browser");
    let _ = events.await;
}

#[tokio::test]
#[ignore = "requires a local Chrome installation"]
async fn test_type_into_input() {
    let (mut browser, events, chrome) = launch().await;
    let executor = ChainExecutor::new(Arc::new(chrome));

    let chain = ElementChain::new(ChainOptions::default())
        .select("#name")
        .unwrap()
        .type_text("alice")
        .unwrap()
        .assert_attribute("id", "name")
        .unwrap();
    let elements = executor
        .execute(&chain, &CancellationToken::new())
        .await
        .expect("Typing failed");
    assert_eq!(elements.len(), 1);

    browser.close().await.expect("Failed to close browser");
    let _ = events.await;
}
