pub mod browser;
pub mod chain;
pub mod config;
pub mod error;
pub mod script;

//  Re-export commonly used items
pub use browser::{Browser, BrowserHandle, ChromeBrowser, ChromeElement, ElementHandle, Location, WebElement};
pub use chain::{
    branch, BranchBuilder, CallContext, ChainDescriber, ChainExecutor, ChainOutcome, DeclarationNode,
    ElementChain, ExecutionChain, ExecutionNode, NodeFailure, NodeKind,
};
pub use config::ChainOptions;
pub use error::{AssertionError, BrowserError, ChainError};
pub use script::ScriptRunner;
pub use tokio_util::sync::CancellationToken;
