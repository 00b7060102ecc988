//! Script runner interface
//!
//! Loading and injecting script modules into the page lives outside this crate.
//! Chain steps only need to invoke an exported function against the current set.

use crate::browser::ElementHandle;
use async_trait::async_trait;
use serde_json::Value;

/// Invokes named functions exported by script modules loaded into the page.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Call `function` exported by `module` (or the module's default export when
    /// `function` is `None`). The current element set is passed as the first
    /// argument, followed by `args`.
    ///
    /// `Ok(None)` means the function produced no replacement set.
    async fn invoke_function(
        &self,
        module: &str,
        function: Option<&str>,
        elements: &[ElementHandle],
        args: &[Value],
    ) -> anyhow::Result<Option<Vec<ElementHandle>>>;
}
