use clap::Parser;
use element_chain::{
    Browser, CallContext, ChainDescriber, ChainError, ChainExecutor, ChainOptions, ChromeBrowser, ElementChain,
};
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Evaluate an element chain against a running Chrome and print the trace.
///
/// Chrome must already be running with `--remote-debugging-port`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chrome remote debugging port
    #[arg(short, long, default_value_t = 9222)]
    port: u16,

    /// Chain step, e.g. `select=form`, `with-text=Log in`, `assert-at-least=2`, `click`.
    /// Repeat to build the chain in order.
    #[arg(short, long = "step", required = true)]
    steps: Vec<ProbeStep>,

    /// Pause between failed attempts (defaults to ELEMENT_CHAIN_RETRY_DELAY_MS or 100)
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Budget for the whole evaluation (defaults to ELEMENT_CHAIN_TOTAL_RETRY_TIMEOUT_MS or 2000)
    #[arg(long)]
    total_retry_timeout_ms: Option<u64>,

    /// Budget for one page readiness check (defaults to ELEMENT_CHAIN_PAGE_WAIT_TIMEOUT_MS or 1000)
    #[arg(long)]
    page_wait_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
enum ProbeStep {
    Select(String),
    SelectFromRoot(String),
    WithAttribute(String, String),
    WithText(String),
    Displayed,
    First,
    AssertSingle,
    AssertAtLeast(usize),
    AssertAttribute(String, String),
    Click,
    Type(String),
}

impl FromStr for ProbeStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once('=') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };

        let required = |arg: Option<&str>| {
            arg.map(str::to_string)
                .ok_or_else(|| format!("step '{}' needs an argument ({}=...)", name, name))
        };
        let pair = |arg: Option<&str>| {
            required(arg)?
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| format!("step '{}' takes name=value", name))
        };

        let step = match name {
            "select" => ProbeStep::Select(required(arg)?),
            "select-root" => ProbeStep::SelectFromRoot(required(arg)?),
            "with-attribute" => {
                let (k, v) = pair(arg)?;
                ProbeStep::WithAttribute(k, v)
            }
            "with-text" => ProbeStep::WithText(required(arg)?),
            "displayed" => ProbeStep::Displayed,
            "first" => ProbeStep::First,
            "assert-single" => ProbeStep::AssertSingle,
            "assert-at-least" => ProbeStep::AssertAtLeast(
                required(arg)?
                    .parse()
                    .map_err(|e| format!("assert-at-least: {}", e))?,
            ),
            "assert-attribute" => {
                let (k, v) = pair(arg)?;
                ProbeStep::AssertAttribute(k, v)
            }
            "click" => ProbeStep::Click,
            "type" => ProbeStep::Type(required(arg)?),
            other => return Err(format!("unknown step '{}'", other)),
        };

        Ok(step)
    }
}

impl ProbeStep {
    fn apply(&self, chain: &ElementChain) -> Result<ElementChain, ChainError> {
        match self {
            ProbeStep::Select(css) => chain.select(css),
            ProbeStep::SelectFromRoot(css) => chain.select_from_root(css),
            ProbeStep::WithAttribute(name, value) => chain.with_attribute(name, value),
            ProbeStep::WithText(text) => chain.with_text(text),
            ProbeStep::Displayed => chain.displayed(),
            ProbeStep::First => chain.first(),
            ProbeStep::AssertSingle => chain.assert_single(),
            ProbeStep::AssertAtLeast(n) => chain.assert_at_least(*n),
            ProbeStep::AssertAttribute(name, value) => chain.assert_attribute(name, value),
            ProbeStep::Click => chain.click(),
            ProbeStep::Type(text) => chain.type_text(text),
        }
    }
}

impl Args {
    fn options(&self) -> ChainOptions {
        let mut options = ChainOptions::from_env();
        if let Some(value) = self.retry_delay_ms {
            options.retry_delay_ms = value;
        }
        if let Some(value) = self.total_retry_timeout_ms {
            options.total_retry_timeout_ms = value;
        }
        if let Some(value) = self.page_wait_timeout_ms {
            options.page_wait_timeout_ms = value;
        }
        options
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        log::error!("chain-probe failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let options = args.options();
    log::info!("Connecting to Chrome on port {} ({:?})", args.port, options);

    let browser = ChromeBrowser::connect_debug_port(args.port).await?;
    browser.initialise().await?;

    let context = Arc::new(CallContext::method(
        "chain-probe",
        args.steps
            .iter()
            .map(|step| serde_json::Value::String(format!("{:?}", step)))
            .collect(),
    ));

    let mut chain = ElementChain::new(options).with_context(context);
    for step in &args.steps {
        chain = step.apply(&chain)?;
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling evaluation");
            ctrl_c.cancel();
        }
    });

    let executor = ChainExecutor::new(Arc::new(browser));
    let outcome = executor.execute_with_trace(&chain, &cancel).await;

    println!("{}", ChainDescriber::new().describe_execution(&outcome.execution, true).await);
    let elements = outcome.result?;

    println!("{} element(s) matched after {} attempt(s)", elements.len(), outcome.attempts);
    for element in &elements {
        let tag = element.tag_name().await.unwrap_or_else(|_| "?".to_string());
        let text = element.text().await.unwrap_or_default();
        println!("  <{}> {}", tag, text.trim());
    }

    Ok(())
}
