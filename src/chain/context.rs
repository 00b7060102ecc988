use serde_json::Value;
use std::fmt;

/// Who appended a run of chain nodes. Only used to group nodes in diagnostics;
/// two contexts are the same group when they are the same `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub enum CallContext {
    /// A method call with its bound arguments
    Method { name: String, arguments: Vec<Value> },

    /// A step of a test, e.g. `Given` + `I click the login button`
    Step { keyword: String, text: String },
}

impl CallContext {
    pub fn method(name: impl Into<String>, arguments: Vec<Value>) -> Self {
        CallContext::Method {
            name: name.into(),
            arguments,
        }
    }

    pub fn step(keyword: impl Into<String>, text: impl Into<String>) -> Self {
        CallContext::Step {
            keyword: keyword.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallContext::Method { name, arguments } => {
                write!(f, "{}(", name)?;
                for (idx, arg) in arguments.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    match arg {
                        Value::String(s) => write!(f, "'{}'", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                f.write_str(")")
            }
            CallContext::Step { keyword, text } => write!(f, "{} {}", keyword, text),
        }
    }
}
