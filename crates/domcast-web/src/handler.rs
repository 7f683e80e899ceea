use crate::reply::Reply;
use domcast_core::{BuildConfig, BuildContext, Response};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What a handler hands back. Only `Response` gets special treatment; plain
/// values are passed through untouched.
#[derive(Debug)]
pub enum Outcome {
    Response(Response),
    Value(Value),
    Empty,
}

impl From<Response> for Outcome {
    fn from(value: Response) -> Self {
        Outcome::Response(value)
    }
}

impl From<&mut Response> for Outcome {
    fn from(value: &mut Response) -> Self {
        Outcome::Response(value.clone())
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Value(value)
    }
}

impl From<()> for Outcome {
    fn from(_: ()) -> Self {
        Outcome::Empty
    }
}

impl<T: Into<Outcome>> From<Option<T>> for Outcome {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Outcome::Empty)
    }
}

/// Server function: parsed request args, opaque shared context, and the
/// request's build context.
pub type Handler = Arc<dyn Fn(&Value, &Value, &BuildContext) -> Outcome + Send + Sync + 'static>;

#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Handler>,
    config: BuildConfig,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BuildConfig) -> Self {
        Self {
            handlers: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn register<F, O>(&mut self, name: &str, handler: F) -> Result<(), String>
    where
        F: Fn(&Value, &Value, &BuildContext) -> O + Send + Sync + 'static,
        O: Into<Outcome>,
    {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(format!("invalid handler name '{name}'"));
        }
        self.handlers.insert(
            name.to_string(),
            Arc::new(
                move |args: &Value, shared: &Value, ctx: &BuildContext| -> Outcome {
                    handler(args, shared, ctx).into()
                },
            ),
        );
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Runs one handler against a fresh build context and encodes whatever it
    /// returned.
    pub fn invoke(&self, name: &str, args: &Value, shared: &Value) -> Reply {
        let Some(handler) = self.handlers.get(name) else {
            debug!(handler = name, "no handler registered");
            return Reply::diagnostic(
                404,
                "DOMCAST_E_HANDLER",
                &format!("no handler registered as '{name}'"),
            );
        };
        let ctx = BuildContext::with_config(self.config.clone());
        let outcome = handler(args, shared, &ctx);
        Reply::from_outcome(outcome)
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("handlers", &self.names())
            .field("config", &self.config)
            .finish()
    }
}
