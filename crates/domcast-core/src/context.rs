use crate::command::{Marker, marker_key};
use crate::config::BuildConfig;
use crate::response::{Response, ResponseState};
use crate::typecast::CastOptions;
use indexmap::IndexMap;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

struct ContextState {
    config: BuildConfig,
    responses: IndexMap<String, Rc<RefCell<ResponseState>>>,
    globals: IndexMap<String, Value>,
    next_name: u64,
    next_marker: u64,
}

/// Per-request home of everything that would otherwise be process-global:
/// the builder registry, the shared value store and the marker counter.
///
/// Cloning yields another handle to the same context. A context is meant to
/// live for exactly one request and is not `Send`.
#[derive(Clone)]
pub struct BuildContext {
    inner: Rc<RefCell<ContextState>>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::with_config(BuildConfig::default())
    }

    pub fn with_config(config: BuildConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ContextState {
                config,
                responses: IndexMap::new(),
                globals: IndexMap::new(),
                next_name: 0,
                next_marker: 0,
            })),
        }
    }

    pub fn config(&self) -> BuildConfig {
        self.inner.borrow().config.clone()
    }

    pub(crate) fn cast_options(&self) -> CastOptions {
        CastOptions::from_config(&self.inner.borrow().config)
    }

    pub fn response(&self) -> Response {
        Response::create(self, None)
    }

    pub fn response_at(&self, selector: &str) -> Response {
        Response::create(self, Some(selector))
    }

    pub fn get_response(&self, name: &str) -> Option<Response> {
        let state = self.inner.borrow().responses.get(name).cloned();
        if state.is_none() {
            debug!(name, "no response registered under name");
        }
        state.map(|state| Response::from_parts(self.clone(), state))
    }

    /// Registered names in registration order. A renamed builder moves to
    /// the end.
    pub fn response_names(&self) -> Vec<String> {
        self.inner.borrow().responses.keys().cloned().collect()
    }

    pub fn set_global(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .borrow_mut()
            .globals
            .insert(key.into(), value.into());
    }

    pub fn get_global(&self, key: &str) -> Option<Value> {
        self.inner.borrow().globals.get(key).cloned()
    }

    pub fn has_global(&self, key: &str) -> bool {
        self.inner.borrow().globals.contains_key(key)
    }

    pub fn remove_global(&self, key: &str) -> Option<Value> {
        self.inner.borrow_mut().globals.shift_remove(key)
    }

    pub(crate) fn fresh_name(&self) -> String {
        let mut inner = self.inner.borrow_mut();
        loop {
            let name = format!("response_{}", inner.next_name);
            inner.next_name += 1;
            if !inner.responses.contains_key(&name) {
                return name;
            }
        }
    }

    pub(crate) fn next_marker(&self, marker: Marker) -> String {
        let mut inner = self.inner.borrow_mut();
        let n = inner.next_marker;
        inner.next_marker += 1;
        marker_key(marker, n)
    }

    /// Returns the builder previously registered under `name`, if any.
    pub(crate) fn register(
        &self,
        name: &str,
        state: Rc<RefCell<ResponseState>>,
    ) -> Option<Rc<RefCell<ResponseState>>> {
        let mut inner = self.inner.borrow_mut();
        let previous = inner.responses.shift_remove(name);
        inner.responses.insert(name.to_string(), state);
        previous
    }

    pub(crate) fn unregister(&self, name: &str) {
        self.inner.borrow_mut().responses.shift_remove(name);
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("BuildContext")
            .field("config", &inner.config)
            .field("responses", &inner.responses.len())
            .field("globals", &inner.globals.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_response_registers_under_a_unique_name() {
        let ctx = BuildContext::new();
        let a = ctx.response();
        let b = ctx.response();
        assert_ne!(a.name(), b.name());
        assert_eq!(ctx.response_names(), vec![a.name(), b.name()]);
        assert!(ctx.get_response(&a.name()).is_some());
        assert!(ctx.get_response("missing").is_none());
    }

    #[test]
    fn names_are_listed_in_registration_order() {
        let ctx = BuildContext::new();
        let created: Vec<String> = (0..12).map(|_| ctx.response().name()).collect();
        assert_eq!(ctx.response_names(), created);
        assert_eq!(ctx.response_names()[10], "response_10");
        assert_eq!(ctx.response_names()[2], "response_2");
    }

    #[test]
    fn markers_never_repeat_within_a_context() {
        let ctx = BuildContext::new();
        let first = ctx.next_marker(Marker::This);
        let second = ctx.next_marker(Marker::Unless);
        assert_eq!(first, "{~0}");
        assert_eq!(second, "{!1}");
    }

    #[test]
    fn contexts_are_isolated() {
        let one = BuildContext::new();
        let two = BuildContext::new();
        one.set_global("user", json!("ada"));
        let r = one.response();
        assert!(two.get_response(&r.name()).is_none());
        assert_eq!(two.get_global("user"), None);
        assert_eq!(one.get_global("user"), Some(json!("ada")));
    }

    #[test]
    fn global_store_is_last_writer_wins() {
        let ctx = BuildContext::new();
        ctx.set_global("k", 1);
        ctx.set_global("k", 2);
        assert!(ctx.has_global("k"));
        assert_eq!(ctx.remove_global("k"), Some(json!(2)));
        assert!(!ctx.has_global("k"));
    }
}
