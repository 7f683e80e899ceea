use crate::command::{
    Builtin, Command, CommandId, CommandMap, Marker, ordinal_key, parse_marker_key,
};
use crate::context::BuildContext;
use crate::error::{DomcastError, DomcastResult};
use crate::merge::{MergeSource, resolve};
use crate::render::{encode_commands, escape_single_quoted, to_json_string};
use crate::typecast::typecast;
use crate::value::{Arg, ResponseSnapshot};
use indexmap::IndexMap;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Sigil that marks a selector as markup for a new element.
pub const NEW_ELEMENT_SIGIL: char = '<';

#[derive(Debug)]
pub(crate) struct ResponseState {
    pub(crate) name: String,
    pub(crate) data: CommandMap,
    pub(crate) last_selector: Option<String>,
    /// Selector to put back after the next recorded command.
    pub(crate) restore: Option<Option<String>>,
    /// `false` swallows the next `cmd` call, then re-arms.
    pub(crate) matched: bool,
    pub(crate) cmd_count: u64,
    pub(crate) merged: IndexMap<String, CommandMap>,
    pub(crate) locals: IndexMap<String, Value>,
}

impl ResponseState {
    fn new(name: String) -> Self {
        Self {
            name,
            data: CommandMap::new(),
            last_selector: None,
            restore: None,
            matched: true,
            cmd_count: 0,
            merged: IndexMap::new(),
            locals: IndexMap::new(),
        }
    }
}

/// Chainable accumulator of client commands.
///
/// A `Response` is a handle: clones (and `BuildContext::get_response`) refer
/// to the same builder. Every builder is registered in its context under a
/// unique name so others can merge it by name.
#[derive(Clone)]
pub struct Response {
    ctx: BuildContext,
    state: Rc<RefCell<ResponseState>>,
}

impl Response {
    pub(crate) fn create(ctx: &BuildContext, selector: Option<&str>) -> Self {
        let name = ctx.fresh_name();
        let state = Rc::new(RefCell::new(ResponseState::new(name.clone())));
        ctx.register(&name, state.clone());
        let mut response = Self {
            ctx: ctx.clone(),
            state,
        };
        if let Some(selector) = selector {
            response.set_selector(selector);
        }
        response
    }

    pub(crate) fn from_parts(ctx: BuildContext, state: Rc<RefCell<ResponseState>>) -> Self {
        Self { ctx, state }
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    /// Re-registers the builder under `name`, evicting the old entry.
    pub fn rename(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        let old = std::mem::replace(&mut self.state.borrow_mut().name, name.clone());
        self.ctx.unregister(&old);
        if self.ctx.register(&name, self.state.clone()).is_some() {
            debug!(name = %name, "rename displaced another response from the registry");
        }
        debug!(from = %old, to = %name, "response renamed");
        self
    }

    pub fn last_selector(&self) -> Option<String> {
        self.state.borrow().last_selector.clone()
    }

    pub fn is_same(&self, other: &Response) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    // --- chaining context ---

    pub fn set_selector(&mut self, selector: &str) -> &mut Self {
        if !selector.is_empty() {
            self.state.borrow_mut().last_selector = Some(selector.to_string());
        }
        self
    }

    /// Selects `selector`; for new-element markup (`<...`) each prop is then
    /// replayed as a same-named command with the prop value as its argument.
    pub fn set_selector_with<I, K, V>(&mut self, selector: &str, props: I) -> DomcastResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Arg>,
    {
        self.set_selector(selector);
        if selector.starts_with(NEW_ELEMENT_SIGIL) {
            for (name, value) in props {
                self.dispatch(name.as_ref(), vec![value.into()])?;
            }
        }
        Ok(self)
    }

    /// Pivots onto the element that triggered the request.
    pub fn this_ref(&mut self) -> &mut Self {
        let key = self.ctx.next_marker(Marker::This);
        self.state.borrow_mut().last_selector = Some(key);
        self
    }

    pub fn document_ref(&mut self) -> &mut Self {
        self.set_selector("document")
    }

    pub fn window_ref(&mut self) -> &mut Self {
        self.set_selector("window")
    }

    /// Pivots onto the client's base capability object itself.
    pub fn jquery_ref(&mut self) -> &mut Self {
        let key = self.ctx.next_marker(Marker::Base);
        self.state.borrow_mut().last_selector = Some(key);
        self
    }

    /// Reaches into a global path for exactly one command, then returns to
    /// the current chain.
    pub fn access(&mut self, path: &str, is_new: bool) -> &mut Self {
        let key = self.ctx.next_marker(Marker::Access);
        let mut state = self.state.borrow_mut();
        state.data.insert(
            key.clone(),
            vec![Command::new(
                Builtin::Typecast,
                vec![Arg::from(path), Arg::Bool(is_new)],
            )],
        );
        let previous = state.last_selector.replace(key);
        if state.restore.is_none() {
            state.restore = Some(previous);
        }
        drop(state);
        self
    }

    /// Calls a server function from the client and pivots the chain onto its
    /// result.
    pub fn remote_call(&mut self, function: &str, args: Vec<Arg>) -> &mut Self {
        let key = self.ctx.next_marker(Marker::Remote);
        let recorded = self.record(
            Builtin::Typecast.into(),
            vec![Arg::from(function), Arg::List(args)],
            Some(&key),
        );
        if recorded {
            self.state.borrow_mut().last_selector = Some(key);
        }
        self
    }

    // --- gates ---

    pub fn unless(&mut self, condition: impl Into<Arg>, remote: bool) -> &mut Self {
        self.gate(condition.into(), remote, Marker::Unless)
    }

    pub fn incase(&mut self, condition: impl Into<Arg>, remote: bool) -> &mut Self {
        self.gate(condition.into(), remote, Marker::Incase)
    }

    fn gate(&mut self, condition: Arg, remote: bool, marker: Marker) -> &mut Self {
        if !remote && !matches!(condition, Arg::Function(_)) {
            let truthy = condition.is_truthy();
            self.state.borrow_mut().matched = match marker {
                Marker::Unless => !truthy,
                _ => truthy,
            };
            return self;
        }
        // The client evaluates the condition and skips the next command, so
        // that command has to follow the conditional under its marker key.
        let key = self.ctx.next_marker(marker);
        if self.state.borrow().matched {
            self.seed_active_selector();
        }
        if self.record(Builtin::Typecast.into(), vec![condition], Some(&key)) {
            self.state.borrow_mut().last_selector = Some(key);
        }
        self
    }

    /// Keeps the current selection visible on the wire before the chain moves
    /// onto a marker key.
    fn seed_active_selector(&self) {
        let mut state = self.state.borrow_mut();
        let Some(selector) = state.last_selector.clone() else {
            return;
        };
        if matches!(parse_marker_key(&selector), Some((Marker::Base, _))) {
            return;
        }
        state.data.entry(selector).or_default();
    }

    // --- accumulation ---

    /// Records one command. Builtins that are never selector-scoped leave the
    /// chain first.
    pub fn cmd(&mut self, id: impl Into<CommandId>, args: Vec<Arg>, selector: Option<&str>) -> &mut Self {
        let id = id.into();
        if matches!(id, CommandId::Builtin(b) if b.clears_selector()) {
            self.state.borrow_mut().last_selector = None;
        }
        self.record(id, args, selector);
        self
    }

    /// Returns `false` when the gate swallowed the command. A swallowed
    /// command still consumes a staged restore.
    fn record(&self, id: CommandId, args: Vec<Arg>, selector: Option<&str>) -> bool {
        {
            let mut state = self.state.borrow_mut();
            if !state.matched {
                state.matched = true;
                if let Some(previous) = state.restore.take() {
                    state.last_selector = previous;
                }
                return false;
            }
        }

        // No borrow is held here: deferred bindings may read this builder
        // through another handle while they compile.
        let opts = self.ctx.cast_options();
        let args = args.iter().map(|arg| typecast(arg, opts)).collect();

        let mut state = self.state.borrow_mut();
        let command = Command::new(id, args);
        let target = selector
            .map(str::to_string)
            .or_else(|| state.last_selector.clone());
        match target {
            Some(key) => state.data.entry(key).or_default().push(command),
            None => {
                let key = ordinal_key(state.cmd_count);
                state.cmd_count += 1;
                state.data.insert(key, vec![command]);
            }
        }

        if let Some(previous) = state.restore.take() {
            state.last_selector = previous;
        }
        true
    }

    /// Forwards any client capability by name. Needs an active selector;
    /// without one the call is dropped.
    pub fn generic_command(&mut self, name: &str, args: Vec<Arg>) -> &mut Self {
        if self.state.borrow().last_selector.is_none() {
            debug!(command = name, "dropping dynamic command with no active selector");
            return self;
        }
        self.cmd(CommandId::Dynamic(name.to_string()), args, None)
    }

    /// Name-based entry point: builtin names go to their typed method after an
    /// arity check, everything else to `generic_command`.
    pub fn dispatch(&mut self, name: &str, args: Vec<Arg>) -> DomcastResult<&mut Self> {
        let Some(builtin) = Builtin::from_name(name) else {
            return Ok(self.generic_command(name, args));
        };
        let mut args = args.into_iter();
        let count = args.len();
        let arity = |min: usize, max: usize| -> DomcastResult<()> {
            if count < min || count > max {
                let expected = if min == max {
                    format!("{min}")
                } else if max == usize::MAX {
                    format!("at least {min}")
                } else {
                    format!("{min} to {max}")
                };
                return Err(DomcastError::invalid_arguments(
                    name,
                    format!("expected {expected} argument(s), got {count}"),
                ));
            }
            Ok(())
        };

        match builtin {
            Builtin::Alert => {
                arity(1, 1)?;
                Ok(self.alert(take(&mut args)))
            }
            Builtin::Call => {
                arity(1, usize::MAX)?;
                let function = string_arg(name, take(&mut args), "function name")?;
                let rest: Vec<Arg> = args.collect();
                Ok(self.call(&function, rest))
            }
            Builtin::Script => {
                arity(1, 1)?;
                let code = string_arg(name, take(&mut args), "code")?;
                Ok(self.script(&code))
            }
            Builtin::Json => {
                arity(1, 1)?;
                Ok(self.json(take(&mut args)))
            }
            Builtin::RenderView => {
                arity(1, 2)?;
                let view = string_arg(name, take(&mut args), "view")?;
                Ok(self.render_view(&view, take(&mut args)))
            }
            Builtin::Redirect => {
                arity(1, 1)?;
                let url = string_arg(name, take(&mut args), "url")?;
                Ok(self.redirect(&url))
            }
            Builtin::Dump => {
                arity(1, 1)?;
                Ok(self.dump(take(&mut args)))
            }
            Builtin::Exception => {
                arity(1, 1)?;
                let message = string_arg(name, take(&mut args), "message")?;
                Ok(self.exception(&message))
            }
            Builtin::SetVar => {
                arity(2, 2)?;
                let var = string_arg(name, take(&mut args), "variable name")?;
                Ok(self.set_var(&var, take(&mut args)))
            }
            Builtin::UnsetVar => {
                arity(1, 1)?;
                let var = string_arg(name, take(&mut args), "variable name")?;
                Ok(self.unset_var(&var))
            }
            Builtin::Include => {
                arity(1, 1)?;
                let resource = string_arg(name, take(&mut args), "resource")?;
                Ok(self.include(&resource))
            }
            Builtin::Publish => {
                arity(2, 2)?;
                let channel = string_arg(name, take(&mut args), "channel")?;
                Ok(self.publish(&channel, take(&mut args)))
            }
            Builtin::RenewToken => {
                arity(1, 1)?;
                let token = string_arg(name, take(&mut args), "token")?;
                Ok(self.renew_token(&token))
            }
            Builtin::Typecast => Err(DomcastError::invalid_arguments(
                name,
                "reserved for conditional, access and remote-call payloads",
            )),
        }
    }

    // --- typed commands ---

    pub fn alert(&mut self, message: impl Into<Arg>) -> &mut Self {
        self.cmd(Builtin::Alert, vec![message.into()], None)
    }

    pub fn call(&mut self, function: &str, args: Vec<Arg>) -> &mut Self {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(Arg::from(function));
        all.extend(args);
        self.cmd(Builtin::Call, all, None)
    }

    pub fn script(&mut self, code: &str) -> &mut Self {
        self.cmd(Builtin::Script, vec![Arg::from(code)], None)
    }

    pub fn json(&mut self, value: impl Into<Arg>) -> &mut Self {
        self.cmd(Builtin::Json, vec![value.into()], None)
    }

    pub fn render_view(&mut self, view: &str, data: impl Into<Arg>) -> &mut Self {
        self.cmd(Builtin::RenderView, vec![Arg::from(view), data.into()], None)
    }

    pub fn redirect(&mut self, url: &str) -> &mut Self {
        self.cmd(Builtin::Redirect, vec![Arg::from(url)], None)
    }

    pub fn dump(&mut self, value: impl Into<Arg>) -> &mut Self {
        self.cmd(Builtin::Dump, vec![value.into()], None)
    }

    pub fn exception(&mut self, message: &str) -> &mut Self {
        self.cmd(Builtin::Exception, vec![Arg::from(message)], None)
    }

    pub fn set_var(&mut self, name: &str, value: impl Into<Arg>) -> &mut Self {
        self.cmd(Builtin::SetVar, vec![Arg::from(name), value.into()], None)
    }

    pub fn unset_var(&mut self, name: &str) -> &mut Self {
        self.cmd(Builtin::UnsetVar, vec![Arg::from(name)], None)
    }

    pub fn include(&mut self, resource: &str) -> &mut Self {
        self.cmd(Builtin::Include, vec![Arg::from(resource)], None)
    }

    pub fn publish(&mut self, channel: &str, payload: impl Into<Arg>) -> &mut Self {
        self.cmd(Builtin::Publish, vec![Arg::from(channel), payload.into()], None)
    }

    pub fn renew_token(&mut self, token: &str) -> &mut Self {
        self.cmd(Builtin::RenewToken, vec![Arg::from(token)], None)
    }

    // --- merge & output ---

    pub fn merge<'a>(&mut self, source: impl Into<MergeSource<'a>>) -> &mut Self {
        let other = match source.into() {
            MergeSource::Response(r) => r.clone(),
            MergeSource::Name(name) => match self.ctx.get_response(name) {
                Some(r) => r,
                None => {
                    debug!(name, "merge source not registered; skipping");
                    return self;
                }
            },
        };
        let name = other.name();
        let snapshot = other.process_merged();
        self.state.borrow_mut().merged.insert(name, snapshot);
        self
    }

    pub fn process_merged(&self) -> CommandMap {
        resolve(&self.state.borrow())
    }

    pub fn snapshot(&self) -> ResponseSnapshot {
        ResponseSnapshot {
            name: self.name(),
            commands: self.process_merged(),
        }
    }

    pub fn to_value(&self) -> DomcastResult<Value> {
        encode_commands(&self.process_merged(), "$")
    }

    pub fn render(&self) -> DomcastResult<String> {
        to_json_string(&self.to_value()?, self.ctx.config().pretty)
    }

    /// `render()` made safe for a single-quoted argument of an inline script.
    pub fn render_inline(&self) -> DomcastResult<String> {
        self.render().map(|rendered| escape_single_quoted(&rendered))
    }

    // --- local storage ---

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.state
            .borrow_mut()
            .locals
            .insert(key.into(), value.into());
        self
    }

    /// Local value, falling back to the context's global store.
    pub fn get(&self, key: &str) -> Option<Value> {
        let local = self.state.borrow().locals.get(key).cloned();
        local.or_else(|| self.ctx.get_global(key))
    }

    pub fn has(&self, key: &str) -> bool {
        self.state.borrow().locals.contains_key(key) || self.ctx.has_global(key)
    }

    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.state.borrow_mut().locals.shift_remove(key)
    }
}

impl From<&Response> for Arg {
    fn from(value: &Response) -> Self {
        Arg::Response(value.snapshot())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Response")
            .field("name", &state.name)
            .field("last_selector", &state.last_selector)
            .field("keys", &state.data.len())
            .field("merged", &state.merged.len())
            .finish()
    }
}

fn take(args: &mut impl Iterator<Item = Arg>) -> Arg {
    args.next().unwrap_or(Arg::Null)
}

fn string_arg(command: &str, arg: Arg, what: &str) -> DomcastResult<String> {
    match arg {
        Arg::Str(s) => Ok(s),
        other => Err(DomcastError::invalid_arguments(
            command,
            format!("{what} must be a string, got {other:?}"),
        )),
    }
}
