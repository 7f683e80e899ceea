use crate::error::DomcastResult;
use crate::value::Arg;
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
enum Binding {
    Value(Arg),
    Deferred(Rc<dyn Fn() -> Arg>),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Binding::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Client-side script fragment carried as data.
///
/// Parameters appear in the source as `$name`. Bound values are written in as
/// JSON literals when the fragment is compiled; `bind_with` closures run at
/// that moment, so the emitted value is whatever they return at compile time.
#[derive(Debug, Clone)]
pub struct JsFunction {
    source: String,
    named: bool,
    bindings: IndexMap<String, Binding>,
}

impl JsFunction {
    pub fn raw(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            named: false,
            bindings: IndexMap::new(),
        }
    }

    /// Reference to a function the client already knows by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            source: name.into(),
            named: true,
            bindings: IndexMap::new(),
        }
    }

    pub fn is_named(&self) -> bool {
        self.named
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bind(mut self, param: &str, value: impl Into<Arg>) -> Self {
        self.bindings
            .insert(param_name(param), Binding::Value(value.into()));
        self
    }

    pub fn bind_with<F>(mut self, param: &str, value: F) -> Self
    where
        F: Fn() -> Arg + 'static,
    {
        self.bindings
            .insert(param_name(param), Binding::Deferred(Rc::new(value)));
        self
    }

    pub fn compile(&self) -> DomcastResult<String> {
        if self.named || self.bindings.is_empty() {
            return Ok(self.source.clone());
        }

        let mut literals = IndexMap::with_capacity(self.bindings.len());
        for (name, binding) in &self.bindings {
            let value = match binding {
                Binding::Value(v) => v.encode_at(&format!("${name}"))?,
                Binding::Deferred(f) => f().encode_at(&format!("${name}"))?,
            };
            literals.insert(name.as_str(), value.to_string());
        }

        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source.as_str();
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let ident_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            match literals.get(&after[..ident_len]) {
                Some(literal) if ident_len > 0 => out.push_str(literal),
                _ => {
                    out.push('$');
                    out.push_str(&after[..ident_len]);
                }
            }
            rest = &after[ident_len..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn param_name(param: &str) -> String {
    param.trim_start_matches('$').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn substitutes_json_literals() {
        let f = JsFunction::raw("show($msg, $count)")
            .bind("msg", "it's \"ok\"")
            .bind("$count", 3);
        assert_eq!(f.compile().unwrap(), r#"show("it's \"ok\"", 3)"#);
    }

    #[test]
    fn respects_identifier_boundaries() {
        let f = JsFunction::raw("$a + $ab + $abc + $('#x')").bind("ab", 2);
        assert_eq!(f.compile().unwrap(), "$a + 2 + $abc + $('#x')");
    }

    #[test]
    fn deferred_bindings_snapshot_at_compile_time() {
        let counter = Rc::new(Cell::new(1));
        let seen = counter.clone();
        let f = JsFunction::raw("tick($n)").bind_with("n", move || Arg::Int(seen.get()));
        counter.set(7);
        assert_eq!(f.compile().unwrap(), "tick(7)");
        counter.set(9);
        assert_eq!(f.compile().unwrap(), "tick(9)");
    }

    #[test]
    fn named_functions_are_not_substituted() {
        let f = JsFunction::named("app.$refresh").bind("refresh", 1);
        assert!(f.is_named());
        assert_eq!(f.compile().unwrap(), "app.$refresh");
    }

    #[test]
    fn unencodable_binding_fails() {
        let f = JsFunction::raw("go($x)").bind("x", f64::INFINITY);
        let err = f.compile().expect_err("infinity is not JSON");
        assert!(err.to_string().contains("$x"));
    }
}
