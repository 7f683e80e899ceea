use crate::config::{BuildConfig, DEFAULT_MAX_DEPTH};
use crate::value::Arg;
use tracing::trace;

pub const RESPONSE_TAG: &str = "PR";
pub const FUNCTION_TAG: &str = "PF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastOptions {
    pub to_string: bool,
    pub nested: bool,
    pub depth: usize,
    pub numeric_strings: bool,
}

impl Default for CastOptions {
    fn default() -> Self {
        Self {
            to_string: true,
            nested: true,
            depth: DEFAULT_MAX_DEPTH,
            numeric_strings: true,
        }
    }
}

impl CastOptions {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            depth: config.max_depth,
            numeric_strings: config.numeric_strings,
            ..Self::default()
        }
    }

    fn deeper(self) -> Self {
        Self {
            depth: self.depth.saturating_sub(1),
            ..self
        }
    }
}

/// Turns an argument into a wire-ready tree without touching the input.
///
/// Builders become `{"PR": <commands>}` and deferred functions
/// `{"PF": <source>}`; containers recurse with one less level of depth. Once
/// depth runs out the value is returned as-is. With `to_string` set, non-empty
/// all-digit strings become integers and objects that have a text form are
/// replaced by it.
pub fn typecast(value: &Arg, opts: CastOptions) -> Arg {
    let out = if opts.nested && opts.depth > 0 {
        match value {
            Arg::Response(snapshot) => {
                Arg::tagged(RESPONSE_TAG, Arg::Commands(snapshot.commands.clone()))
            }
            Arg::Function(func) => match func.compile() {
                Ok(source) => Arg::tagged(FUNCTION_TAG, Arg::Str(source)),
                // Left unresolved so the failure surfaces at render time.
                Err(_) => value.clone(),
            },
            Arg::List(items) => Arg::List(items.iter().map(|v| typecast(v, opts.deeper())).collect()),
            Arg::Map(map) => Arg::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), typecast(v, opts.deeper())))
                    .collect(),
            ),
            _ => value.clone(),
        }
    } else {
        if opts.nested && matches!(value, Arg::List(_) | Arg::Map(_) | Arg::Response(_)) {
            trace!("typecast depth bound reached; keeping value unconverted");
        }
        value.clone()
    };

    if !opts.to_string || out.is_blank() {
        return out;
    }
    match out {
        Arg::Str(s) if opts.numeric_strings && is_digits(&s) => {
            s.parse::<i64>().map(Arg::Int).unwrap_or(Arg::Str(s))
        }
        Arg::Object(obj) => match obj.to_text() {
            Some(text) => Arg::Str(text),
            None => Arg::Object(obj),
        },
        other => other,
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
