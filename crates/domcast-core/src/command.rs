use crate::value::Arg;
use indexmap::IndexMap;
use serde_json::Value;

/// Selector key → commands recorded against it, in insertion order.
pub type CommandMap = IndexMap<String, Vec<Command>>;

/// Fixed capability set every client runtime implements.
///
/// The discriminant is the tag written to the wire. `Typecast` (255) wraps
/// compound payloads the client interprets itself: conditional gates,
/// namespace access and remote-call placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Builtin {
    Alert = 1,
    Call = 2,
    Script = 3,
    Json = 4,
    RenderView = 5,
    Redirect = 6,
    Dump = 7,
    Exception = 8,
    SetVar = 9,
    UnsetVar = 10,
    Include = 11,
    Publish = 12,
    RenewToken = 13,
    Typecast = 0xFF,
}

impl Builtin {
    pub const ALL: [Builtin; 14] = [
        Builtin::Alert,
        Builtin::Call,
        Builtin::Script,
        Builtin::Json,
        Builtin::RenderView,
        Builtin::Redirect,
        Builtin::Dump,
        Builtin::Exception,
        Builtin::SetVar,
        Builtin::UnsetVar,
        Builtin::Include,
        Builtin::Publish,
        Builtin::RenewToken,
        Builtin::Typecast,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Alert => "alert",
            Builtin::Call => "call",
            Builtin::Script => "script",
            Builtin::Json => "json",
            Builtin::RenderView => "render_view",
            Builtin::Redirect => "redirect",
            Builtin::Dump => "dump",
            Builtin::Exception => "exception",
            Builtin::SetVar => "set_var",
            Builtin::UnsetVar => "unset_var",
            Builtin::Include => "include",
            Builtin::Publish => "publish",
            Builtin::RenewToken => "renew_token",
            Builtin::Typecast => "typecast",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Commands that are never selector-scoped. `Response::cmd` drops the
    /// current chaining context before recording one.
    pub fn clears_selector(self) -> bool {
        matches!(
            self,
            Builtin::Alert
                | Builtin::Script
                | Builtin::Json
                | Builtin::Exception
                | Builtin::RenderView
                | Builtin::Redirect
                | Builtin::SetVar
                | Builtin::UnsetVar
                | Builtin::Publish
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandId {
    Builtin(Builtin),
    /// Capability method resolved client-side against the current selection.
    Dynamic(String),
}

impl CommandId {
    pub fn to_value(&self) -> Value {
        match self {
            CommandId::Builtin(b) => Value::from(b.tag()),
            CommandId::Dynamic(name) => Value::String(name.clone()),
        }
    }
}

impl From<Builtin> for CommandId {
    fn from(value: Builtin) -> Self {
        CommandId::Builtin(value)
    }
}

#[derive(Debug, Clone)]
pub struct Command {
    pub id: CommandId,
    pub args: Vec<Arg>,
}

impl Command {
    pub fn new(id: impl Into<CommandId>, args: Vec<Arg>) -> Self {
        Self {
            id: id.into(),
            args,
        }
    }
}

/// Role tags for synthesized selector keys (`{X<n>}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Unless,
    Incase,
    Access,
    This,
    Remote,
    Base,
}

impl Marker {
    pub fn as_char(self) -> char {
        match self {
            Marker::Unless => '!',
            Marker::Incase => '=',
            Marker::Access => '+',
            Marker::This => '~',
            Marker::Remote => '-',
            Marker::Base => '#',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '!' => Some(Marker::Unless),
            '=' => Some(Marker::Incase),
            '+' => Some(Marker::Access),
            '~' => Some(Marker::This),
            '-' => Some(Marker::Remote),
            '#' => Some(Marker::Base),
            _ => None,
        }
    }
}

pub fn marker_key(marker: Marker, n: u64) -> String {
    format!("{{{}{}}}", marker.as_char(), n)
}

/// Parses `{X<n>}`. Anything else, including selectors that merely start
/// with a brace, is not a marker.
pub fn parse_marker_key(key: &str) -> Option<(Marker, u64)> {
    let inner = key.strip_prefix('{')?.strip_suffix('}')?;
    let mut chars = inner.chars();
    let marker = Marker::from_char(chars.next()?)?;
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((marker, digits.parse().ok()?))
}

pub fn ordinal_key(n: u64) -> String {
    format!("0{n}")
}

pub fn is_ordinal_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}
