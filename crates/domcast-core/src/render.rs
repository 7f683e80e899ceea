use crate::command::CommandMap;
use crate::error::{DomcastError, DomcastResult};
use serde_json::{Map, Value};

pub(crate) const COMMAND_FIELD: &str = "c";
pub(crate) const ARGS_FIELD: &str = "a";

/// Encodes a resolved command map as the wire object, keys in insertion
/// order: `{ "<key>": [ {"c": .., "a": [..]}, .. ], .. }`.
pub fn encode_commands(commands: &CommandMap, path: &str) -> DomcastResult<Value> {
    let mut root = Map::with_capacity(commands.len());
    for (key, list) in commands {
        let mut encoded = Vec::with_capacity(list.len());
        for (i, command) in list.iter().enumerate() {
            let mut args = Vec::with_capacity(command.args.len());
            for (j, arg) in command.args.iter().enumerate() {
                args.push(arg.encode_at(&format!("{path}.{key}[{i}].a[{j}]"))?);
            }
            let mut entry = Map::with_capacity(2);
            entry.insert(COMMAND_FIELD.to_string(), command.id.to_value());
            entry.insert(ARGS_FIELD.to_string(), Value::Array(args));
            encoded.push(Value::Object(entry));
        }
        root.insert(key.clone(), Value::Array(encoded));
    }
    Ok(Value::Object(root))
}

pub fn to_json_string(value: &Value, pretty: bool) -> DomcastResult<String> {
    let out = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    out.map_err(|e| DomcastError::serialization("$", e.to_string()))
}

/// Escapes rendered JSON for a single-quoted string inside an inline script.
pub fn escape_single_quoted(rendered: &str) -> String {
    let mut out = String::with_capacity(rendered.len() + 8);
    let mut chars = rendered.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            '<' if chars.peek() == Some(&'/') => out.push_str("<\\"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Builtin, Command, CommandId};
    use crate::value::Arg;
    use serde_json::json;

    #[test]
    fn wire_shape_and_key_order() {
        let mut commands = CommandMap::new();
        commands.insert(
            "#z".to_string(),
            vec![Command::new(CommandId::Dynamic("hide".into()), vec![])],
        );
        commands.insert(
            "00".to_string(),
            vec![Command::new(Builtin::Alert, vec![Arg::from("hi")])],
        );
        let value = encode_commands(&commands, "$").unwrap();
        assert_eq!(
            value,
            json!({"#z": [{"c": "hide", "a": []}], "00": [{"c": 1, "a": ["hi"]}]})
        );
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["#z", "00"]);
    }

    #[test]
    fn error_path_points_at_argument() {
        let mut commands = CommandMap::new();
        commands.insert(
            "#n".to_string(),
            vec![Command::new(Builtin::Dump, vec![Arg::Int(1), Arg::Float(f64::NAN)])],
        );
        let err = encode_commands(&commands, "$").expect_err("NaN");
        assert!(err.to_string().contains("$.#n[0].a[1]"));
    }

    #[test]
    fn single_quote_escaping() {
        let rendered = r#"{"00":[{"c":3,"a":["it's </script>\n"]}]}"#;
        let escaped = escape_single_quoted(rendered);
        assert_eq!(escaped, r#"{"00":[{"c":3,"a":["it\'s <\/script>\\n"]}]}"#);
    }
}
