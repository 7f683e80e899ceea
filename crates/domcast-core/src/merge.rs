use crate::command::{CommandMap, Marker, is_ordinal_key, ordinal_key, parse_marker_key};
use crate::response::{Response, ResponseState};

/// What `Response::merge` accepts: a builder, or a name looked up in the
/// builder's context.
#[derive(Debug, Clone, Copy)]
pub enum MergeSource<'a> {
    Response(&'a Response),
    Name(&'a str),
}

impl<'a> From<&'a Response> for MergeSource<'a> {
    fn from(value: &'a Response) -> Self {
        MergeSource::Response(value)
    }
}

impl<'a> From<&'a str> for MergeSource<'a> {
    fn from(value: &'a str) -> Self {
        MergeSource::Name(value)
    }
}

impl<'a> From<&'a String> for MergeSource<'a> {
    fn from(value: &'a String) -> Self {
        MergeSource::Name(value.as_str())
    }
}

/// Folds merged snapshots into the builder's own commands.
///
/// Own commands come first. Ordinal keys from snapshots move to the next free
/// ordinal slot; any other key appends to the existing group or is inserted as
/// a new one, in merge order.
pub(crate) fn resolve(state: &ResponseState) -> CommandMap {
    let mut result = state.data.clone();

    if result.is_empty() {
        if let Some(selector) = &state.last_selector {
            let is_base = matches!(parse_marker_key(selector), Some((Marker::Base, _)));
            if !is_base {
                result.insert(selector.clone(), Vec::new());
            }
        }
    }

    let mut next_ordinal = state.cmd_count;
    for snapshot in state.merged.values() {
        for (key, commands) in snapshot {
            if is_ordinal_key(key) {
                let mut slot = ordinal_key(next_ordinal);
                while result.contains_key(&slot) {
                    next_ordinal += 1;
                    slot = ordinal_key(next_ordinal);
                }
                next_ordinal += 1;
                result.insert(slot, commands.clone());
            } else {
                result
                    .entry(key.clone())
                    .or_default()
                    .extend(commands.iter().cloned());
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use crate::context::BuildContext;
    use crate::value::Arg;
    use serde_json::{Value, json};

    fn keys(value: &Value) -> Vec<String> {
        value.as_object().unwrap().keys().cloned().collect()
    }

    #[test]
    fn shared_selector_concatenates_own_commands_first() {
        let ctx = BuildContext::new();
        let mut a = ctx.response_at("#foo");
        a.generic_command("addClass", vec!["a".into()]);
        let mut b = ctx.response_at("#foo");
        b.generic_command("addClass", vec!["b".into()]);

        a.merge(&b);
        assert_eq!(
            a.to_value().unwrap(),
            json!({"#foo": [
                {"c": "addClass", "a": ["a"]},
                {"c": "addClass", "a": ["b"]}
            ]})
        );
    }

    #[test]
    fn ordinal_keys_are_rekeyed_not_overwritten() {
        let ctx = BuildContext::new();
        let mut a = ctx.response();
        a.alert("from a");
        let mut b = ctx.response();
        b.alert("from b");
        let mut c = ctx.response();
        c.alert("from c");

        a.merge(&b).merge(&c);
        let out = a.to_value().unwrap();
        assert_eq!(keys(&out), vec!["00", "01", "02"]);
        assert_eq!(out["01"], json!([{"c": 1, "a": ["from b"]}]));
        assert_eq!(out["02"], json!([{"c": 1, "a": ["from c"]}]));
    }

    #[test]
    fn merge_by_name_and_unknown_names() {
        let ctx = BuildContext::new();
        let mut panel = ctx.response_at("#panel");
        panel.rename("panel").generic_command("show", vec![]);

        let mut page = ctx.response();
        page.merge("panel").merge("does-not-exist");
        assert_eq!(
            page.to_value().unwrap(),
            json!({"#panel": [{"c": "show", "a": []}]})
        );
    }

    #[test]
    fn merge_captures_a_snapshot() {
        let ctx = BuildContext::new();
        let mut a = ctx.response();
        let mut b = ctx.response_at("#b");
        b.generic_command("show", vec![]);
        a.merge(&b);
        b.generic_command("hide", vec![]);

        assert_eq!(a.to_value().unwrap(), json!({"#b": [{"c": "show", "a": []}]}));
        assert_eq!(b.process_merged()["#b"].len(), 2);
    }

    #[test]
    fn remerging_replaces_the_earlier_snapshot() {
        let ctx = BuildContext::new();
        let mut a = ctx.response();
        let mut b = ctx.response_at("#b");
        b.generic_command("show", vec![]);
        a.merge(&b);
        b.generic_command("hide", vec![]);
        a.merge(&b);
        assert_eq!(a.process_merged()["#b"].len(), 2);
    }

    #[test]
    fn transitive_merges_are_carried() {
        let ctx = BuildContext::new();
        let mut leaf = ctx.response_at("#leaf");
        leaf.generic_command("show", vec![]);
        let mut mid = ctx.response();
        mid.alert("mid").merge(&leaf);
        let mut root = ctx.response();
        root.alert("root").merge(&mid);

        let out = root.to_value().unwrap();
        assert_eq!(keys(&out), vec!["00", "01", "#leaf"]);
        assert_eq!(out["01"], json!([{"c": 1, "a": ["mid"]}]));
    }

    #[test]
    fn merged_builder_can_still_grow_and_be_merged_elsewhere() {
        let ctx = BuildContext::new();
        let mut shared = ctx.response_at("#s");
        shared.generic_command("show", vec![]);
        let mut first = ctx.response();
        first.merge(&shared);
        shared.generic_command("fadeIn", vec![Arg::Int(100)]);
        let mut second = ctx.response();
        second.merge(&shared);

        assert_eq!(first.process_merged()["#s"].len(), 1);
        assert_eq!(second.process_merged()["#s"].len(), 2);
    }

    #[test]
    fn empty_own_data_with_selector_is_seeded_before_merges() {
        let ctx = BuildContext::new();
        let mut a = ctx.response_at("#own");
        let mut b = ctx.response();
        b.alert("x");
        a.merge(&b);
        let out = a.to_value().unwrap();
        assert_eq!(keys(&out), vec!["#own", "00"]);
        assert_eq!(out["#own"], json!([]));
    }
}
