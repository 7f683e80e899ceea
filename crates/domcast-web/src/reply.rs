use crate::handler::Outcome;
use domcast_core::DomcastError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(default = "default_status_ok")]
    pub status: u16,
    pub content_type: String,
    #[serde(default)]
    pub body: String,
}

fn default_status_ok() -> u16 {
    200
}

impl Reply {
    pub fn json(body: String) -> Self {
        Self {
            status: default_status_ok(),
            content_type: JSON_CONTENT_TYPE.to_string(),
            body,
        }
    }

    pub fn text(body: String) -> Self {
        Self {
            status: default_status_ok(),
            content_type: TEXT_CONTENT_TYPE.to_string(),
            body,
        }
    }

    pub fn empty() -> Self {
        Self {
            status: 204,
            content_type: TEXT_CONTENT_TYPE.to_string(),
            body: String::new(),
        }
    }

    pub fn diagnostic(status: u16, code: &str, message: &str) -> Self {
        let body = json!({ "error": { "code": code, "message": message } });
        Self {
            status,
            content_type: JSON_CONTENT_TYPE.to_string(),
            body: body.to_string(),
        }
    }

    pub fn from_error(err: &DomcastError) -> Self {
        let status = match err {
            DomcastError::InvalidArguments { .. } => 400,
            DomcastError::Serialization { .. } | DomcastError::Config(_) => 500,
        };
        Self::diagnostic(status, err.code(), &err.to_string())
    }

    pub fn from_outcome(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Response(response) => match response.render() {
                Ok(body) => Self::json(body),
                Err(err) => {
                    warn!(response = %response.name(), error = %err, "response render failed");
                    Self::from_error(&err)
                }
            },
            Outcome::Value(Value::String(s)) => Self::text(s),
            Outcome::Value(Value::Null) | Outcome::Empty => Self::empty(),
            Outcome::Value(other) => Self::json(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domcast_core::BuildContext;

    #[test]
    fn strings_are_sent_as_text() {
        let reply = Reply::from_outcome(Outcome::Value(json!("plain")));
        assert_eq!(reply.content_type, TEXT_CONTENT_TYPE);
        assert_eq!(reply.body, "plain");
    }

    #[test]
    fn bare_selector_response_is_not_empty() {
        let ctx = BuildContext::new();
        let reply = Reply::from_outcome(Outcome::Response(ctx.response_at("#x")));
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, r##"{"#x":[]}"##);
    }

    #[test]
    fn argument_errors_map_to_bad_request() {
        let err = DomcastError::invalid_arguments("alert", "expected 1 argument(s), got 0");
        let reply = Reply::from_error(&err);
        assert_eq!(reply.status, 400);
        let body: Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(body["error"]["code"], json!("DOMCAST_E_ARGS"));
    }
}
