use crate::{HandlerTable, Reply};
use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// JSON body accepted by the call route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallBody {
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub shared: Value,
}

#[derive(Clone)]
pub struct AxumDomcastAdapter {
    table: Arc<HandlerTable>,
}

impl AxumDomcastAdapter {
    pub fn new(table: HandlerTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &HandlerTable {
        &self.table
    }

    pub fn call(&self, name: &str, body: CallBody) -> Response {
        self.table
            .invoke(name, &body.args, &body.shared)
            .into_response()
    }

    /// `POST /call/:name` with an optional `CallBody`.
    pub fn router(self) -> Router {
        Router::new()
            .route("/call/:name", post(call_route))
            .with_state(self)
    }
}

async fn call_route(
    State(adapter): State<AxumDomcastAdapter>,
    Path(name): Path<String>,
    body: Option<Json<CallBody>>,
) -> Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    adapter.call(&name, body)
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        if let Ok(v) = HeaderValue::from_str(&self.content_type) {
            response.headers_mut().insert(header::CONTENT_TYPE, v);
        }
        response
    }
}
