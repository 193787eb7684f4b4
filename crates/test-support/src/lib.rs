use anyhow::Context as _;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Pick an unused TCP port on localhost.
///
/// Note: this does not reserve the port; it's still possible for another process to bind it
/// before you do.
///
/// # Errors
///
/// Returns an error if binding an ephemeral localhost port fails or if the bound socket's
/// local address cannot be read.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// A local HTTP server that reflects every request back as JSON.
///
/// Response body for any path:
///
/// ```json
/// { "method": "POST", "path": "/api/person", "query": "a=1", "headers": {..}, "body": <json|string|null> }
/// ```
///
/// Requests to `/status/{code}` answer with that status code and the same echo body, which lets
/// tests exercise upstream error handling. `GET` requests for paths registered through
/// [`EchoServer::spawn_with_documents`] return the registered text instead.
pub struct EchoServer {
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl EchoServer {
    /// Bind an ephemeral port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with_documents(Vec::<(String, String)>::new()).await
    }

    /// Like [`EchoServer::spawn`], additionally serving fixed documents (`path` → body).
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn spawn_with_documents<P, B>(
        documents: impl IntoIterator<Item = (P, B)>,
    ) -> anyhow::Result<Self>
    where
        P: Into<String>,
        B: Into<String>,
    {
        let documents: Documents = Arc::new(
            documents
                .into_iter()
                .map(|(p, b)| (p.into(), b.into()))
                .collect(),
        );
        let app = Router::new()
            .route("/", any(echo_handler))
            .route("/{*path}", any(echo_handler))
            .with_state(documents);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind echo server")?;
        let addr = listener.local_addr().context("echo server local_addr")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stop the server and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

type Documents = Arc<HashMap<String, String>>;

async fn echo_handler(
    State(documents): State<Documents>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::GET
        && let Some(doc) = documents.get(uri.path())
    {
        let content_type = if uri.path().ends_with(".json") {
            "application/json"
        } else {
            "application/yaml"
        };
        return (
            [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
            doc.clone(),
        )
            .into_response();
    }

    let mut header_map = Map::new();
    for (name, value) in &headers {
        if let Ok(v) = value.to_str() {
            header_map.insert(name.as_str().to_string(), Value::String(v.to_string()));
        }
    }

    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };

    let status = uri
        .path()
        .strip_prefix("/status/")
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    let echo = json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": header_map,
        "body": body,
    });

    (status, axum::Json(echo)).into_response()
}
