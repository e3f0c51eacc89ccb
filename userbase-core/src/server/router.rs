//! Request routing and the `/users` verb dispatcher

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::{Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use super::response::{self, HttpResponse};
use crate::domain::result::{Error, Result};
use crate::domain::{NewUser, UserPatch};
use crate::ports::EventLog;
use crate::services::{LogEvent, UserService};

/// Largest request body accepted, in bytes
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Parsed `id` query parameter, or the 400 to send back
type IdParam = std::result::Result<Option<i64>, HttpResponse>;

/// The handler outlived the write timeout and no response will be sent
///
/// Work already handed to a blocking thread is not cancelled, so a create
/// that times out may still commit.
#[derive(Debug, thiserror::Error)]
#[error("handler exceeded write timeout of {0:?}")]
pub struct WriteTimeout(pub Duration);

/// Shared state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub events: Option<Arc<dyn EventLog>>,
}

impl AppState {
    pub fn new(users: Arc<UserService>) -> Self {
        Self { users, events: None }
    }

    pub fn with_event_log(mut self, events: Arc<dyn EventLog>) -> Self {
        self.events = Some(events);
        self
    }
}

/// Routes requests to handlers, enforcing the per-request timeouts
pub struct Router {
    state: AppState,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl Router {
    pub fn new(state: AppState, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            state,
            read_timeout,
            write_timeout,
        }
    }

    /// Handle one request
    ///
    /// Past the write timeout the caller gets `WriteTimeout` and should drop
    /// the connection.
    pub async fn handle<B>(
        &self,
        req: Request<B>,
    ) -> std::result::Result<HttpResponse, WriteTimeout>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let response = match tokio::time::timeout(self.write_timeout, self.route(req)).await {
            Ok(response) => response,
            Err(_) => {
                error!("{} {} exceeded write timeout of {:?}", method, path, self.write_timeout);
                self.record(
                    LogEvent::new("request_timed_out").with_request(method.as_str(), path),
                )
                .await;
                return Err(WriteTimeout(self.write_timeout));
            }
        };

        debug!("{} {} -> {}", method, path, response.status().as_u16());
        if response.status().is_server_error() {
            self.record(
                LogEvent::new("request_failed")
                    .with_request(method.as_str(), path)
                    .with_error(response.status().to_string()),
            )
            .await;
        }
        Ok(response)
    }

    async fn route<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let path = req.uri().path().to_string();
        match path.as_str() {
            "/users" | "/users/" => self.dispatch_users(req).await,
            "/health" => self.health().await,
            _ => response::not_found(),
        }
    }

    /// Verb dispatcher for `/users`
    async fn dispatch_users<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = req.method().clone();
        match method {
            Method::GET => self.get_users(query_id(&req)).await,
            Method::POST => self.create_user(req).await,
            Method::PUT => self.update_user(req).await,
            Method::DELETE => self.delete_user(query_id(&req)).await,
            _ => response::method_not_allowed(),
        }
    }

    async fn get_users(&self, id: IdParam) -> HttpResponse {
        match id {
            Ok(Some(id)) => {
                let users = Arc::clone(&self.state.users);
                match blocking(move || users.get_user(id)).await {
                    Ok(user) => response::json(StatusCode::OK, &user),
                    Err(e) => self.error(&e),
                }
            }
            Ok(None) => {
                let users = Arc::clone(&self.state.users);
                match blocking(move || users.list_users()).await {
                    Ok(list) => response::json(StatusCode::OK, &list),
                    Err(e) => self.error(&e),
                }
            }
            Err(resp) => resp,
        }
    }

    async fn create_user<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let new_user: NewUser = match self.read_json(req).await {
            Ok(body) => body,
            Err(resp) => return resp,
        };

        let users = Arc::clone(&self.state.users);
        match blocking(move || users.create_user(&new_user.name, &new_user.email)).await {
            Ok(user) => response::created(&user, &format!("/users?id={}", user.id)),
            Err(e) => self.error(&e),
        }
    }

    async fn update_user<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let id = match query_id(&req) {
            Ok(Some(id)) => id,
            Ok(None) => return response::bad_request("missing id query parameter"),
            Err(resp) => return resp,
        };
        let patch: UserPatch = match self.read_json(req).await {
            Ok(body) => body,
            Err(resp) => return resp,
        };

        let users = Arc::clone(&self.state.users);
        match blocking(move || users.update_user(id, &patch)).await {
            Ok(user) => response::json(StatusCode::OK, &user),
            Err(e) => self.error(&e),
        }
    }

    async fn delete_user(&self, id: IdParam) -> HttpResponse {
        let id = match id {
            Ok(Some(id)) => id,
            Ok(None) => return response::bad_request("missing id query parameter"),
            Err(resp) => return resp,
        };

        let users = Arc::clone(&self.state.users);
        match blocking(move || users.delete_user(id)).await {
            Ok(()) => response::no_content(),
            Err(e) => self.error(&e),
        }
    }

    async fn health(&self) -> HttpResponse {
        let users = Arc::clone(&self.state.users);
        match blocking(move || users.count()).await {
            Ok(count) => response::json(
                StatusCode::OK,
                &serde_json::json!({ "status": "ok", "users": count }),
            ),
            Err(e) => {
                error!("Health check failed: {}", e);
                response::json(
                    StatusCode::SERVICE_UNAVAILABLE,
                    &serde_json::json!({ "status": "unavailable" }),
                )
            }
        }
    }

    /// Collect the body within the read timeout and decode it as JSON
    async fn read_json<B, T>(&self, req: Request<B>) -> std::result::Result<T, HttpResponse>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
        T: DeserializeOwned,
    {
        let body = Limited::new(req.into_body(), MAX_BODY_BYTES);
        let collected = match tokio::time::timeout(self.read_timeout, body.collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return Err(response::error_body(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "request body too large",
                ));
            }
            Ok(Err(e)) => {
                return Err(response::bad_request(&format!("failed to read body: {}", e)));
            }
            Err(_) => {
                return Err(response::text(StatusCode::REQUEST_TIMEOUT, "Request timed out"));
            }
        };

        serde_json::from_slice(&collected)
            .map_err(|e| response::bad_request(&format!("invalid JSON body: {}", e)))
    }

    fn error(&self, err: &Error) -> HttpResponse {
        if response::status_for(err).is_server_error() {
            error!("Request failed: {}", err);
        }
        response::from_error(err)
    }

    async fn record(&self, event: LogEvent) {
        let Some(events) = self.state.events.clone() else {
            return;
        };
        if let Err(e) = blocking(move || events.record(event)).await {
            warn!("Failed to record event: {}", e);
        }
    }
}

/// Parse the optional `id` query parameter
fn query_id<B>(req: &Request<B>) -> IdParam {
    let Some(query) = req.uri().query() else {
        return Ok(None);
    };

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key == "id" {
            return value
                .parse::<i64>()
                .map(Some)
                .map_err(|_| response::bad_request(&format!("invalid id '{}'", value)));
        }
    }
    Ok(None)
}

/// Run a blocking service call off the async runtime
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Other(format!("Worker thread failed: {}", e)))?
}
