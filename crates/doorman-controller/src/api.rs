//! Framework-free HTTP handler.
//!
//! The web transport is out of scope; whatever server hosts the door hands
//! each request to [`handle`] as an [`ApiRequest`] and writes back the
//! [`ApiResponse`]. Reads are open, every mutation needs the admin code in
//! the `X-Admin-Code` header.
//!
//! | Method | Path | Auth | Effect |
//! |--------|------|------|--------|
//! | GET | `/log` | no | Event log, oldest first |
//! | GET | `/settings` | no | Settings with secrets blanked |
//! | GET | `/status` | no | `{ albue, door, relay }` |
//! | GET | `/users` | no | Access table |
//! | GET | `/rules` | no | Rule table |
//! | POST | `/relay` | yes | Pulse (optional `{"pulse_ms": n}`) |
//! | POST | `/users` | yes | Add `{"username", "tag"}` |
//! | DELETE | `/users/<name>` | yes | Remove every user with that name |
//! | POST | `/rules` | yes | Append a rule |
//! | PUT | `/rules/<idx>` | yes | Replace a rule |
//! | DELETE | `/rules/<idx>` | yes | Remove a rule |
//! | POST | `/settings` | yes | Patch settings, save, restart |
//! | POST | `/events/<name>` | yes | Dispatch an HTTP event |
//!
//! Unknown routes are 404, a missing or wrong admin code is 401, a body that
//! does not parse is 400.

use crate::{
    commands::{Command, CommandReply},
    controller::DoorController,
    error::ControllerError,
};
use doorman_core::{AuthorizedUser, Origin, Rule};
use doorman_hardware::PulseOutcome;
use doorman_storage::SettingsPatch;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::{fmt, str::FromStr, time::Instant};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(method)
    }
}

impl FromStr for Method {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(ControllerError::validation(format!("unsupported method '{other}'"))),
        }
    }
}

/// One request as seen by the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    /// Value of the `X-Admin-Code` header.
    pub admin_code: Option<String>,
    pub body: String,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            admin_code: None,
            body: String::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn with_admin_code(mut self, code: impl Into<String>) -> Self {
        self.admin_code = Some(code.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// Status code and JSON body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl fmt::Display) -> Self {
        Self {
            status,
            body: json!({ "error": message.to_string() }),
        }
    }

    fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(body) => Self::ok(body),
            Err(e) => Self::error(500, e),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<ControllerError> for ApiResponse {
    fn from(error: ControllerError) -> Self {
        let status = match &error {
            ControllerError::Unauthorized => 401,
            ControllerError::Validation(_) => 400,
            ControllerError::NotFound(_) => 404,
            ControllerError::RelayBusy => 409,
            ControllerError::Hardware(_) | ControllerError::Storage(_) => 500,
            ControllerError::Stopped => 503,
        };
        Self::error(status, error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Log,
    Settings,
    Status,
    Users,
    Rules,
    Relay,
    AddUser,
    DeleteUser(String),
    AddRule,
    UpdateRule(usize),
    DeleteRule(usize),
    UpdateSettings,
    Event(String),
}

impl Route {
    fn resolve(method: Method, path: &str) -> Option<Self> {
        let path = path.split('?').next().unwrap_or_default();
        let path = path.trim_end_matches('/');
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        let route = match (method, segments.as_slice()) {
            (Method::Get, ["log"]) => Route::Log,
            (Method::Get, ["settings"]) => Route::Settings,
            (Method::Get, ["status"]) => Route::Status,
            (Method::Get, ["users"]) => Route::Users,
            (Method::Get, ["rules"]) => Route::Rules,
            (Method::Post, ["relay"]) => Route::Relay,
            (Method::Post, ["users"]) => Route::AddUser,
            (Method::Delete, ["users", name]) if !name.is_empty() => {
                Route::DeleteUser((*name).to_string())
            }
            (Method::Post, ["rules"]) => Route::AddRule,
            (Method::Put, ["rules", index]) => Route::UpdateRule(index.parse().ok()?),
            (Method::Delete, ["rules", index]) => Route::DeleteRule(index.parse().ok()?),
            (Method::Post, ["settings"]) => Route::UpdateSettings,
            (Method::Post, ["events", name]) if !name.is_empty() => {
                Route::Event((*name).to_string())
            }
            _ => return None,
        };
        Some(route)
    }

    fn needs_admin(&self) -> bool {
        !matches!(
            self,
            Route::Log | Route::Settings | Route::Status | Route::Users | Route::Rules
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct RelayBody {
    #[serde(default)]
    pulse_ms: Option<u64>,
}

/// Serve one request against the controller.
///
/// # Examples
///
/// ```
/// use doorman_controller::api::{ApiRequest, Method, handle};
/// # use doorman_controller::{ControllerConfig, DoorController, Pins};
/// # use doorman_hardware::mock::{MockInput, MockOutput};
/// # use doorman_storage::MemoryStore;
/// # use std::time::Instant;
/// # let pins = Pins {
/// #     relay: Box::new(MockOutput::new("relay").0),
/// #     led: Box::new(MockOutput::new("led").0),
/// #     door: Box::new(MockInput::new("door", true).0),
/// #     aux: Box::new(MockInput::new("aux", true).0),
/// #     reset: Box::new(MockInput::new("reset", true).0),
/// # };
/// # let now = Instant::now();
/// # let (mut controller, _edges) =
/// #     DoorController::new(ControllerConfig::default(), pins, Box::new(MemoryStore::new()), now);
///
/// let add = ApiRequest::new(Method::Post, "/users")
///     .with_body(r#"{"username": "alice", "tag": "12345"}"#);
/// assert_eq!(handle(&mut controller, &add, now).status, 401);
///
/// let add = add.with_admin_code("9792");
/// assert_eq!(handle(&mut controller, &add, now).status, 200);
///
/// let users = handle(&mut controller, &ApiRequest::get("/users"), now);
/// assert_eq!(users.body[0]["username"], "alice");
/// ```
pub fn handle(controller: &mut DoorController, request: &ApiRequest, now: Instant) -> ApiResponse {
    let Some(route) = Route::resolve(request.method, &request.path) else {
        debug!(method = %request.method, path = %request.path, "No such route");
        return ApiResponse::error(404, "Not found");
    };

    if route.needs_admin() && !authorized(controller, request) {
        warn!(method = %request.method, path = %request.path, "Rejected request without valid admin code");
        return ControllerError::Unauthorized.into();
    }

    match serve(controller, route, &request.body, now) {
        Ok(response) => response,
        Err(e) => {
            debug!(method = %request.method, path = %request.path, error = %e, "Request failed");
            e.into()
        }
    }
}

fn authorized(controller: &DoorController, request: &ApiRequest) -> bool {
    let Some(provided) = request.admin_code.as_deref() else {
        return false;
    };
    let expected = controller.settings().admin_code.as_bytes();
    !expected.is_empty() && bool::from(provided.as_bytes().ct_eq(expected))
}

fn serve(
    controller: &mut DoorController,
    route: Route,
    body: &str,
    now: Instant,
) -> crate::Result<ApiResponse> {
    let response = match route {
        Route::Log => ApiResponse::json(&controller.snapshot_log()),
        Route::Settings => ApiResponse::json(&controller.settings().redacted()),
        Route::Status => ApiResponse::json(&controller.status()),
        Route::Users => ApiResponse::json(&controller.users()),
        Route::Rules => ApiResponse::json(&controller.rules()),
        Route::Relay => {
            let RelayBody { pulse_ms } = parse_optional(body)?;
            let reply = execute(controller, Command::Open { pulse_ms }, now)?;
            let queued = matches!(reply, CommandReply::Pulse(PulseOutcome::Queued { .. }));
            ApiResponse::ok(json!({ "ok": true, "queued": queued }))
        }
        Route::AddUser => {
            let user: AuthorizedUser = parse(body)?;
            execute(controller, Command::AddUser(user), now)?;
            ApiResponse::ok(json!({ "ok": true }))
        }
        Route::DeleteUser(name) => {
            let reply = execute(controller, Command::DeleteUser { name }, now)?;
            let removed = match reply {
                CommandReply::Removed(count) => count,
                _ => 0,
            };
            ApiResponse::ok(json!({ "ok": true, "removed": removed }))
        }
        Route::AddRule => {
            let rule: Rule = parse(body)?;
            let reply = execute(controller, Command::AddRule(rule), now)?;
            match reply {
                CommandReply::RuleIndex(index) => ApiResponse::ok(json!({ "ok": true, "index": index })),
                _ => ApiResponse::ok(json!({ "ok": true })),
            }
        }
        Route::UpdateRule(index) => {
            let rule: Rule = parse(body)?;
            execute(controller, Command::UpdateRule { index, rule }, now)?;
            ApiResponse::ok(json!({ "ok": true }))
        }
        Route::DeleteRule(index) => {
            execute(controller, Command::DeleteRule { index }, now)?;
            ApiResponse::ok(json!({ "ok": true }))
        }
        Route::UpdateSettings => {
            let patch: SettingsPatch = parse(body)?;
            execute(controller, Command::UpdateSettings(patch), now)?;
            ApiResponse::ok(json!({ "ok": true, "restart": true }))
        }
        Route::Event(name) => {
            execute(controller, Command::Event { name }, now)?;
            ApiResponse::ok(json!({ "ok": true }))
        }
    };
    Ok(response)
}

fn execute(controller: &mut DoorController, command: Command, now: Instant) -> crate::Result<CommandReply> {
    controller.execute(command, Origin::Web, now)
}

fn parse<T: DeserializeOwned>(body: &str) -> crate::Result<T> {
    serde_json::from_str(body)
        .map_err(|e| ControllerError::validation(format!("malformed body: {e}")))
}

/// Like [`parse`], but an empty body yields the default.
fn parse_optional<T: DeserializeOwned + Default>(body: &str) -> crate::Result<T> {
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    parse(body)
}
