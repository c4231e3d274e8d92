//! In-process fake of the remote FitManager API
//!
//! An axum router holding per-user state in memory, served on an ephemeral
//! localhost port. Tokens are `tok-<username>`; the seeded account is `u`/`p`.

use axum::extract::{Path, Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::{ApiClient, REQUEST_ID_HEADER};
use crate::config::ApiConfig;
use crate::session::{RecordingNavigator, SessionStore};

/// UTC timestamp shorthand for fixtures
pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Collection {
    Weights,
    Hydrations,
    Macros,
}

impl Collection {
    fn from_path(path: &str) -> Self {
        match path {
            "/weights" => Collection::Weights,
            "/hydrations" => Collection::Hydrations,
            _ => Collection::Macros,
        }
    }

    fn validate(self, body: &Value) -> Result<(), String> {
        let number = |field: &str| body.get(field).and_then(Value::as_f64);
        match self {
            Collection::Weights => match number("weight") {
                Some(v) if v > 0.0 => Ok(()),
                _ => Err("Invalid weight".to_string()),
            },
            Collection::Hydrations => match number("amount") {
                Some(v) if v > 0.0 => Ok(()),
                _ => Err("Invalid amount".to_string()),
            },
            Collection::Macros => {
                let fields = ["protein", "carbs", "fats"];
                if fields.iter().all(|f| matches!(number(f), Some(v) if v >= 0.0)) {
                    Ok(())
                } else {
                    Err("Invalid macros".to_string())
                }
            }
        }
    }
}

struct Account {
    password: String,
    email: String,
}

#[derive(Default)]
struct FakeState {
    accounts: HashMap<String, Account>,
    revoked: HashSet<String>,
    entries: HashMap<(String, Collection), Vec<Value>>,
    profiles: HashMap<String, Value>,
    next_id: u64,
    requests: usize,
    deletes: usize,
    last_flag_hits: usize,
    request_ids: Vec<String>,
    fail_dashboard: bool,
    fail_lists: bool,
}

impl FakeState {
    fn seeded() -> Self {
        let mut state = Self::default();
        state.accounts.insert(
            "u".to_string(),
            Account {
                password: "p".to_string(),
                email: "u@example.com".to_string(),
            },
        );
        state
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<String, Rejection> {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(|token| token.strip_prefix("tok-"))
            .filter(|user| !self.revoked.contains(*user))
            .map(String::from)
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }

    fn profile(&self, user: &str) -> Value {
        self.profiles.get(user).cloned().unwrap_or_else(|| {
            let email = self
                .accounts
                .get(user)
                .map(|a| a.email.clone())
                .unwrap_or_else(|| format!("{}@example.com", user));
            json!({"_id": format!("user-{}", user), "username": user, "email": email})
        })
    }

    fn latest(&self, user: &str, collection: Collection) -> Option<Value> {
        self.entries
            .get(&(user.to_string(), collection))
            .and_then(|list| list.iter().max_by_key(|e| entry_time(e)).cloned())
    }
}

type Shared = Arc<Mutex<FakeState>>;
type Rejection = (StatusCode, Json<Value>);
type Reply = Result<Json<Value>, Rejection>;

fn reject(status: StatusCode, message: &str) -> Rejection {
    (status, Json(json!({ "message": message })))
}

fn entry_time(entry: &Value) -> DateTime<Utc> {
    entry
        .get("date")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn guard(state: &Shared) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap()
}

#[derive(Deserialize)]
struct ListParams {
    last: Option<bool>,
}

async fn count_requests(State(state): State<Shared>, request: Request, next: Next) -> Response {
    {
        let mut s = guard(&state);
        s.requests += 1;
        if let Some(id) = request.headers().get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
            s.request_ids.push(id.to_string());
        }
    }
    next.run(request).await
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let s = guard(&state);
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    match s.accounts.get(username) {
        Some(account) if account.password == password => {
            Ok(Json(json!({ "token": format!("tok-{}", username) })))
        }
        _ => Err(reject(StatusCode::BAD_REQUEST, "Invalid credentials")),
    }
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let mut s = guard(&state);
    let username = body["username"].as_str().unwrap_or_default().to_string();
    if username.is_empty() || s.accounts.contains_key(&username) {
        return Err(reject(StatusCode::BAD_REQUEST, "User already exists"));
    }
    let account = Account {
        password: body["password"].as_str().unwrap_or_default().to_string(),
        email: body["email"].as_str().unwrap_or_default().to_string(),
    };
    s.accounts.insert(username.clone(), account);
    s.revoked.remove(&username);
    Ok(Json(json!({ "token": format!("tok-{}", username) })))
}

async fn verify(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let s = guard(&state);
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let verified = s
        .accounts
        .get(username)
        .map(|a| a.password == password)
        .unwrap_or(false);
    Ok(Json(json!({ "verified": verified })))
}

async fn dashboard(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let s = guard(&state);
    let user = s.authorize(&headers)?;
    if s.fail_dashboard {
        return Err(reject(StatusCode::INTERNAL_SERVER_ERROR, "Dashboard unavailable"));
    }

    let today = Utc::now().date_naive();
    let today_total: f64 = s
        .entries
        .get(&(user.clone(), Collection::Hydrations))
        .map(|list| {
            list.iter()
                .filter(|e| entry_time(e).date_naive() == today)
                .filter_map(|e| e["amount"].as_f64())
                .sum()
        })
        .unwrap_or(0.0);

    Ok(Json(json!({
        "user": s.profile(&user),
        "latestWeight": s.latest(&user, Collection::Weights),
        "latestMacros": s.latest(&user, Collection::Macros),
        "todayHydrationTotal": today_total,
    })))
}

async fn list(state: Shared, headers: HeaderMap, params: ListParams, collection: Collection) -> Reply {
    let mut s = guard(&state);
    let user = s.authorize(&headers)?;
    if s.fail_lists {
        return Err(reject(StatusCode::INTERNAL_SERVER_ERROR, "Listing unavailable"));
    }
    let mut entries = s
        .entries
        .get(&(user, collection))
        .cloned()
        .unwrap_or_default();

    if params.last == Some(true) {
        s.last_flag_hits += 1;
        entries.sort_by_key(|e| std::cmp::Reverse(entry_time(e)));
        entries.truncate(1);
    }
    Ok(Json(Value::Array(entries)))
}

async fn create(state: Shared, headers: HeaderMap, body: Value, collection: Collection) -> Reply {
    let mut s = guard(&state);
    let user = s.authorize(&headers)?;
    collection
        .validate(&body)
        .map_err(|msg| reject(StatusCode::BAD_REQUEST, &msg))?;

    s.next_id += 1;
    let mut entry = body.as_object().cloned().unwrap_or_default();
    entry.insert("_id".to_string(), json!(format!("e{:04}", s.next_id)));
    entry.insert("user".to_string(), json!(user.clone()));
    entry.insert("__v".to_string(), json!(0));
    let entry = Value::Object(entry);

    s.entries.entry((user, collection)).or_default().push(entry.clone());
    Ok(Json(entry))
}

async fn remove(state: Shared, headers: HeaderMap, id: String, collection: Collection) -> Reply {
    let mut s = guard(&state);
    let user = s.authorize(&headers)?;
    s.deletes += 1;
    let list = s.entries.entry((user, collection)).or_default();
    let before = list.len();
    list.retain(|e| e["_id"].as_str() != Some(id.as_str()));
    if list.len() == before {
        return Err(reject(StatusCode::NOT_FOUND, "Entry not found"));
    }
    Ok(Json(json!({ "message": "Deleted" })))
}

async fn get_user(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let s = guard(&state);
    let user = s.authorize(&headers)?;
    Ok(Json(s.profile(&user)))
}

async fn put_user(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let mut s = guard(&state);
    let user = s.authorize(&headers)?;
    let mut profile: Map<String, Value> = s.profile(&user).as_object().cloned().unwrap_or_default();
    if let Value::Object(fields) = body {
        for (key, value) in fields {
            if key != "email" {
                profile.insert(key, value);
            }
        }
    }
    profile.insert("updatedAt".to_string(), json!(Utc::now().to_rfc3339()));
    let profile = Value::Object(profile);
    s.profiles.insert(user, profile.clone());
    Ok(Json(profile))
}

async fn delete_user(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let mut s = guard(&state);
    let user = s.authorize(&headers)?;
    s.deletes += 1;
    s.accounts.remove(&user);
    s.profiles.remove(&user);
    s.entries.retain(|(owner, _), _| owner != &user);
    s.revoked.insert(user);
    Ok(Json(json!({ "message": "Account deleted" })))
}

fn with_collection(router: Router<Shared>, path: &str, collection: Collection) -> Router<Shared> {
    router
        .route(
            path,
            get(move |State(s): State<Shared>, headers: HeaderMap, Query(params): Query<ListParams>| {
                list(s, headers, params, collection)
            })
            .post(move |State(s): State<Shared>, headers: HeaderMap, Json(body): Json<Value>| {
                create(s, headers, body, collection)
            }),
        )
        .route(
            &format!("{}/:id", path),
            delete(move |State(s): State<Shared>, headers: HeaderMap, Path(id): Path<String>| {
                remove(s, headers, id, collection)
            }),
        )
}

/// Handle on a running fake server
pub struct FakeApi {
    addr: SocketAddr,
    state: Shared,
}

impl FakeApi {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::seeded()));

        let mut router = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/verify", post(verify))
            .route("/dashboard", get(dashboard))
            .route("/user", get(get_user).put(put_user).delete(delete_user));
        router = with_collection(router, "/weights", Collection::Weights);
        router = with_collection(router, "/hydrations", Collection::Hydrations);
        router = with_collection(router, "/macros", Collection::Macros);

        let app = router
            .layer(middleware::from_fn_with_state(state.clone(), count_requests))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.url(),
            request_timeout_secs: 5,
        }
    }

    pub fn token_for(&self, username: &str) -> String {
        format!("tok-{}", username)
    }

    /// Make every token of `username` answer 401 from now on
    pub fn revoke(&self, username: &str) {
        guard(&self.state).revoked.insert(username.to_string());
    }

    /// Make `GET /dashboard` answer 500
    pub fn fail_dashboard(&self) {
        guard(&self.state).fail_dashboard = true;
    }

    /// Make every collection `GET` answer 500; writes still succeed
    pub fn fail_lists(&self) {
        guard(&self.state).fail_lists = true;
    }

    /// Store an entry verbatim, bypassing validation
    pub fn insert_raw(&self, username: &str, path: &str, entry: Value) {
        guard(&self.state)
            .entries
            .entry((username.to_string(), Collection::from_path(path)))
            .or_default()
            .push(entry);
    }

    /// Entries held for `username` under `path`, read directly from state
    pub fn stored_count(&self, username: &str, path: &str) -> usize {
        guard(&self.state)
            .entries
            .get(&(username.to_string(), Collection::from_path(path)))
            .map_or(0, Vec::len)
    }

    pub fn request_count(&self) -> usize {
        guard(&self.state).requests
    }

    pub fn delete_count(&self) -> usize {
        guard(&self.state).deletes
    }

    pub fn last_query_flag_hits(&self) -> usize {
        guard(&self.state).last_flag_hits
    }

    pub fn request_ids(&self) -> Vec<String> {
        guard(&self.state).request_ids.clone()
    }

    pub fn anonymous_client(&self) -> (ApiClient, Arc<RecordingNavigator>) {
        let nav = Arc::new(RecordingNavigator::new());
        let session = Arc::new(SessionStore::in_memory());
        let client = ApiClient::new(&self.config(), session, nav.clone()).unwrap();
        (client, nav)
    }

    pub fn logged_in_client(&self, username: &str) -> (ApiClient, Arc<RecordingNavigator>) {
        let (client, nav) = self.anonymous_client();
        client.session().login(self.token_for(username));
        (client, nav)
    }
}
