//! Local stand-in for a Tickspot tenant.
//!
//! Serves canned responses per path and records every request so tests can
//! assert on exactly what the client transmitted.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::Response,
};
use tickspot_rs::{ClientConfig, TickspotClient};
use url::{Url, form_urlencoded};

pub const EMAIL: &str = "robot@acme.test";
pub const PASSWORD: &str = "s3cret&pw";
pub const SESSION_COOKIE: &str = "_tick_session=abc123";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: String,
    pub cookie: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

impl Recorded {
    /// Decoded form fields, from the body for POST and the query for GET.
    pub fn fields(&self) -> Vec<(String, String)> {
        let raw = if self.method == "GET" {
            self.query.clone().unwrap_or_default()
        } else {
            self.body.clone()
        };
        form_urlencoded::parse(raw.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<String> {
        self.fields()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields().into_iter().map(|(k, _)| k).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub body: String,
    pub set_cookie: Option<String>,
    pub location: Option<String>,
    /// Bounce to `/login` unless the request carries this cookie
    pub require_cookie: Option<String>,
}

impl Canned {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            set_cookie: None,
            location: None,
            require_cookie: None,
        }
    }

    pub fn redirect(to: &str) -> Self {
        Self {
            status: 302,
            location: Some(to.to_string()),
            ..Self::ok("")
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::ok("")
        }
    }

    /// Successful login: session cookie plus a redirect to the dashboard
    pub fn login() -> Self {
        Self {
            set_cookie: Some(format!("{}; Path=/", SESSION_COOKIE)),
            ..Self::redirect("/dashboard")
        }
    }

    /// Project action that needs the session, answered the way the site does:
    /// redirect back to the project list, or to the login form without a session
    pub fn session_only() -> Self {
        Self::requires_cookie(SESSION_COOKIE)
    }

    pub fn requires_cookie(cookie: &str) -> Self {
        Self {
            require_cookie: Some(cookie.to_string()),
            ..Self::redirect("/projects")
        }
    }
}

#[derive(Clone, Default)]
struct FixtureState {
    routes: Arc<Mutex<HashMap<String, Canned>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

pub struct Fixture {
    pub addr: SocketAddr,
    state: FixtureState,
}

impl Fixture {
    pub async fn start() -> Self {
        let state = FixtureState::default();
        let app = Router::new()
            .fallback(handle)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn route(&self, path: &str, canned: Canned) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(path.to_string(), canned);
    }

    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }

    pub fn client(&self) -> TickspotClient {
        TickspotClient::new(
            ClientConfig::new("acme", EMAIL, PASSWORD).with_base_url(self.base_url()),
        )
        .unwrap()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn only_request(&self) -> Recorded {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request: {:?}", requests);
        requests.into_iter().next().unwrap()
    }
}

async fn handle(
    State(state): State<FixtureState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    };

    let recorded = Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(|q| q.to_string()),
        body,
        cookie: header_value(header::COOKIE),
        user_agent: header_value(header::USER_AGENT),
        referer: header_value(header::REFERER),
    };
    let cookie = recorded.cookie.clone().unwrap_or_default();
    state.requests.lock().unwrap().push(recorded);

    let canned = state.routes.lock().unwrap().get(uri.path()).cloned();
    let Some(canned) = canned else {
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("no such route"))
            .unwrap();
    };

    if let Some(required) = &canned.require_cookie
        && !cookie.contains(required.as_str())
    {
        return Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, "/login")
            .body(Body::from("login required"))
            .unwrap();
    }

    let mut response = Response::builder().status(canned.status);
    if let Some(set_cookie) = &canned.set_cookie {
        response = response.header(header::SET_COOKIE, set_cookie);
    }
    if let Some(location) = &canned.location {
        response = response.header(header::LOCATION, location);
    }
    response.body(Body::from(canned.body)).unwrap()
}

pub fn project_listing(projects: &[(u64, &str)]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<projects type=\"array\">\n");
    for (id, name) in projects {
        xml.push_str(&format!(
            "  <project>\n    <id type=\"integer\">{}</id>\n    <name>{}</name>\n    <tasks type=\"array\">\n      <task><id type=\"integer\">{}</id></task>\n    </tasks>\n  </project>\n",
            id,
            name,
            id * 100
        ));
    }
    xml.push_str("</projects>\n");
    xml
}
