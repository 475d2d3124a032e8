use tracing::debug;
use url::Url;
use wreq::{Client, header, redirect};

use crate::config::{ClientConfig, Endpoints};
use crate::error::{Result, TickspotError};
use crate::params::RequestParams;
use crate::types::{EntryQuery, EntryUpdate, NewEntry, ProjectFilter, TaskFilter};

/// Browser identity presented on every request. The HTML login only accepts
/// requests that look like they come from a desktop browser.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; U; Intel Mac OS X 10_6_3; en-us) AppleWebKit/533.16 (KHTML, like Gecko) Version/5.0 Safari/533.16";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Raw answer to a request, before success is decided.
pub(crate) struct Reply {
    pub status: u16,
    pub body: String,
    /// `Location` header of a redirect; redirects are never followed
    pub location: Option<String>,
    pub sets_cookie: bool,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The HTML endpoints answer a successful form post with a redirect.
    pub fn is_success_or_redirect(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// Whether this is a redirect whose target resolves to `target`'s path.
    ///
    /// The site bounces anonymous or expired sessions to the login form this
    /// way, so such a redirect means the request was refused.
    pub fn redirects_to(&self, base: &Url, target: &Url) -> bool {
        if !(300..400).contains(&self.status) {
            return false;
        }
        self.location
            .as_deref()
            .and_then(|location| base.join(location).ok())
            .is_some_and(|resolved| {
                resolved.path().trim_end_matches('/') == target.path().trim_end_matches('/')
            })
    }
}

/// Client for the Tickspot XML API.
///
/// Every documented call is stateless: the account email and password are
/// sent with each request and the raw XML body is returned. The cookie jar
/// held by the underlying HTTP client only matters for the scraping fallback
/// (see [`crate::scrape`]).
pub struct TickspotClient {
    pub(crate) config: ClientConfig,
    pub(crate) endpoints: Endpoints,
    http_client: Client,
}

impl TickspotClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let endpoints = config.endpoints()?;

        let http_client = Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .gzip(true)
            .deflate(true)
            .timeout(config.timeout)
            .cert_verification(!config.accept_invalid_certs)
            .build()
            .map_err(|e| {
                TickspotError::Configuration(format!("failed to build HTTP client: {}", e))
            })?;

        debug!(base = %endpoints.base, "tickspot client ready");

        Ok(Self {
            config,
            endpoints,
            http_client,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Credentials every API call carries.
    pub fn auth_params(&self) -> RequestParams {
        RequestParams::new()
            .with("email", Some(&self.config.email))
            .with("password", Some(&self.config.password))
    }

    /// List clients. Admin only.
    pub async fn list_clients(&self, open: Option<bool>) -> Result<String> {
        let mut params = self.auth_params();
        params.insert("open", open);
        self.post_request("clients", &params, None).await
    }

    /// List projects. Admins see every project, other users only their own.
    pub async fn list_projects(&self, filter: &ProjectFilter) -> Result<String> {
        let mut params = self.auth_params();
        filter.write_params(&mut params);
        self.post_request("projects", &params, None).await
    }

    pub async fn list_tasks(&self, project_id: u64, filter: &TaskFilter) -> Result<String> {
        let mut params = self.auth_params();
        params.insert("project_id", Some(project_id));
        filter.write_params(&mut params);
        self.post_request("tasks", &params, None).await
    }

    /// Clients, projects and tasks assigned to the authenticated user.
    pub async fn user_details(&self) -> Result<String> {
        self.post_request("clients_projects_tasks", &self.auth_params(), None)
            .await
    }

    /// List entries matching `query`.
    ///
    /// Fails with [`TickspotError::Validation`] before any request is made
    /// unless `updated_at` or both dates are given.
    pub async fn list_entries(&self, query: &EntryQuery) -> Result<String> {
        let mut params = self.auth_params();
        query.write_params(&mut params)?;
        self.post_request("entries", &params, None).await
    }

    /// Most recently used tasks, handy for quick links.
    pub async fn recent_tasks(&self) -> Result<String> {
        self.post_request("recent_tasks", &self.auth_params(), None)
            .await
    }

    /// List users, optionally only those assigned to `project_id`.
    pub async fn list_users(&self, project_id: Option<u64>) -> Result<String> {
        let mut params = self.auth_params();
        params.insert("project_id", project_id);
        self.post_request("users", &params, None).await
    }

    /// Record time against a task. The body holds the created entry.
    pub async fn create_entry(&self, entry: &NewEntry) -> Result<String> {
        let mut params = self.auth_params();
        entry.write_params(&mut params);
        self.post_request("create_entry", &params, None).await
    }

    /// Modify an existing entry. Fields left unset keep their current value.
    pub async fn update_entry(&self, update: &EntryUpdate) -> Result<String> {
        let mut params = self.auth_params();
        update.write_params(&mut params);
        self.post_request("update_entry", &params, None).await
    }

    /// POST `params` form-encoded to `{api}/{endpoint}` and return the body.
    pub async fn post_request(
        &self,
        endpoint: &str,
        params: &RequestParams,
        referrer: Option<&str>,
    ) -> Result<String> {
        let url = self.endpoints.api_endpoint(endpoint);
        let reply = self.send_form(&url, params.to_form(), referrer).await?;
        into_body(reply)
    }

    /// GET `{api}/{endpoint}` with only the credentials in the query string.
    pub async fn get_request(&self, endpoint: &str) -> Result<String> {
        let url = self.endpoints.api_endpoint(endpoint);
        let full_url = format!("{}?{}", url, self.auth_params().to_form());

        // The query string carries the password: errors drop the URL and only
        // the bare endpoint is logged
        let response = self
            .http_client
            .get(&full_url)
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(wreq::Error::without_url)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(wreq::Error::without_url)?;
        debug!(method = "GET", url = %url, status, bytes = body.len(), "request completed");

        into_body(Reply {
            status,
            body,
            location: None,
            sets_cookie: false,
        })
    }

    /// Form POST shared by the API and the scraping fallback.
    pub(crate) async fn send_form(
        &self,
        url: &str,
        body: String,
        referrer: Option<&str>,
    ) -> Result<Reply> {
        let mut request = self
            .http_client
            .post(url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body);

        if let Some(referrer) = referrer {
            request = request.header(header::REFERER, referrer);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let sets_cookie = response.headers().contains_key(header::SET_COOKIE);
        let body = response.text().await?;
        debug!(method = "POST", url, status, bytes = body.len(), "request completed");

        Ok(Reply {
            status,
            body,
            location,
            sets_cookie,
        })
    }
}

fn into_body(reply: Reply) -> Result<String> {
    if reply.is_success() {
        Ok(reply.body)
    } else {
        Err(TickspotError::Status {
            status: reply.status,
            body: reply.body,
        })
    }
}
