use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{Result, TickspotError};

/// Domain every tenant lives under (`https://{tenant}.tickspot.com/`).
pub const TICKSPOT_DOMAIN: &str = "tickspot.com";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for TickspotClient
#[derive(Clone)]
pub struct ClientConfig {
    /// Subdomain of the account, e.g. `acme` for `acme.tickspot.com`
    pub tenant: String,
    pub email: String,
    pub password: String,
    /// Replaces `https://{tenant}.tickspot.com/` when set (fixtures, proxies)
    pub base_url: Option<Url>,
    /// Skip TLS certificate verification (off unless explicitly enabled)
    pub accept_invalid_certs: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        tenant: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            email: email.into(),
            password: password.into(),
            base_url: None,
            accept_invalid_certs: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Read configuration from the environment:
    /// - `TICKSPOT_TENANT`, `TICKSPOT_EMAIL`, `TICKSPOT_PASSWORD` (required)
    /// - `TICKSPOT_BASE_URL` (optional override)
    /// - `TICKSPOT_INSECURE` (`1` or `true` disables certificate checks)
    /// - `TICKSPOT_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let required = |name: &str| {
            env::var(name)
                .map_err(|_| TickspotError::Configuration(format!("{name} is not set")))
        };

        let mut config = Self::new(
            required("TICKSPOT_TENANT")?,
            required("TICKSPOT_EMAIL")?,
            required("TICKSPOT_PASSWORD")?,
        );

        if let Ok(base_url) = env::var("TICKSPOT_BASE_URL") {
            config.base_url = Some(Url::parse(&base_url)?);
        }

        config.accept_invalid_certs = env::var("TICKSPOT_INSECURE")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        if let Ok(secs) = env::var("TICKSPOT_TIMEOUT_SECS") {
            config.timeout = parse_timeout_secs(&secs)?;
        }

        Ok(config)
    }

    /// Check that tenant, email and password are present and usable, and that
    /// the timeout is non-zero.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("tenant", &self.tenant),
            ("email", &self.email),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(TickspotError::Configuration(format!(
                    "you must specify a {field}"
                )));
            }
        }

        if self.timeout.is_zero() {
            return Err(TickspotError::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }

        // Only needed when the tenant ends up in a hostname
        if self.base_url.is_none()
            && !self
                .tenant
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(TickspotError::Configuration(format!(
                "tenant is not a valid subdomain: {}",
                self.tenant
            )));
        }

        Ok(())
    }

    /// Derive the base, API and login URLs.
    pub fn endpoints(&self) -> Result<Endpoints> {
        let base = match &self.base_url {
            Some(url) => {
                let mut url = url.clone();
                if !url.path().ends_with('/') {
                    let path = format!("{}/", url.path());
                    url.set_path(&path);
                }
                url
            }
            None => Url::parse(&format!("https://{}.{}/", self.tenant, TICKSPOT_DOMAIN))?,
        };

        Ok(Endpoints {
            api: base.join("api")?,
            login: base.join("login")?,
            base,
        })
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("tenant", &self.tenant)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// URLs derived from the tenant. Fixed for the lifetime of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub base: Url,
    pub api: Url,
    pub login: Url,
}

impl Endpoints {
    /// `{api}/{endpoint}`
    pub fn api_endpoint(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api.as_str().trim_end_matches('/'), endpoint)
    }

    /// URL relative to the site root, used by the scraping fallback.
    pub fn site_path(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }
}

fn parse_timeout_secs(raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|&secs| secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            TickspotError::Configuration(format!(
                "TICKSPOT_TIMEOUT_SECS must be a positive number of seconds: {raw}"
            ))
        })
}
