//! Unsupported fallback: bulk project changes through the HTML site.
//!
//! The documented API cannot open, close or delete projects. The web UI can,
//! through plain form posts to `projects/{action}/{id}` once a browser
//! session exists. This module emulates that browser:
//!
//! 1. List projects through the API
//! 2. Parse the XML listing
//! 3. Log in through the HTML form at `/login` (session cookie lands in the
//!    client's cookie jar)
//! 4. POST to the per-project URL for every project, one at a time
//!
//! The login form fields (including the image-button click coordinates) are
//! copied from the site's HTML. If the site changes that form, logins start
//! being bounced back to the form and are refused here. Every failure here is
//! reported as [`TickspotError::Scrape`] so callers can tell it apart from
//! API errors.

use std::fmt;

use tracing::{info, warn};
use url::form_urlencoded;

use crate::client::TickspotClient;
use crate::error::{Result, TickspotError};
use crate::types::{Project, ProjectFilter};

/// Fields of the login form besides the credentials.
const LOGIN_FORM_EXTRAS: [(&str, &str); 4] = [
    ("remember[password]", "1"),
    ("remember[password]", ""),
    ("login.x", "74"),
    ("login.y", "25"),
];

/// Action available on the undocumented project URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    Delete,
    Close,
    Open,
}

impl ProjectAction {
    fn path_segment(self) -> &'static str {
        match self {
            Self::Delete => "delete_project",
            Self::Close => "close_project",
            Self::Open => "open_project",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Self::Delete => "Deleted",
            Self::Close => "Closed",
            Self::Open => "Opened",
        }
    }
}

impl fmt::Display for ProjectAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => write!(f, "delete"),
            Self::Close => write!(f, "close"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// Logged-in browser session.
///
/// Only obtainable from [`TickspotClient::authenticate`], so project actions
/// cannot be issued before a login has gone through. The site can still drop
/// the session later; an action bounced to the login form is an error.
pub struct ScrapeSession<'a> {
    client: &'a TickspotClient,
}

impl ScrapeSession<'_> {
    /// Apply `action` to a single project.
    pub async fn apply(&self, action: ProjectAction, project_id: u64) -> Result<()> {
        let url = self
            .client
            .endpoints
            .site_path(&format!("projects/{}/{}", action.path_segment(), project_id))?;

        let reply = self
            .client
            .send_form(url.as_str(), String::new(), Some(self.client.endpoints.base.as_str()))
            .await
            .map_err(|e| TickspotError::Scrape(format!("{} project {}: {}", action, project_id, e)))?;

        let endpoints = &self.client.endpoints;
        if !reply.is_success_or_redirect() {
            return Err(TickspotError::Scrape(format!(
                "{} project {} answered with status {}",
                action, project_id, reply.status
            )));
        }
        if reply.redirects_to(&endpoints.base, &endpoints.login) {
            return Err(TickspotError::Scrape(format!(
                "{} project {} was redirected to the login form (session missing or expired)",
                action, project_id
            )));
        }

        Ok(())
    }

    /// Apply `action` to every project in order. A failure is recorded and the
    /// remaining projects are still processed.
    pub async fn apply_all(&self, action: ProjectAction, projects: &[Project]) -> BulkReport {
        let mut outcomes = Vec::with_capacity(projects.len());

        for project in projects {
            let result = self.apply(action, project.id).await;
            let outcome = ProjectOutcome {
                action,
                project_id: project.id,
                project_name: project.name.clone(),
                result,
            };

            if outcome.is_success() {
                info!("{}", outcome);
            } else {
                warn!("{}", outcome);
            }
            outcomes.push(outcome);
        }

        let report = BulkReport { action, outcomes };
        info!(
            action = %action,
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            "bulk project {} completed",
            action
        );
        report
    }
}

impl TickspotClient {
    /// Log in through the HTML form, storing the session cookie in this
    /// client's cookie jar. Each call performs a fresh login.
    ///
    /// The login counts as refused when the form answers with an error status,
    /// redirects back to itself, or sets no cookie.
    pub async fn authenticate(&self) -> Result<ScrapeSession<'_>> {
        let mut form = form_urlencoded::Serializer::new(String::new());
        form.append_pair("user_login", &self.config.email)
            .append_pair("user_password", &self.config.password);
        for (name, value) in LOGIN_FORM_EXTRAS {
            form.append_pair(name, value);
        }

        let reply = self
            .send_form(
                self.endpoints.login.as_str(),
                form.finish(),
                Some(self.endpoints.base.as_str()),
            )
            .await
            .map_err(|e| TickspotError::Scrape(format!("login request failed: {}", e)))?;

        if !reply.is_success_or_redirect() {
            return Err(TickspotError::Scrape(format!(
                "login rejected with status {}",
                reply.status
            )));
        }
        if reply.redirects_to(&self.endpoints.base, &self.endpoints.login) {
            return Err(TickspotError::Scrape(
                "login redirected back to the login form".to_string(),
            ));
        }
        if !reply.sets_cookie {
            return Err(TickspotError::Scrape(
                "login response set no session cookie".to_string(),
            ));
        }

        info!(login = %self.endpoints.login, "logged in through the HTML form");
        Ok(ScrapeSession { client: self })
    }

    /// Delete every project visible to the account.
    pub async fn delete_all_projects(&self) -> Result<BulkReport> {
        self.apply_to_all_projects(ProjectAction::Delete).await
    }

    /// Close every project visible to the account.
    pub async fn close_all_projects(&self) -> Result<BulkReport> {
        self.apply_to_all_projects(ProjectAction::Close).await
    }

    /// Reopen every project visible to the account.
    pub async fn open_all_projects(&self) -> Result<BulkReport> {
        self.apply_to_all_projects(ProjectAction::Open).await
    }

    async fn apply_to_all_projects(&self, action: ProjectAction) -> Result<BulkReport> {
        let xml = self.list_projects(&ProjectFilter::default()).await?;
        let projects = Project::parse_listing(&xml)?;

        if projects.is_empty() {
            info!("no projects to {}", action);
            return Ok(BulkReport {
                action,
                outcomes: Vec::new(),
            });
        }

        let session = self.authenticate().await?;
        Ok(session.apply_all(action, &projects).await)
    }
}

/// Result of one project action.
#[derive(Debug)]
pub struct ProjectOutcome {
    pub action: ProjectAction,
    pub project_id: u64,
    pub project_name: String,
    pub result: Result<()>,
}

impl ProjectOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for ProjectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(()) => write!(
                f,
                "{} project: {} (#{})",
                self.action.past_tense(),
                self.project_name,
                self.project_id
            ),
            Err(e) => write!(
                f,
                "Failed to {} project: {} (#{}): {}",
                self.action, self.project_name, self.project_id, e
            ),
        }
    }
}

/// Per-project outcomes of a bulk action, in listing order.
#[derive(Debug)]
pub struct BulkReport {
    pub action: ProjectAction,
    pub outcomes: Vec<ProjectOutcome>,
}

impl BulkReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ProjectOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ProjectOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed().next().is_none()
    }
}
