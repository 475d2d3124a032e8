use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Result, TickspotError};
use crate::params::RequestParams;

/// Filters for the `projects` listing
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub project_id: Option<u64>,
    /// `Some(true)` open only, `Some(false)` closed only, `None` both
    pub open: Option<bool>,
    pub project_billable: Option<bool>,
}

impl ProjectFilter {
    pub(crate) fn write_params(&self, params: &mut RequestParams) {
        params.insert("project_id", self.project_id);
        params.insert("open", self.open);
        params.insert("project_billable", self.project_billable);
    }
}

/// Optional filters for the `tasks` listing; `project_id` is passed separately
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub task_id: Option<u64>,
    pub open: Option<bool>,
    pub task_billable: Option<bool>,
}

impl TaskFilter {
    pub(crate) fn write_params(&self, params: &mut RequestParams) {
        params.insert("task_id", self.task_id);
        params.insert("open", self.open);
        params.insert("task_billable", self.task_billable);
    }
}

/// Criteria for the `entries` listing.
///
/// Either `updated_at` or both `start_date` and `end_date` must be set. When
/// `updated_at` is present the date range is ignored.
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    pub updated_at: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub project_id: Option<u64>,
    pub task_id: Option<u64>,
    pub user_id: Option<u64>,
    pub user_email: Option<String>,
    pub client_id: Option<u64>,
    pub entry_billable: Option<bool>,
    pub billed: Option<bool>,
}

impl EntryQuery {
    /// Entries changed after `updated_at`
    pub fn updated_since(updated_at: impl Into<String>) -> Self {
        Self {
            updated_at: Some(updated_at.into()),
            ..Default::default()
        }
    }

    /// Entries dated between `start_date` and `end_date`
    pub fn between(start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self {
            start_date: Some(start_date.into()),
            end_date: Some(end_date.into()),
            ..Default::default()
        }
    }

    pub(crate) fn write_params(&self, params: &mut RequestParams) -> Result<()> {
        if self.updated_at.is_none() && (self.start_date.is_none() || self.end_date.is_none()) {
            return Err(TickspotError::Validation(
                "you must provide either updated_at or both start_date and end_date".to_string(),
            ));
        }

        params.insert("project_id", self.project_id);
        params.insert("task_id", self.task_id);
        params.insert("user_id", self.user_id);
        params.insert("user_email", self.user_email.as_ref());
        params.insert("client_id", self.client_id);
        params.insert("entry_billable", self.entry_billable);
        params.insert("billed", self.billed);

        match &self.updated_at {
            Some(updated_at) => params.insert("updated_at", Some(updated_at)),
            None => {
                params.insert("start_date", self.start_date.as_ref());
                params.insert("end_date", self.end_date.as_ref());
            }
        }

        Ok(())
    }
}

/// A new time entry
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub task_id: u64,
    pub hours: f64,
    pub date: String,
    pub notes: Option<String>,
}

impl NewEntry {
    pub(crate) fn write_params(&self, params: &mut RequestParams) {
        params.insert("task_id", Some(self.task_id));
        params.insert("hours", Some(self.hours));
        params.insert("date", Some(&self.date));
        params.insert("notes", self.notes.as_ref());
    }
}

/// Partial update of an existing entry. Only the fields that are set are sent.
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    /// Id of the entry being modified
    pub id: u64,
    pub hours: Option<f64>,
    pub date: Option<String>,
    pub billed: Option<bool>,
    pub task_id: Option<u64>,
    pub user_id: Option<u64>,
    pub notes: Option<String>,
}

impl EntryUpdate {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub(crate) fn write_params(&self, params: &mut RequestParams) {
        params.insert("id", Some(self.id));
        params.insert("hours", self.hours);
        params.insert("date", self.date.as_ref());
        params.insert("billed", self.billed);
        params.insert("task_id", self.task_id);
        params.insert("user_id", self.user_id);
        params.insert("notes", self.notes.as_ref());
    }
}

/// A project record from the `projects` listing.
///
/// Only the fields the bulk project operations need are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub client_name: Option<String>,
    pub closed_on: Option<String>,
}

impl Project {
    /// Parse the XML body of the `projects` endpoint.
    ///
    /// ```xml
    /// <projects type="array">
    ///   <project>
    ///     <id type="integer">7</id>
    ///     <name>Website</name>
    ///     <client_name>Acme</client_name>
    ///     <closed_on type="date"></closed_on>
    ///     <tasks type="array">...</tasks>
    ///   </project>
    /// </projects>
    /// ```
    ///
    /// Elements other than the direct children listed above are skipped, so
    /// the ids of nested tasks never leak into the project record.
    pub fn parse_listing(xml: &str) -> Result<Vec<Project>> {
        // Untrimmed: a value split by comments or CDATA arrives in fragments
        let mut reader = Reader::from_str(xml);

        let mut path: Vec<String> = Vec::new();
        let mut saw_root = false;
        let mut projects = Vec::new();
        let mut current: Option<ProjectBuilder> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                TickspotError::Xml(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            })?;

            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if path.is_empty() {
                        if name != "projects" {
                            return Err(TickspotError::Xml(format!(
                                "expected <projects> root, found <{}>",
                                name
                            )));
                        }
                        saw_root = true;
                    } else if path.len() == 1 && name == "project" {
                        current = Some(ProjectBuilder::default());
                    }
                    path.push(name);
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if path.is_empty() {
                        if name != "projects" {
                            return Err(TickspotError::Xml(format!(
                                "expected <projects> root, found <{}/>",
                                name
                            )));
                        }
                        saw_root = true;
                    }
                }
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| TickspotError::Xml(e.to_string()))?
                        .into_owned();
                    if let Some(builder) = current.as_mut()
                        && path.len() == 3
                    {
                        builder.append(&path[2], &text);
                    }
                }
                Event::CData(c) => {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    if let Some(builder) = current.as_mut()
                        && path.len() == 3
                    {
                        builder.append(&path[2], &text);
                    }
                }
                Event::End(_) => {
                    if path.len() == 2
                        && let Some(builder) = current.take()
                    {
                        projects.push(builder.build()?);
                    }
                    path.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(TickspotError::Xml("missing <projects> root element".to_string()));
        }

        Ok(projects)
    }
}

#[derive(Default)]
struct ProjectBuilder {
    id: Option<String>,
    name: Option<String>,
    client_name: Option<String>,
    closed_on: Option<String>,
}

impl ProjectBuilder {
    fn append(&mut self, field: &str, text: &str) {
        let slot = match field {
            "id" => &mut self.id,
            "name" => &mut self.name,
            "client_name" => &mut self.client_name,
            "closed_on" => &mut self.closed_on,
            _ => return,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    fn build(self) -> Result<Project> {
        let raw_id = self
            .id
            .ok_or_else(|| TickspotError::Xml("project without <id>".to_string()))?;
        let id = raw_id
            .trim()
            .parse()
            .map_err(|_| TickspotError::Xml(format!("project id is not a number: {}", raw_id)))?;

        Ok(Project {
            id,
            name: self.name.map(|s| s.trim().to_string()).unwrap_or_default(),
            client_name: non_blank(self.client_name),
            closed_on: non_blank(self.closed_on),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
