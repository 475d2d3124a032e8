pub mod client;
pub mod config;
pub mod error;
pub mod params;
pub mod scrape;
pub mod types;

pub use client::TickspotClient;
pub use config::{ClientConfig, Endpoints};
pub use error::{Result, TickspotError};
pub use params::{ParamValue, RequestParams};
pub use scrape::{BulkReport, ProjectAction, ProjectOutcome, ScrapeSession};
pub use types::{EntryQuery, EntryUpdate, NewEntry, Project, ProjectFilter, TaskFilter};
