use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tickspot_rs::{
    BulkReport, ClientConfig, EntryQuery, EntryUpdate, NewEntry, ProjectFilter, TaskFilter,
    TickspotClient,
};

const USAGE: &str = "\
Usage: tickspot <command> [key=value ...]

Commands:
  clients             [open=BOOL]
  projects            [project_id=N] [open=BOOL] [project_billable=BOOL]
  tasks               project_id=N [task_id=N] [open=BOOL] [task_billable=BOOL]
  user-details
  entries             updated_at=TIME | start_date=DATE end_date=DATE
                      [project_id=N] [task_id=N] [user_id=N] [user_email=S]
                      [client_id=N] [entry_billable=BOOL] [billed=BOOL]
  recent-tasks
  users               [project_id=N]
  create-entry        task_id=N hours=F date=DATE [notes=S]
  update-entry        id=N [hours=F] [date=DATE] [billed=BOOL] [task_id=N]
                      [user_id=N] [notes=S]
  delete-all-projects
  close-all-projects
  open-all-projects

Environment:
  TICKSPOT_TENANT, TICKSPOT_EMAIL, TICKSPOT_PASSWORD (required)
  TICKSPOT_BASE_URL, TICKSPOT_INSECURE, TICKSPOT_TIMEOUT_SECS (optional)";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tickspot=info,tickspot_rs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || matches!(args[1].as_str(), "-h" | "--help" | "help") {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let command = args[1].as_str();
    let opts = Options::parse(&args[2..])?;

    let config = ClientConfig::from_env().context("Failed to read configuration")?;
    let client = TickspotClient::new(config).context("Failed to initialize Tickspot client")?;

    let body = match command {
        "clients" => client.list_clients(opts.optional("open")?).await?,
        "projects" => {
            let filter = ProjectFilter {
                project_id: opts.optional("project_id")?,
                open: opts.optional("open")?,
                project_billable: opts.optional("project_billable")?,
            };
            client.list_projects(&filter).await?
        }
        "tasks" => {
            let filter = TaskFilter {
                task_id: opts.optional("task_id")?,
                open: opts.optional("open")?,
                task_billable: opts.optional("task_billable")?,
            };
            client.list_tasks(opts.required("project_id")?, &filter).await?
        }
        "user-details" => client.user_details().await?,
        "entries" => {
            let query = EntryQuery {
                updated_at: opts.optional("updated_at")?,
                start_date: opts.optional("start_date")?,
                end_date: opts.optional("end_date")?,
                project_id: opts.optional("project_id")?,
                task_id: opts.optional("task_id")?,
                user_id: opts.optional("user_id")?,
                user_email: opts.optional("user_email")?,
                client_id: opts.optional("client_id")?,
                entry_billable: opts.optional("entry_billable")?,
                billed: opts.optional("billed")?,
            };
            client.list_entries(&query).await?
        }
        "recent-tasks" => client.recent_tasks().await?,
        "users" => client.list_users(opts.optional("project_id")?).await?,
        "create-entry" => {
            let entry = NewEntry {
                task_id: opts.required("task_id")?,
                hours: opts.required("hours")?,
                date: opts.required("date")?,
                notes: opts.optional("notes")?,
            };
            client.create_entry(&entry).await?
        }
        "update-entry" => {
            let update = EntryUpdate {
                id: opts.required("id")?,
                hours: opts.optional("hours")?,
                date: opts.optional("date")?,
                billed: opts.optional("billed")?,
                task_id: opts.optional("task_id")?,
                user_id: opts.optional("user_id")?,
                notes: opts.optional("notes")?,
            };
            client.update_entry(&update).await?
        }
        "delete-all-projects" => return finish_bulk(client.delete_all_projects().await?),
        "close-all-projects" => return finish_bulk(client.close_all_projects().await?),
        "open-all-projects" => return finish_bulk(client.open_all_projects().await?),
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(1);
        }
    };

    println!("{}", body);
    Ok(())
}

/// Print one line per project; a single failure makes the whole run fail.
fn finish_bulk(report: BulkReport) -> Result<()> {
    for outcome in &report.outcomes {
        println!("{}", outcome);
    }

    let failed = report.failed().count();
    println!(
        "Project {} completed: {} succeeded, {} failed",
        report.action,
        report.succeeded().count(),
        failed
    );

    if failed > 0 {
        bail!("Failed to {} {} project(s)", report.action, failed);
    }
    Ok(())
}

/// `key=value` command arguments
struct Options(HashMap<String, String>);

impl Options {
    fn parse(args: &[String]) -> Result<Self> {
        let mut map = HashMap::new();
        for arg in args {
            let (key, value) = arg
                .split_once('=')
                .with_context(|| format!("Expected key=value, got '{}'", arg))?;
            map.insert(key.trim().to_string(), value.to_string());
        }
        Ok(Self(map))
    }

    fn optional<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(raw) => match raw.parse() {
                Ok(value) => Ok(Some(value)),
                Err(_) => bail!("Invalid value for {}: '{}'", key, raw),
            },
        }
    }

    fn required<T: FromStr>(&self, key: &str) -> Result<T> {
        self.optional(key)?
            .with_context(|| format!("Missing required argument {}=...", key))
    }
}
