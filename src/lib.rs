pub mod date_util;
pub mod error;
pub mod metrics;
pub mod model;
pub mod query;
pub mod report;
pub mod storage;

pub use error::{Error, Result};
pub use metrics::{compute_kpi_metrics, DashboardSummary, KpiMetrics, MetricsOptions};
pub use model::{
    Category, NewComment, NewTicket, NewUser, Priority, Role, Status, Ticket, TicketComment,
    TicketUpdate, User,
};
pub use query::builder::TicketQuery;
pub use storage::Database;

use chrono::{DateTime, Utc};

use storage::repository;

/// Config key holding the first day of the week for trend windows.
pub const CONFIG_WEEK_START: &str = "week_start";
/// Config key holding the email of the acting user.
pub const CONFIG_CURRENT_USER: &str = "current_user";

/// Main entry point for the helpdesk: tickets, users, config and metrics.
pub struct HelpDesk {
    db: Database,
}

impl HelpDesk {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    // ── Users ──────────────────────────────────────────────────────

    pub async fn register_user(&self, new: NewUser) -> Result<User> {
        let email = new.email.trim().to_string();
        validate_email(&email)?;
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::Validation("user name must not be empty".into()));
        }
        if self.find_user_by_email(&email).await?.is_some() {
            return Err(Error::Conflict(format!("a user with email {email} already exists")));
        }

        let user = User {
            id: format!("user-{}", uuid::Uuid::new_v4()),
            email,
            name,
            role: new.role,
            department: new.department.filter(|d| !d.trim().is_empty()),
            created_at: date_util::now(),
        };
        self.db
            .writer()
            .call({
                let user = user.clone();
                move |conn| repository::insert_user(conn, &user)
            })
            .await?;
        log::info!("Registered user {} ({})", user.email, user.role);
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.db
            .reader()
            .call(|conn| repository::list_users(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.db
            .reader()
            .call({
                let email = email.to_string();
                move |conn| repository::find_user_by_email(conn, &email)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.db
            .reader()
            .call({
                let user_id = user_id.to_string();
                move |conn| repository::get_user(conn, &user_id)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn require_user(&self, user_id: &str) -> Result<User> {
        self.get_user(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {user_id}")))
    }

    /// The user named by the `current_user` config key, if one is set.
    pub async fn current_user(&self) -> Result<Option<User>> {
        let Some(email) = self.config_get(CONFIG_CURRENT_USER).await? else {
            return Ok(None);
        };
        match self.find_user_by_email(&email).await? {
            Some(user) => Ok(Some(user)),
            None => Err(Error::NotFound(format!(
                "current_user {email} is not a registered user"
            ))),
        }
    }

    // ── Tickets ────────────────────────────────────────────────────

    pub async fn create_ticket(&self, new: NewTicket) -> Result<Ticket> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::Validation("ticket title must not be empty".into()));
        }
        let creator = self.require_user(&new.created_by).await?;
        let assignee = match new.assigned_to.as_deref() {
            Some(id) => Some(self.require_user(id).await?),
            None => None,
        };

        let now = date_util::now();
        let ticket = Ticket {
            id: format!("ticket-{}", uuid::Uuid::new_v4()),
            title,
            description: new.description,
            reproduction_steps: new.reproduction_steps,
            resolution_steps: None,
            category: new.category,
            priority: new.priority,
            status: Status::Open,
            assigned_to: assignee.as_ref().map(|u| u.id.clone()),
            assigned_to_name: assignee.map(|u| u.name),
            created_by: creator.id,
            created_by_name: creator.name,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            resolved_by: None,
            resolved_by_name: None,
            screenshots: new.screenshots,
            comments: Vec::new(),
        };
        self.save_ticket(&ticket).await?;
        log::info!("Created {} ({}, {})", ticket.id, ticket.category, ticket.priority);
        Ok(ticket)
    }

    pub async fn update_ticket(&self, ticket_id: &str, update: TicketUpdate) -> Result<Ticket> {
        let mut ticket = self.require_ticket(ticket_id).await?;
        let now = date_util::now();

        if let Some(title) = update.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(Error::Validation("ticket title must not be empty".into()));
            }
            ticket.title = title;
        }
        if let Some(description) = update.description {
            ticket.description = description;
        }
        if let Some(category) = update.category {
            ticket.category = category;
        }
        if let Some(priority) = update.priority {
            ticket.priority = priority;
        }
        if let Some(assignee) = update.assigned_to {
            match assignee {
                Some(id) => {
                    let user = self.require_user(&id).await?;
                    ticket.assigned_to = Some(user.id);
                    ticket.assigned_to_name = Some(user.name);
                }
                None => {
                    ticket.assigned_to = None;
                    ticket.assigned_to_name = None;
                }
            }
        }
        if let Some(steps) = update.resolution_steps {
            ticket.resolution_steps = Some(steps);
        }
        if let Some(status) = update.status {
            let was_resolved = ticket.status == Status::Resolved;
            let now_resolved = status == Status::Resolved;
            if now_resolved && !was_resolved {
                ticket.resolved_at = Some(now);
                if let Some(id) = update.resolved_by.as_deref() {
                    let user = self.require_user(id).await?;
                    ticket.resolved_by = Some(user.id);
                    ticket.resolved_by_name = Some(user.name);
                }
            } else if was_resolved && !now_resolved {
                ticket.resolved_at = None;
                ticket.resolved_by = None;
                ticket.resolved_by_name = None;
            }
            ticket.status = status;
        }
        ticket.updated_at = now;

        self.save_ticket(&ticket).await?;
        log::info!("Updated {} (status {})", ticket.id, ticket.status);
        Ok(ticket)
    }

    /// Record resolution steps and move the ticket to resolved.
    pub async fn resolve_ticket(
        &self,
        ticket_id: &str,
        resolution_steps: &str,
        resolved_by: Option<&str>,
    ) -> Result<Ticket> {
        self.update_ticket(
            ticket_id,
            TicketUpdate {
                status: Some(Status::Resolved),
                resolution_steps: Some(resolution_steps.to_string()),
                resolved_by: resolved_by.map(str::to_string),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn add_comment(&self, ticket_id: &str, new: NewComment) -> Result<TicketComment> {
        let content = new.content.trim().to_string();
        if content.is_empty() {
            return Err(Error::Validation("comment must not be empty".into()));
        }
        let ticket = self.require_ticket(ticket_id).await?;
        let author = self.require_user(&new.user_id).await?;

        let comment = TicketComment {
            id: format!("comment-{}", uuid::Uuid::new_v4()),
            ticket_id: ticket.id,
            user_id: author.id,
            user_name: author.name,
            content,
            created_at: date_util::now(),
        };
        self.db
            .writer()
            .call({
                let comment = comment.clone();
                move |conn| {
                    repository::insert_comment(conn, &comment)?;
                    repository::touch_ticket(conn, &comment.ticket_id, comment.created_at)
                }
            })
            .await?;
        log::info!("Comment {} added to {}", comment.id, comment.ticket_id);
        Ok(comment)
    }

    pub async fn get_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>> {
        self.db
            .reader()
            .call({
                let ticket_id = ticket_id.to_string();
                move |conn| repository::get_ticket(conn, &ticket_id)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn require_ticket(&self, ticket_id: &str) -> Result<Ticket> {
        self.get_ticket(ticket_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ticket {ticket_id}")))
    }

    /// Every ticket in insertion order.
    pub async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        self.db
            .reader()
            .call(|conn| repository::list_tickets(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Load tickets from a JSON export, replacing any with the same id.
    /// Returns the number of tickets written.
    pub async fn import_tickets(&self, tickets: Vec<Ticket>) -> Result<usize> {
        let count = tickets.len();
        self.db
            .writer()
            .call(move |conn| {
                let tx = conn.transaction()?;
                for ticket in &tickets {
                    repository::upsert_ticket(&tx, ticket)?;
                }
                tx.commit()
            })
            .await?;
        log::info!("Imported {count} tickets");
        Ok(count)
    }

    /// Every ticket as a pretty-printed JSON array, readable by [`Self::import_tickets`].
    pub async fn export_tickets(&self) -> Result<String> {
        let tickets = self.list_tickets().await?;
        Ok(serde_json::to_string_pretty(&tickets)?)
    }

    /// Write the ticket row only. Comments are appended by [`Self::add_comment`]
    /// and never rewritten from a possibly stale copy.
    async fn save_ticket(&self, ticket: &Ticket) -> Result<()> {
        self.db
            .writer()
            .call({
                let ticket = ticket.clone();
                move |conn| repository::upsert_ticket_row(conn, &ticket)
            })
            .await?;
        Ok(())
    }

    /// Ticket counts per raw status label, for a quick overview.
    pub async fn status_counts(&self) -> Result<Vec<(String, u64)>> {
        self.db
            .reader()
            .call(|conn| repository::count_tickets_by_status(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Metrics ────────────────────────────────────────────────────

    /// Metric options from config, falling back to defaults.
    pub async fn metrics_options(&self) -> Result<MetricsOptions> {
        let mut options = MetricsOptions::default();
        if let Some(day) = self.config_get(CONFIG_WEEK_START).await? {
            options.week_start = date_util::parse_weekday(&day)
                .map_err(|e| Error::Config(format!("{CONFIG_WEEK_START}: {e}")))?;
        }
        Ok(options)
    }

    /// KPI snapshot over every stored ticket and user as of `now`.
    pub async fn kpi_metrics(
        &self,
        now: DateTime<Utc>,
        options: &MetricsOptions,
    ) -> Result<KpiMetrics> {
        let (tickets, users) = self
            .db
            .reader()
            .call(|conn| {
                Ok::<_, rusqlite::Error>((
                    repository::list_tickets(conn)?,
                    repository::list_users(conn)?,
                ))
            })
            .await?;
        Ok(compute_kpi_metrics(&tickets, &users, now, options))
    }

    /// Dashboard counts over the tickets `user` can see.
    pub async fn dashboard(&self, user: &User) -> Result<DashboardSummary> {
        let visible = TicketQuery::new().visible_to(user).tickets(&self.db).await?;
        Ok(metrics::compute_dashboard_summary(&visible, user))
    }

    // ── Config ─────────────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        self.db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_config(conn, &key)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Store a config value. Known keys are validated before writing.
    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            CONFIG_WEEK_START => {
                date_util::parse_weekday(value)?;
            }
            CONFIG_CURRENT_USER => {
                if self.find_user_by_email(value).await?.is_none() {
                    return Err(Error::NotFound(format!("user with email {value}")));
                }
            }
            _ => {}
        }
        self.db
            .writer()
            .call({
                let key = key.to_string();
                let value = value.to_string();
                move |conn| repository::set_config(conn, &key, &value)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        self.db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}

/// `local@domain.tld` with no whitespace.
fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!("invalid email address: {email}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn helpdesk() -> HelpDesk {
        HelpDesk::new(Database::open_memory().await.unwrap())
    }

    fn new_ticket(category: Category) -> NewTicket {
        NewTicket {
            title: "Printer jam".into(),
            description: "Tray 2".into(),
            reproduction_steps: String::new(),
            category,
            priority: Priority::Medium,
            created_by: "employee-1".into(),
            assigned_to: None,
            screenshots: vec![],
        }
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("ab.co").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("@b.co").is_err());
        assert!(validate_email("a b@c.co").is_err());
    }

    #[tokio::test]
    async fn test_create_ticket_defaults() {
        let hd = helpdesk().await;
        let mut new = new_ticket(Category::Hardware);
        new.assigned_to = Some("tech-1".into());
        let t = hd.create_ticket(new).await.unwrap();

        assert!(t.id.starts_with("ticket-"));
        assert_eq!(t.status, Status::Open);
        assert_eq!(t.created_at, t.updated_at);
        assert_eq!(t.created_by_name, "John Employee");
        assert_eq!(t.assigned_to_name.as_deref(), Some("Tech Support"));
        assert_eq!(hd.get_ticket(&t.id).await.unwrap(), Some(t));
    }

    #[tokio::test]
    async fn test_create_ticket_rejects_bad_input() {
        let hd = helpdesk().await;
        let mut blank = new_ticket(Category::Other);
        blank.title = "   ".into();
        assert!(matches!(hd.create_ticket(blank).await, Err(Error::Validation(_))));

        let mut stranger = new_ticket(Category::Other);
        stranger.created_by = "nobody".into();
        assert!(matches!(hd.create_ticket(stranger).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_status_transitions_track_resolved_at() {
        let hd = helpdesk().await;
        let t = hd.create_ticket(new_ticket(Category::Software)).await.unwrap();

        let resolved = hd
            .resolve_ticket(&t.id, "Reinstalled driver", Some("dev-1"))
            .await
            .unwrap();
        assert_eq!(resolved.status, Status::Resolved);
        assert!(resolved.resolved_at.is_some());
        assert_eq!(resolved.resolved_by_name.as_deref(), Some("Developer"));
        assert_eq!(resolved.resolution_steps.as_deref(), Some("Reinstalled driver"));

        let reopened = hd
            .update_ticket(
                &t.id,
                TicketUpdate {
                    status: Some(Status::Open),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(reopened.resolved_at, None);
        assert_eq!(reopened.resolved_by, None);
        assert!(reopened.updated_at >= resolved.updated_at);
    }

    #[tokio::test]
    async fn test_update_unknown_ticket() {
        let hd = helpdesk().await;
        let err = hd
            .update_ticket("ticket-missing", TicketUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_comment() {
        let hd = helpdesk().await;
        let t = hd.create_ticket(new_ticket(Category::Network)).await.unwrap();

        let empty = NewComment {
            user_id: "tech-1".into(),
            content: " ".into(),
        };
        assert!(matches!(hd.add_comment(&t.id, empty).await, Err(Error::Validation(_))));

        let c = hd
            .add_comment(
                &t.id,
                NewComment {
                    user_id: "tech-1".into(),
                    content: "On it".into(),
                },
            )
            .await
            .unwrap();
        assert!(c.id.starts_with("comment-"));

        let loaded = hd.get_ticket(&t.id).await.unwrap().unwrap();
        assert_eq!(loaded.comments, vec![c.clone()]);
        assert_eq!(loaded.updated_at, c.created_at);

        let missing = NewComment {
            user_id: "tech-1".into(),
            content: "Hello".into(),
        };
        assert!(matches!(
            hd.add_comment("ticket-missing", missing).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_comments() {
        let hd = helpdesk().await;
        let t = hd.create_ticket(new_ticket(Category::Hardware)).await.unwrap();
        hd.add_comment(
            &t.id,
            NewComment {
                user_id: "tech-1".into(),
                content: "Ordered a new tray".into(),
            },
        )
        .await
        .unwrap();

        hd.update_ticket(
            &t.id,
            TicketUpdate {
                priority: Some(Priority::High),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let loaded = hd.get_ticket(&t.id).await.unwrap().unwrap();
        assert_eq!(loaded.priority, Priority::High);
        assert_eq!(loaded.comments.len(), 1);
    }

    #[tokio::test]
    async fn test_register_user() {
        let hd = helpdesk().await;
        let user = hd
            .register_user(NewUser {
                email: "ops@company.com".into(),
                name: "Ops".into(),
                role: Role::TechSupport,
                department: None,
            })
            .await
            .unwrap();
        assert!(user.id.starts_with("user-"));
        assert_eq!(hd.list_users().await.unwrap().last(), Some(&user));

        let dup = hd
            .register_user(NewUser {
                email: "OPS@company.com".into(),
                name: "Other".into(),
                role: Role::Employee,
                department: None,
            })
            .await;
        assert!(matches!(dup, Err(Error::Conflict(_))));

        let bad = hd
            .register_user(NewUser {
                email: "not-an-email".into(),
                name: "Bad".into(),
                role: Role::Employee,
                department: None,
            })
            .await;
        assert!(matches!(bad, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_config_drives_options_and_current_user() {
        let hd = helpdesk().await;
        assert_eq!(hd.metrics_options().await.unwrap(), MetricsOptions::default());
        assert_eq!(hd.current_user().await.unwrap(), None);

        hd.config_set(CONFIG_WEEK_START, "monday").await.unwrap();
        assert_eq!(
            hd.metrics_options().await.unwrap().week_start,
            chrono::Weekday::Mon
        );
        assert!(hd.config_set(CONFIG_WEEK_START, "someday").await.is_err());

        hd.config_set(CONFIG_CURRENT_USER, "dev@company.com").await.unwrap();
        let me = hd.current_user().await.unwrap().unwrap();
        assert_eq!(me.id, "dev-1");
        assert!(hd.config_set(CONFIG_CURRENT_USER, "ghost@company.com").await.is_err());
    }

    #[tokio::test]
    async fn test_dashboard_is_role_scoped() {
        let hd = helpdesk().await;
        hd.create_ticket(new_ticket(Category::Hardware)).await.unwrap();
        hd.create_ticket(new_ticket(Category::Software)).await.unwrap();

        let tech = hd.get_user("tech-1").await.unwrap().unwrap();
        let summary = hd.dashboard(&tech).await.unwrap();
        assert_eq!(summary.visible, 1);
        assert_eq!(summary.open, 1);

        let employee = hd.get_user("employee-1").await.unwrap().unwrap();
        let summary = hd.dashboard(&employee).await.unwrap();
        assert_eq!(summary.visible, 2);
        assert_eq!(summary.my_tickets, 2);
    }
}
