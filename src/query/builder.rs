use chrono::{DateTime, Utc};

use crate::date_util::format_instant;
use crate::error::Result;
use crate::model::{Category, Priority, Role, Status, Ticket, User};
use crate::storage::repository::{attach_comments, ticket_from_row, TICKET_COLUMNS};
use crate::storage::Database;

/// Builder for constructing ticket queries with optional filters.
#[derive(Debug, Clone, Default)]
pub struct TicketQuery {
    search: Option<String>,
    status: Option<Status>,
    category: Option<Category>,
    priority: Option<Priority>,
    assigned_to: Option<String>,
    created_by: Option<String>,
    viewer: Option<(Role, String)>,
    created_after: Option<DateTime<Utc>>,
    created_before: Option<DateTime<Utc>>,
    limit: Option<u32>,
    oldest_first: bool,
}

impl TicketQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive substring match on title, description or creator name.
    pub fn search(mut self, term: &str) -> Self {
        let term = term.trim();
        if !term.is_empty() {
            self.search = Some(term.to_lowercase());
        }
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn assigned_to(mut self, user_id: &str) -> Self {
        self.assigned_to = Some(user_id.to_string());
        self
    }

    pub fn created_by(mut self, user_id: &str) -> Self {
        self.created_by = Some(user_id.to_string());
        self
    }

    /// Restrict to what `user`'s role lets them see.
    pub fn visible_to(mut self, user: &User) -> Self {
        self.viewer = Some((user.role.clone(), user.id.clone()));
        self
    }

    pub fn created_after(mut self, t: DateTime<Utc>) -> Self {
        self.created_after = Some(t);
        self
    }

    pub fn created_before(mut self, t: DateTime<Utc>) -> Self {
        self.created_before = Some(t);
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    /// Order by creation time ascending instead of newest first.
    pub fn oldest_first(mut self) -> Self {
        self.oldest_first = true;
        self
    }

    /// Build and execute the query, returning tickets with their comments.
    pub async fn tickets(self, db: &Database) -> Result<Vec<Ticket>> {
        let builder = self;
        db.reader()
            .call(move |conn| {
                let (sql, params) = builder.build_sql();
                let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                    params.iter().map(|p| p.as_ref()).collect();
                let mut stmt = conn.prepare(&sql)?;
                let tickets = stmt
                    .query_map(param_refs.as_slice(), ticket_from_row)?
                    .collect::<std::result::Result<Vec<Ticket>, _>>()?;
                attach_comments(conn, tickets)
            })
            .await
            .map_err(|e| crate::error::Error::Database(e.to_string()))
    }

    /// Build and execute the query, returning a count of matching tickets.
    pub async fn count(self, db: &Database) -> Result<u64> {
        let builder = self;
        db.reader()
            .call(move |conn| {
                let (inner_sql, params) = builder.build_sql();
                let sql = format!("SELECT COUNT(*) FROM ({inner_sql})");
                let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                    params.iter().map(|p| p.as_ref()).collect();
                let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
                Ok::<u64, rusqlite::Error>(count as u64)
            })
            .await
            .map_err(|e| crate::error::Error::Database(e.to_string()))
    }

    /// Build and execute the query, returning results as JSON.
    pub async fn to_json(self, db: &Database) -> Result<String> {
        let rows = self.tickets(db).await?;
        Ok(serde_json::to_string_pretty(&rows)?)
    }

    /// Build and execute the query, returning results as CSV.
    pub async fn to_csv(self, db: &Database) -> Result<String> {
        let rows = self.tickets(db).await?;
        let mut out = String::new();
        out.push_str("id,title,category,priority,status,created_by_name,assigned_to_name,created_at,updated_at,resolved_at,comments\n");
        for t in &rows {
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{}\n",
                csv_escape(&t.id),
                csv_escape(&t.title),
                csv_escape(t.category.as_str()),
                csv_escape(t.priority.as_str()),
                csv_escape(t.status.as_str()),
                csv_escape(&t.created_by_name),
                csv_escape(t.assigned_to_name.as_deref().unwrap_or("")),
                format_instant(t.created_at),
                format_instant(t.updated_at),
                t.resolved_at.map(format_instant).unwrap_or_default(),
                t.comments.len(),
            ));
        }
        Ok(out)
    }

    fn build_sql(&self) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut wheres = Vec::new();
        let mut param_idx = 1;

        // Search across title, description and creator
        if let Some(ref term) = self.search {
            wheres.push(format!(
                "(fold_case(t.title) LIKE ?{param_idx} ESCAPE '\\' \
                 OR fold_case(t.description) LIKE ?{param_idx} ESCAPE '\\' \
                 OR fold_case(t.created_by_name) LIKE ?{param_idx} ESCAPE '\\')"
            ));
            params.push(Box::new(format!("%{}%", like_escape(term))));
            param_idx += 1;
        }

        // Exact label filters
        if let Some(ref status) = self.status {
            wheres.push(format!("t.status = ?{param_idx}"));
            params.push(Box::new(status.as_str().to_string()));
            param_idx += 1;
        }
        if let Some(ref category) = self.category {
            wheres.push(format!("t.category = ?{param_idx}"));
            params.push(Box::new(category.as_str().to_string()));
            param_idx += 1;
        }
        if let Some(ref priority) = self.priority {
            wheres.push(format!("t.priority = ?{param_idx}"));
            params.push(Box::new(priority.as_str().to_string()));
            param_idx += 1;
        }

        if let Some(ref id) = self.assigned_to {
            wheres.push(format!("t.assigned_to = ?{param_idx}"));
            params.push(Box::new(id.clone()));
            param_idx += 1;
        }
        if let Some(ref id) = self.created_by {
            wheres.push(format!("t.created_by = ?{param_idx}"));
            params.push(Box::new(id.clone()));
            param_idx += 1;
        }

        // Role-scoped visibility
        if let Some((ref role, ref id)) = self.viewer {
            let clause = match role {
                Role::Employee => Some(format!("t.created_by = ?{param_idx}")),
                Role::TechSupport => Some(format!(
                    "(t.category IN ('hardware', 'network') OR t.assigned_to = ?{param_idx})"
                )),
                Role::Developer => Some(format!(
                    "(t.category IN ('software', 'security') OR t.assigned_to = ?{param_idx})"
                )),
                Role::ItAdmin | Role::Unrecognized(_) => None,
            };
            if let Some(clause) = clause {
                wheres.push(clause);
                params.push(Box::new(id.clone()));
                param_idx += 1;
            }
        }

        // Date range filters
        if let Some(t) = self.created_after {
            wheres.push(format!("t.created_at >= ?{param_idx}"));
            params.push(Box::new(format_instant(t)));
            param_idx += 1;
        }
        if let Some(t) = self.created_before {
            wheres.push(format!("t.created_at <= ?{param_idx}"));
            params.push(Box::new(format_instant(t)));
            param_idx += 1;
        }

        // Assemble SQL
        let mut sql = format!("SELECT {TICKET_COLUMNS} FROM tickets t");
        if !wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&wheres.join(" AND "));
        }

        // ORDER BY, rowid breaks ties between equal timestamps
        let order_dir = if self.oldest_first { "ASC" } else { "DESC" };
        sql.push_str(&format!(" ORDER BY t.created_at {order_dir}, t.rowid {order_dir}"));

        // LIMIT
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT ?{param_idx}"));
            params.push(Box::new(limit));
        }

        (sql, params)
    }
}

fn like_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
