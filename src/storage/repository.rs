use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::date_util::format_instant;
use crate::model::{Category, Priority, Role, Status, Ticket, TicketComment, User};

// ── Row helpers ────────────────────────────────────────────────────

fn get_instant(row: &Row, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_opt_instant(row: &Row, idx: usize) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(_) => get_instant(row, idx).map(Some),
        None => Ok(None),
    }
}

// ── Users ──────────────────────────────────────────────────────────

const USER_COLUMNS: &str = "user_id, email, name, role, department, created_at";

fn user_from_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: Role::from(row.get::<_, String>(3)?),
        department: row.get(4)?,
        created_at: get_instant(row, 5)?,
    })
}

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO users (user_id, email, name, role, department, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.email,
            user.name,
            user.role.as_str(),
            user.department,
            format_instant(user.created_at),
        ],
    )?;
    Ok(())
}

/// All users in the order they were added.
pub fn list_users(conn: &Connection) -> Result<Vec<User>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY rowid"))?;
    let rows = stmt.query_map([], user_from_row)?;
    rows.collect()
}

pub fn get_user(conn: &Connection, user_id: &str) -> Result<Option<User>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
        params![user_id],
        user_from_row,
    )
    .optional()
}

/// Case-insensitive email lookup.
pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"),
        params![email.trim()],
        user_from_row,
    )
    .optional()
}

// ── Tickets ────────────────────────────────────────────────────────

pub(crate) const TICKET_COLUMNS: &str = "t.ticket_id, t.title, t.description, t.reproduction_steps,
    t.resolution_steps, t.category, t.priority, t.status, t.assigned_to, t.assigned_to_name,
    t.created_by, t.created_by_name, t.created_at, t.updated_at, t.resolved_at,
    t.resolved_by, t.resolved_by_name, t.screenshots_json";

/// Map a row selected with [`TICKET_COLUMNS`]. Comments are left empty.
pub(crate) fn ticket_from_row(row: &Row) -> Result<Ticket, rusqlite::Error> {
    let screenshots_json: String = row.get(17)?;
    let screenshots: Vec<String> = serde_json::from_str(&screenshots_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(17, Type::Text, Box::new(e)))?;

    Ok(Ticket {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        reproduction_steps: row.get(3)?,
        resolution_steps: row.get(4)?,
        category: Category::from(row.get::<_, String>(5)?),
        priority: Priority::from(row.get::<_, String>(6)?),
        status: Status::from(row.get::<_, String>(7)?),
        assigned_to: row.get(8)?,
        assigned_to_name: row.get(9)?,
        created_by: row.get(10)?,
        created_by_name: row.get(11)?,
        created_at: get_instant(row, 12)?,
        updated_at: get_instant(row, 13)?,
        resolved_at: get_opt_instant(row, 14)?,
        resolved_by: row.get(15)?,
        resolved_by_name: row.get(16)?,
        screenshots,
        comments: Vec::new(),
    })
}

/// Insert a ticket or overwrite the row with the same id, keeping its
/// position in insertion order. Stored comments are left alone.
pub fn upsert_ticket_row(conn: &Connection, ticket: &Ticket) -> Result<(), rusqlite::Error> {
    let screenshots_json = serde_json::to_string(&ticket.screenshots)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    conn.execute(
        "INSERT INTO tickets (
            ticket_id, title, description, reproduction_steps, resolution_steps,
            category, priority, status, assigned_to, assigned_to_name,
            created_by, created_by_name, created_at, updated_at, resolved_at,
            resolved_by, resolved_by_name, screenshots_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        ON CONFLICT(ticket_id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            reproduction_steps = excluded.reproduction_steps,
            resolution_steps = excluded.resolution_steps,
            category = excluded.category,
            priority = excluded.priority,
            status = excluded.status,
            assigned_to = excluded.assigned_to,
            assigned_to_name = excluded.assigned_to_name,
            created_by = excluded.created_by,
            created_by_name = excluded.created_by_name,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at,
            resolved_at = excluded.resolved_at,
            resolved_by = excluded.resolved_by,
            resolved_by_name = excluded.resolved_by_name,
            screenshots_json = excluded.screenshots_json",
        params![
            ticket.id,
            ticket.title,
            ticket.description,
            ticket.reproduction_steps,
            ticket.resolution_steps,
            ticket.category.as_str(),
            ticket.priority.as_str(),
            ticket.status.as_str(),
            ticket.assigned_to,
            ticket.assigned_to_name,
            ticket.created_by,
            ticket.created_by_name,
            format_instant(ticket.created_at),
            format_instant(ticket.updated_at),
            ticket.resolved_at.map(format_instant),
            ticket.resolved_by,
            ticket.resolved_by_name,
            screenshots_json,
        ],
    )?;
    Ok(())
}

/// [`upsert_ticket_row`] plus replacing the stored comment thread with
/// `ticket.comments`. Every comment is filed under `ticket.id` whatever its
/// own `ticket_id` says. Run it inside a transaction.
pub fn upsert_ticket(conn: &Connection, ticket: &Ticket) -> Result<(), rusqlite::Error> {
    upsert_ticket_row(conn, ticket)?;

    conn.execute(
        "DELETE FROM ticket_comments WHERE ticket_id = ?1",
        params![ticket.id],
    )?;
    for comment in &ticket.comments {
        if comment.ticket_id != ticket.id {
            log::warn!(
                "Comment {} names ticket {}; filing it under {}",
                comment.id,
                comment.ticket_id,
                ticket.id
            );
            let mut comment = comment.clone();
            comment.ticket_id = ticket.id.clone();
            insert_comment(conn, &comment)?;
        } else {
            insert_comment(conn, comment)?;
        }
    }
    Ok(())
}

pub fn get_ticket(conn: &Connection, ticket_id: &str) -> Result<Option<Ticket>, rusqlite::Error> {
    let ticket = conn
        .query_row(
            &format!("SELECT {TICKET_COLUMNS} FROM tickets t WHERE t.ticket_id = ?1"),
            params![ticket_id],
            ticket_from_row,
        )
        .optional()?;

    match ticket {
        Some(mut t) => {
            t.comments = list_comments(conn, &t.id)?;
            Ok(Some(t))
        }
        None => Ok(None),
    }
}

/// Every ticket in insertion order, each with its comment thread.
pub fn list_tickets(conn: &Connection) -> Result<Vec<Ticket>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("SELECT {TICKET_COLUMNS} FROM tickets t ORDER BY t.rowid"))?;
    let tickets: Vec<Ticket> = stmt
        .query_map([], ticket_from_row)?
        .collect::<Result<_, _>>()?;
    attach_comments(conn, tickets)
}

/// Fill in comment threads for tickets loaded without them.
pub(crate) fn attach_comments(
    conn: &Connection,
    mut tickets: Vec<Ticket>,
) -> Result<Vec<Ticket>, rusqlite::Error> {
    if tickets.is_empty() {
        return Ok(tickets);
    }

    let mut by_ticket: HashMap<String, Vec<TicketComment>> = HashMap::new();
    let mut stmt = conn.prepare(
        "SELECT comment_id, ticket_id, user_id, user_name, content, created_at
         FROM ticket_comments ORDER BY rowid",
    )?;
    let rows = stmt.query_map([], comment_from_row)?;
    for comment in rows {
        let comment = comment?;
        by_ticket
            .entry(comment.ticket_id.clone())
            .or_default()
            .push(comment);
    }

    for ticket in &mut tickets {
        if let Some(comments) = by_ticket.remove(&ticket.id) {
            ticket.comments = comments;
        }
    }
    Ok(tickets)
}

/// Ticket counts keyed by raw status label.
pub fn count_tickets_by_status(conn: &Connection) -> Result<Vec<(String, u64)>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT status, COUNT(*) FROM tickets GROUP BY status ORDER BY status")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?;
    rows.collect()
}

// ── Comments ───────────────────────────────────────────────────────

fn comment_from_row(row: &Row) -> Result<TicketComment, rusqlite::Error> {
    Ok(TicketComment {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        user_id: row.get(2)?,
        user_name: row.get(3)?,
        content: row.get(4)?,
        created_at: get_instant(row, 5)?,
    })
}

pub fn insert_comment(conn: &Connection, comment: &TicketComment) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO ticket_comments (comment_id, ticket_id, user_id, user_name, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            comment.id,
            comment.ticket_id,
            comment.user_id,
            comment.user_name,
            comment.content,
            format_instant(comment.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_comments(
    conn: &Connection,
    ticket_id: &str,
) -> Result<Vec<TicketComment>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT comment_id, ticket_id, user_id, user_name, content, created_at
         FROM ticket_comments WHERE ticket_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![ticket_id], comment_from_row)?;
    rows.collect()
}

pub fn touch_ticket(
    conn: &Connection,
    ticket_id: &str,
    updated_at: DateTime<Utc>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE tickets SET updated_at = ?2 WHERE ticket_id = ?1",
        params![ticket_id, format_instant(updated_at)],
    )?;
    Ok(())
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}
