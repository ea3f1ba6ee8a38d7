use chrono::{DateTime, Utc};
use rusqlite::Connection;

use super::repository;
use crate::model::{Role, User};

/// The accounts every fresh helpdesk starts with.
pub fn default_users(created_at: DateTime<Utc>) -> Vec<User> {
    [
        ("admin-1", "admin@company.com", "IT Administrator", Role::ItAdmin, "Information Technology"),
        ("tech-1", "tech@company.com", "Tech Support", Role::TechSupport, "IT Support"),
        ("dev-1", "dev@company.com", "Developer", Role::Developer, "Engineering"),
        ("employee-1", "employee@company.com", "John Employee", Role::Employee, "Sales"),
    ]
    .into_iter()
    .map(|(id, email, name, role, department)| User {
        id: id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        role,
        department: Some(department.to_string()),
        created_at,
    })
    .collect()
}

/// Insert the default accounts if the user directory is empty.
/// Returns how many users were inserted.
pub fn ensure_default_users(
    conn: &Connection,
    created_at: DateTime<Utc>,
) -> Result<usize, rusqlite::Error> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    if existing > 0 {
        return Ok(0);
    }

    let users = default_users(created_at);
    for user in &users {
        repository::insert_user(conn, user)?;
    }
    Ok(users.len())
}
