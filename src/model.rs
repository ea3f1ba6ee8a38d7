use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::date_util::hours_between;
use crate::error::{Error, Result};

/// Declares a string-labelled enum that keeps unknown labels verbatim.
///
/// Stored and imported records can carry labels this build does not know.
/// Those deserialize into `Unrecognized` instead of failing the whole load;
/// `FromStr` stays strict so user input is still validated.
macro_rules! label_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Unrecognized(String),
        }

        impl $name {
            /// Every known variant, in declaration order.
            pub fn all() -> Vec<$name> {
                vec![$($name::$variant),+]
            }

            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Unrecognized(s) => s,
                }
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                match s.as_str() {
                    $($label => $name::$variant,)+
                    _ => $name::Unrecognized(s),
                }
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String {
                v.as_str().to_string()
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match $name::from(s.trim().to_lowercase()) {
                    $name::Unrecognized(other) => Err(Error::Validation(format!(
                        "unknown {} '{}' (expected one of: {})",
                        stringify!($name).to_lowercase(),
                        other,
                        [$($label),+].join(", ")
                    ))),
                    v => Ok(v),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }
    };
}

label_enum!(
    /// What kind of problem a ticket reports.
    Category {
        Hardware => "hardware",
        Software => "software",
        Network => "network",
        Security => "security",
        Other => "other",
    }
);

label_enum!(
    Priority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
);

label_enum!(
    /// Ticket lifecycle state.
    Status {
        Open => "open",
        InProgress => "in_progress",
        Resolved => "resolved",
        Closed => "closed",
    }
);

label_enum!(
    Role {
        Employee => "employee",
        TechSupport => "tech_support",
        Developer => "developer",
        ItAdmin => "it_admin",
    }
);

impl Role {
    /// Everyone except plain employees works tickets.
    pub fn is_support_staff(&self) -> bool {
        *self != Role::Employee
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketComment {
    pub id: String,
    pub ticket_id: String,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A support ticket with its comment thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reproduction_steps: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_steps: Option<String>,
    pub category: Category,
    pub priority: Priority,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_name: Option<String>,
    pub created_by: String,
    pub created_by_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by_name: Option<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub comments: Vec<TicketComment>,
}

impl Ticket {
    /// Whole hours from creation to resolution.
    ///
    /// `None` unless the ticket is resolved and carries a resolution time.
    pub fn resolution_hours(&self) -> Option<i64> {
        if self.status != Status::Resolved {
            return None;
        }
        self.resolved_at
            .map(|resolved| hours_between(resolved, self.created_at))
    }

    /// Whole hours from creation to the first comment, if any.
    pub fn first_response_hours(&self) -> Option<i64> {
        self.comments
            .first()
            .map(|c| hours_between(c.created_at, self.created_at))
    }

    /// Whether `user` may see this ticket on their ticket list and dashboard.
    pub fn is_visible_to(&self, user: &User) -> bool {
        let assigned_to_user = self.assigned_to.as_deref() == Some(user.id.as_str());
        match user.role {
            Role::Employee => self.created_by == user.id,
            Role::TechSupport => {
                matches!(self.category, Category::Hardware | Category::Network) || assigned_to_user
            }
            Role::Developer => {
                matches!(self.category, Category::Software | Category::Security) || assigned_to_user
            }
            Role::ItAdmin | Role::Unrecognized(_) => true,
        }
    }
}

/// Input for [`crate::HelpDesk::create_ticket`].
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub reproduction_steps: String,
    pub category: Category,
    pub priority: Priority,
    pub created_by: String,
    pub assigned_to: Option<String>,
    pub screenshots: Vec<String>,
}

/// A partial ticket update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct TicketUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    /// `Some(None)` clears the assignee.
    pub assigned_to: Option<Option<String>>,
    pub resolution_steps: Option<String>,
    /// Who performed a transition into resolved.
    pub resolved_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub user_id: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub department: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@company.com"),
            name: id.to_string(),
            role,
            department: None,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn ticket(category: Category, created_by: &str, assigned_to: Option<&str>) -> Ticket {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Ticket {
            id: "ticket-1".into(),
            title: "Printer jam".into(),
            description: String::new(),
            reproduction_steps: String::new(),
            resolution_steps: None,
            category,
            priority: Priority::Medium,
            status: Status::Open,
            assigned_to: assigned_to.map(String::from),
            assigned_to_name: None,
            created_by: created_by.into(),
            created_by_name: created_by.into(),
            created_at: t,
            updated_at: t,
            resolved_at: None,
            resolved_by: None,
            resolved_by_name: None,
            screenshots: vec![],
            comments: vec![],
        }
    }

    #[test]
    fn test_label_round_trip() {
        for s in Status::all() {
            assert_eq!(s.as_str().parse::<Status>().unwrap(), s);
        }
        assert_eq!("In_Progress".parse::<Status>().unwrap(), Status::InProgress);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_unknown_label_is_kept() {
        let p: Priority = serde_json::from_str("\"urgent\"").unwrap();
        assert_eq!(p, Priority::Unrecognized("urgent".into()));
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"urgent\"");
    }

    #[test]
    fn test_ticket_json_uses_camel_case() {
        let t = ticket(Category::Hardware, "employee-1", Some("tech-1"));
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["createdBy"], "employee-1");
        assert_eq!(json["assignedTo"], "tech-1");
        assert_eq!(json["category"], "hardware");
        assert_eq!(json["status"], "open");
        assert!(json.get("resolvedAt").is_none());
    }

    #[test]
    fn test_ticket_deserializes_without_optional_fields() {
        let json = r#"{
            "id": "ticket-9",
            "title": "VPN down",
            "category": "network",
            "priority": "high",
            "status": "in_progress",
            "createdBy": "employee-1",
            "createdByName": "John Employee",
            "createdAt": "2025-01-01T08:00:00.000Z",
            "updatedAt": "2025-01-01T08:00:00.000Z"
        }"#;
        let t: Ticket = serde_json::from_str(json).unwrap();
        assert_eq!(t.status, Status::InProgress);
        assert!(t.comments.is_empty());
        assert!(t.screenshots.is_empty());
    }

    #[test]
    fn test_resolution_hours_requires_resolved_status() {
        let mut t = ticket(Category::Software, "employee-1", None);
        t.resolved_at = Some(t.created_at + Duration::minutes(150));
        assert_eq!(t.resolution_hours(), None);
        t.status = Status::Resolved;
        assert_eq!(t.resolution_hours(), Some(2));
        t.resolved_at = None;
        assert_eq!(t.resolution_hours(), None);
    }

    #[test]
    fn test_first_response_uses_first_comment() {
        let mut t = ticket(Category::Software, "employee-1", None);
        assert_eq!(t.first_response_hours(), None);
        for h in [5, 1] {
            t.comments.push(TicketComment {
                id: format!("c{h}"),
                ticket_id: t.id.clone(),
                user_id: "tech-1".into(),
                user_name: "Tech".into(),
                content: "looking".into(),
                created_at: t.created_at + Duration::hours(h),
            });
        }
        assert_eq!(t.first_response_hours(), Some(5));
    }

    #[test]
    fn test_visibility_by_role() {
        let employee = user("employee-1", Role::Employee);
        let tech = user("tech-1", Role::TechSupport);
        let dev = user("dev-1", Role::Developer);
        let admin = user("admin-1", Role::ItAdmin);

        let hw = ticket(Category::Hardware, "employee-1", None);
        let sw = ticket(Category::Software, "employee-2", Some("tech-1"));
        let other = ticket(Category::Other, "employee-2", None);

        assert!(hw.is_visible_to(&employee));
        assert!(!sw.is_visible_to(&employee));

        assert!(hw.is_visible_to(&tech));
        assert!(sw.is_visible_to(&tech)); // assigned
        assert!(!other.is_visible_to(&tech));

        assert!(!hw.is_visible_to(&dev));
        assert!(sw.is_visible_to(&dev));
        assert!(!other.is_visible_to(&dev));

        assert!(other.is_visible_to(&admin));
    }
}
