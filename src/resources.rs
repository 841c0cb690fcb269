//! Resource and action names understood by the dashboard backend.
//!
//! The gateway itself treats these as opaque strings; the typed forms exist
//! so callers and the cache can tell reads from writes.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Students,
    Payments,
    Attendance,
    Contacts,
    Events,
    Groups,
    StudentGroups,
    Dashboard,
    Other(String),
}

impl Resource {
    pub fn as_str(&self) -> &str {
        match self {
            Resource::Students => "students",
            Resource::Payments => "payments",
            Resource::Attendance => "attendance",
            Resource::Contacts => "contacts",
            Resource::Events => "events",
            Resource::Groups => "groups",
            Resource::StudentGroups => "student_groups",
            Resource::Dashboard => "dashboard",
            Resource::Other(s) => s,
        }
    }
}

impl From<&str> for Resource {
    fn from(s: &str) -> Self {
        match s {
            "students" => Resource::Students,
            "payments" => Resource::Payments,
            "attendance" => Resource::Attendance,
            "contacts" => Resource::Contacts,
            "events" => Resource::Events,
            "groups" => Resource::Groups,
            "student_groups" => Resource::StudentGroups,
            "dashboard" => Resource::Dashboard,
            other => Resource::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    Create,
    Update,
    Delete,
    Summary,
    Overdue,
    MarkPaid,
    GroupStudents,
    SaveGroup,
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::List => "list",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Summary => "summary",
            Action::Overdue => "overdue",
            Action::MarkPaid => "mark_paid",
            Action::GroupStudents => "group_students",
            Action::SaveGroup => "save_group",
            Action::Other(s) => s,
        }
    }

    /// Actions that change backend state. Unknown actions count as writes so
    /// they are never served from cache.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Action::Create
                | Action::Update
                | Action::Delete
                | Action::MarkPaid
                | Action::SaveGroup
                | Action::Other(_)
        )
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        match s {
            "list" => Action::List,
            "create" => Action::Create,
            "update" => Action::Update,
            "delete" => Action::Delete,
            "summary" => Action::Summary,
            "overdue" => Action::Overdue,
            "mark_paid" => Action::MarkPaid,
            "group_students" => Action::GroupStudents,
            "save_group" => Action::SaveGroup,
            other => Action::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for name in ["students", "student_groups", "dashboard", "ledger"] {
            assert_eq!(Resource::from(name).as_str(), name);
        }
        for name in ["list", "mark_paid", "group_students", "archive"] {
            assert_eq!(Action::from(name).as_str(), name);
        }
    }

    #[test]
    fn test_write_actions() {
        assert!(Action::from("create").is_write());
        assert!(Action::from("save_group").is_write());
        assert!(Action::from("archive").is_write());
        assert!(!Action::from("list").is_write());
        assert!(!Action::from("summary").is_write());
        assert!(!Action::from("group_students").is_write());
    }
}
