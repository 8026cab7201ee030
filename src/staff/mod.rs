//! Staff members and the shared staff directory.

pub mod directory;

pub use directory::{StaffDirectory, StaffStats};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Staff availability state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Available for calls
    Available,

    /// On a call or otherwise occupied
    Busy,

    /// Not logged in
    Offline,

    /// On break
    Break,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Availability::Available => "available",
            Availability::Busy => "busy",
            Availability::Offline => "offline",
            Availability::Break => "break",
        };
        write!(f, "{}", s)
    }
}

/// A staff member and their routing attributes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: String,
    pub name: String,
    pub title: String,
    pub skills: HashSet<String>,
    pub availability: Availability,
    pub current_calls: u32,
    pub max_concurrent_calls: u32,
    /// Base routing priority; higher wins
    pub priority: i32,
}

impl StaffMember {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        title: impl Into<String>,
        skills: &[&str],
        max_concurrent_calls: u32,
        priority: i32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            title: title.into(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            availability: Availability::Available,
            current_calls: 0,
            max_concurrent_calls,
            priority,
        }
    }

    /// Available and under capacity
    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
            && self.current_calls < self.max_concurrent_calls
    }

    /// Whether this member has every required skill
    pub fn has_skills(&self, required: &[String]) -> bool {
        required.iter().all(|skill| self.skills.contains(skill))
    }
}
