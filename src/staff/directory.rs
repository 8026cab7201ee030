//! Shared staff directory with availability and capacity queries.
//!
//! The directory is shared-read between the routing engine and the callback
//! scheduler; call counts are mutated only through the routing engine's
//! capacity accounting and availability only through the external
//! availability-changed event.

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};

use super::{Availability, StaffMember};

/// Staff directory
pub struct StaffDirectory {
    members: DashMap<String, StaffMember>,
}

/// Directory-wide counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffStats {
    pub total: usize,
    pub available: usize,
    pub busy: usize,
    pub offline: usize,
}

impl StaffDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self {
            members: DashMap::new(),
        }
    }

    /// Directory pre-populated with the standard restaurant roster
    pub fn with_default_roster() -> Self {
        let directory = Self::new();
        directory.add(StaffMember::new(
            "manager_1",
            "Sarah Chen",
            "Restaurant Manager",
            &[
                "complaints",
                "reservations",
                "management",
                "special_events",
                "vip_service",
            ],
            2,
            9,
        ));
        directory.add(StaffMember::new(
            "reservation_specialist_1",
            "Maria Rodriguez",
            "Reservation Specialist",
            &["reservations", "customer_service", "special_events"],
            3,
            7,
        ));
        directory.add(StaffMember::new(
            "host_1",
            "James Wilson",
            "Host",
            &["reservations", "general_inquiries", "customer_service"],
            2,
            5,
        ));
        directory.add(StaffMember::new(
            "server_lead",
            "Emily Davis",
            "Lead Server",
            &["orders", "menu_questions", "customer_service"],
            2,
            6,
        ));
        directory
    }

    /// Add or replace a staff member
    pub fn add(&self, member: StaffMember) {
        info!("👤 Staff registered: {} ({})", member.name, member.title);
        self.members.insert(member.id.clone(), member);
    }

    /// Look up a staff member by id
    pub fn get(&self, staff_id: &str) -> Option<StaffMember> {
        self.members.get(staff_id).map(|m| m.clone())
    }

    /// All staff members
    pub fn all(&self) -> Vec<StaffMember> {
        self.members.iter().map(|m| m.clone()).collect()
    }

    /// Update a member's availability.
    ///
    /// Unknown staff ids are a logged no-op. Returns true when the member
    /// transitioned into `Available` (the caller should wake the queue
    /// processor so freed staff are used before the next tick).
    pub fn set_availability(&self, staff_id: &str, availability: Availability) -> bool {
        match self.members.get_mut(staff_id) {
            Some(mut member) => {
                let became_available =
                    availability == Availability::Available && member.availability != availability;
                member.availability = availability;
                info!("👤 {} is now {}", member.name, availability);
                became_available
            }
            None => {
                warn!("👤 Availability change for unknown staff id: {}", staff_id);
                false
            }
        }
    }

    /// Members that are available and hold every required skill
    pub fn candidates(&self, required_skills: &[String]) -> Vec<StaffMember> {
        self.members
            .iter()
            .filter(|m| m.is_available() && m.has_skills(required_skills))
            .map(|m| m.clone())
            .collect()
    }

    /// Number of members currently available for calls
    pub fn available_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_available()).count()
    }

    /// Charge one call against a member's capacity.
    ///
    /// Only the routing engine calls this, right after a capacity check.
    pub(crate) fn begin_call(&self, staff_id: &str) -> Result<()> {
        match self.members.get_mut(staff_id) {
            Some(mut member) => {
                if member.current_calls >= member.max_concurrent_calls {
                    return Err(EngineError::staff(format!(
                        "{} is already at capacity ({}/{})",
                        member.name, member.current_calls, member.max_concurrent_calls
                    )));
                }
                member.current_calls += 1;
                debug!(
                    "📈 {} call count: {}/{}",
                    member.name, member.current_calls, member.max_concurrent_calls
                );
                Ok(())
            }
            None => Err(EngineError::not_found(format!(
                "Staff not found: {}",
                staff_id
            ))),
        }
    }

    /// Release one call from a member's capacity, flooring at zero.
    pub(crate) fn end_call(&self, staff_id: &str) {
        match self.members.get_mut(staff_id) {
            Some(mut member) => {
                member.current_calls = member.current_calls.saturating_sub(1);
                debug!(
                    "📉 {} call count: {}/{}",
                    member.name, member.current_calls, member.max_concurrent_calls
                );
            }
            None => warn!("📉 Call ended for unknown staff id: {}", staff_id),
        }
    }

    /// Directory statistics
    pub fn stats(&self) -> StaffStats {
        let mut stats = StaffStats {
            total: 0,
            available: 0,
            busy: 0,
            offline: 0,
        };
        for member in self.members.iter() {
            stats.total += 1;
            match member.availability {
                Availability::Available => stats.available += 1,
                Availability::Busy | Availability::Break => stats.busy += 1,
                Availability::Offline => stats.offline += 1,
            }
        }
        stats
    }
}

impl Default for StaffDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skilled(id: &str, skills: &[&str], max_calls: u32) -> StaffMember {
        StaffMember::new(id, id, "Host", skills, max_calls, 5)
    }

    #[test]
    fn availability_requires_capacity() {
        let directory = StaffDirectory::new();
        directory.add(skilled("host_1", &["reservations"], 1));

        assert_eq!(directory.available_count(), 1);
        directory.begin_call("host_1").unwrap();
        assert_eq!(directory.available_count(), 0);

        // At capacity, a further charge is an error
        assert!(directory.begin_call("host_1").is_err());

        directory.end_call("host_1");
        assert_eq!(directory.available_count(), 1);
    }

    #[test]
    fn end_call_floors_at_zero() {
        let directory = StaffDirectory::new();
        directory.add(skilled("host_1", &["reservations"], 2));

        directory.end_call("host_1");
        assert_eq!(directory.get("host_1").unwrap().current_calls, 0);
    }

    #[test]
    fn unknown_staff_is_a_noop() {
        let directory = StaffDirectory::new();
        assert!(!directory.set_availability("ghost", Availability::Available));
        directory.end_call("ghost");
    }

    #[test]
    fn candidates_filter_on_skills_and_state() {
        let directory = StaffDirectory::new();
        directory.add(skilled("host_1", &["reservations"], 1));
        directory.add(skilled("server_1", &["orders"], 1));

        let required = vec!["reservations".to_string()];
        let found = directory.candidates(&required);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "host_1");

        directory.set_availability("host_1", Availability::Break);
        assert!(directory.candidates(&required).is_empty());
    }

    #[test]
    fn became_available_signal() {
        let directory = StaffDirectory::new();
        directory.add(skilled("host_1", &["reservations"], 1));

        assert!(!directory.set_availability("host_1", Availability::Available));
        directory.set_availability("host_1", Availability::Break);
        assert!(directory.set_availability("host_1", Availability::Available));
    }
}
