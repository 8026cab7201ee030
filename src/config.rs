use std::collections::HashSet;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Front desk engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// General settings
    pub general: GeneralConfig,

    /// Routing configuration
    pub routing: RoutingConfig,

    /// Callback automation configuration
    pub callbacks: CallbackConfig,

    /// Business hours window
    pub business_hours: BusinessHoursConfig,

    /// Customer number lists
    pub customers: CustomerConfig,

    /// Persistence configuration
    pub database: DatabaseConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Restaurant name used in customer-facing SMS templates
    pub restaurant_name: String,
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Enable skills-based routing (disabled routes everything to the AI fallback)
    pub enabled: bool,

    /// Maximum wait in the routing queue before AI fallback (seconds)
    pub max_wait_time_seconds: u64,

    /// Average call length used for wait estimates (seconds)
    pub average_call_seconds: u64,

    /// Routing queue reconciliation interval (seconds)
    pub tick_seconds: u64,
}

/// Callback automation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Enable automatic callbacks for missed calls
    pub auto_callback_enabled: bool,

    /// Enable SMS notifications for missed calls
    pub sms_notifications_enabled: bool,

    /// Delay before the first callback attempt (minutes)
    pub callback_delay_minutes: u64,

    /// Delay before the missed-call SMS notice (minutes)
    pub sms_delay_minutes: u64,

    /// Maximum callback attempts before giving up
    pub max_callback_attempts: u32,

    /// Backoff step between retries, multiplied by the attempt count (minutes)
    pub retry_backoff_minutes: u64,

    /// Fast-path delay for high-priority numbers during business hours (seconds)
    pub priority_callback_delay_seconds: u64,

    /// Callback queue processing interval (seconds)
    pub tick_seconds: u64,
}

/// Business hours window, naive local `HH:MM` strings
///
/// No timezone normalization is applied; the engine's clock is expected to
/// run in restaurant-local time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHoursConfig {
    /// Opening time, e.g. "08:00"
    pub start: String,

    /// Closing time, e.g. "22:00"
    pub end: String,
}

/// Customer phone number lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerConfig {
    /// VIP numbers: priority routing and immediate callbacks
    pub priority_numbers: HashSet<String>,

    /// Numbers that never get a callback
    pub blacklisted_numbers: HashSet<String>,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Sqlite path, ":memory:" for in-memory, None to disable persistence
    pub path: Option<String>,

    /// Snapshot write interval (seconds)
    pub persist_interval_seconds: u64,

    /// Maximum database connections
    pub max_connections: u32,
}

impl BusinessHoursConfig {
    /// Parsed opening time
    pub fn open_time(&self) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(&self.start, "%H:%M")
            .map_err(|e| format!("invalid business_hours.start '{}': {}", self.start, e))
    }

    /// Parsed closing time
    pub fn close_time(&self) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(&self.end, "%H:%M")
            .map_err(|e| format!("invalid business_hours.end '{}': {}", self.end, e))
    }
}

impl EngineConfig {
    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), String> {
        if self.general.restaurant_name.is_empty() {
            return Err("restaurant_name cannot be empty".to_string());
        }

        if self.routing.max_wait_time_seconds == 0 {
            return Err("max_wait_time_seconds must be greater than 0".to_string());
        }

        if self.routing.average_call_seconds == 0 {
            return Err("average_call_seconds must be greater than 0".to_string());
        }

        if self.routing.tick_seconds == 0 || self.callbacks.tick_seconds == 0 {
            return Err("tick intervals must be greater than 0".to_string());
        }

        if self.callbacks.max_callback_attempts == 0 {
            return Err("max_callback_attempts must be greater than 0".to_string());
        }

        if self.callbacks.max_callback_attempts > 10 {
            return Err("max_callback_attempts cannot exceed 10".to_string());
        }

        let open = self.business_hours.open_time()?;
        let close = self.business_hours.close_time()?;
        if open >= close {
            return Err("business_hours.start must be before business_hours.end".to_string());
        }

        if self.database.persist_interval_seconds == 0 {
            return Err("persist_interval_seconds must be greater than 0".to_string());
        }

        if self.database.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            routing: RoutingConfig::default(),
            callbacks: CallbackConfig::default(),
            business_hours: BusinessHoursConfig::default(),
            customers: CustomerConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            restaurant_name: "Bella Vista Restaurant".to_string(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_wait_time_seconds: 180, // 3 minutes max wait before fallback
            average_call_seconds: 180,
            tick_seconds: 10,
        }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            auto_callback_enabled: true,
            sms_notifications_enabled: true,
            callback_delay_minutes: 5,
            sms_delay_minutes: 2,
            max_callback_attempts: 3,
            retry_backoff_minutes: 15,
            priority_callback_delay_seconds: 30,
            tick_seconds: 60,
        }
    }
}

impl Default for BusinessHoursConfig {
    fn default() -> Self {
        Self {
            start: "08:00".to_string(),
            end: "22:00".to_string(),
        }
    }
}

impl Default for CustomerConfig {
    fn default() -> Self {
        Self {
            priority_numbers: HashSet::new(),
            blacklisted_numbers: HashSet::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            persist_interval_seconds: 60,
            max_connections: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_business_hours() {
        let mut config = EngineConfig::default();
        config.business_hours.start = "25:99".to_string();
        assert!(config.validate().is_err());

        config.business_hours.start = "23:00".to_string();
        config.business_hours.end = "08:00".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_attempts() {
        let mut config = EngineConfig::default();
        config.callbacks.max_callback_attempts = 0;
        assert!(config.validate().is_err());
    }
}
