use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::kernel::error::{Error, Result};

/// Lifecycle state of a loaded service
///
/// ```text
/// STOPPED -> STARTING -> RUNNING -> STOPPING -> STOPPED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ServiceState {
    /// Start conditions are being evaluated and the service object created
    Starting,
    /// The service object exists and can be used
    Running,
    /// Stop conditions are being evaluated and the service object destroyed
    Stopping,
    /// No service object exists
    Stopped,
}

impl ServiceState {
    pub const ALL: [ServiceState; 4] = [
        ServiceState::Starting,
        ServiceState::Running,
        ServiceState::Stopping,
        ServiceState::Stopped,
    ];

    /// Canonical upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            ServiceState::Starting => "STARTING",
            ServiceState::Running => "RUNNING",
            ServiceState::Stopping => "STOPPING",
            ServiceState::Stopped => "STOPPED",
        }
    }

    /// Stable integer code, as exposed to management tooling
    pub fn to_code(&self) -> u8 {
        match self {
            ServiceState::Starting => 0,
            ServiceState::Running => 1,
            ServiceState::Stopping => 2,
            ServiceState::Stopped => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        ServiceState::ALL.into_iter().find(|state| state.to_code() == code)
    }

    /// Case-insensitive parse of a state name
    pub fn parse(name: &str) -> Result<Self> {
        ServiceState::ALL
            .into_iter()
            .find(|state| state.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| Error::Other(format!("Unknown service state: {}", name)))
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ServiceState::Running)
    }

    /// STARTING or RUNNING
    pub fn is_started(&self) -> bool {
        matches!(self, ServiceState::Starting | ServiceState::Running)
    }

    /// STOPPING or STOPPED
    pub fn is_stopped(&self) -> bool {
        matches!(self, ServiceState::Stopping | ServiceState::Stopped)
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        ServiceState::Stopped
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServiceState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ServiceState::parse(s)
    }
}

impl TryFrom<String> for ServiceState {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        ServiceState::parse(&value)
    }
}

impl From<ServiceState> for String {
    fn from(state: ServiceState) -> Self {
        state.name().to_string()
    }
}
