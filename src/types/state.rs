use std::fmt;

/// Lifecycle state of the collection service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServiceState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ServiceState {
    pub fn is_running(self) -> bool {
        self == ServiceState::Running
    }

    /// Stop is meaningful only while something may still be live.
    pub fn can_stop(self) -> bool {
        matches!(self, ServiceState::Running | ServiceState::Starting)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Stopped => "Stopped",
            ServiceState::Starting => "Starting",
            ServiceState::Running => "Running",
            ServiceState::Stopping => "Stopping",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_stopped() {
        assert_eq!(ServiceState::default(), ServiceState::Stopped);
        assert!(!ServiceState::default().can_stop());
    }
}
