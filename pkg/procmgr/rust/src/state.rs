// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;

/// Runtime state of a supervised process, written by the supervisor and read
/// by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    /// Entity exists, nothing has been started for it.
    #[default]
    Created,
    /// Child process is alive.
    Running,
    /// Exited with code 0.
    Exited,
    /// Exited with non-zero code or signal, or could not be spawned.
    Failed,
    /// Stopped by a `remove` command or supervisor shutdown.
    Stopped,
}

impl ProcessState {
    /// Only a running process needs an explicit `remove` when it is orphaned.
    pub fn is_alive(self) -> bool {
        self == ProcessState::Running
    }

    pub(crate) fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (Created, Running)
                | (Created, Failed)
                | (Running, Exited)
                | (Running, Failed)
                | (Running, Stopped)
                | (Exited, Running)
                | (Exited, Failed)
                | (Failed, Running)
                | (Failed, Failed)
                | (Stopped, Running)
                | (Stopped, Failed)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Created => write!(f, "created"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Exited => write!(f, "exited"),
            ProcessState::Failed => write!(f, "failed"),
            ProcessState::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ProcessState::*;

    #[test]
    fn test_only_running_is_alive() {
        assert!(Running.is_alive());
        for state in [Created, Exited, Failed, Stopped] {
            assert!(!state.is_alive(), "{state} should not be alive");
        }
    }

    #[test]
    fn test_transitions() {
        assert!(Created.can_transition_to(Running));
        assert!(Created.can_transition_to(Failed));
        assert!(Running.can_transition_to(Stopped));
        assert!(Stopped.can_transition_to(Running));

        assert!(!Created.can_transition_to(Stopped));
        assert!(!Created.can_transition_to(Exited));
        assert!(!Running.can_transition_to(Running));
        assert!(!Exited.can_transition_to(Stopped));
    }

    #[test]
    fn test_display() {
        assert_eq!(Created.to_string(), "created");
        assert_eq!(Stopped.to_string(), "stopped");
    }
}
