//! Global safety state and its transition table.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use crate::error::{ControlError, ControlResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SafetyState {
    #[default]
    Idle,
    Running,
    Purging,
    EmergencyStopped,
}

impl SafetyState {
    /// Allowed moves:
    /// - Idle -> Running | Purging
    /// - Running -> Purging
    /// - Purging -> Idle
    /// - EmergencyStopped -> Idle (manual reset)
    /// - anything -> EmergencyStopped
    pub fn can_transition_to(self, to: SafetyState) -> bool {
        use SafetyState::*;
        matches!(
            (self, to),
            (Idle, Running)
                | (Idle, Purging)
                | (Running, Purging)
                | (Purging, Idle)
                | (EmergencyStopped, Idle)
                | (_, EmergencyStopped)
        )
    }

    /// Whether ordinary setpoint commands are accepted.
    pub fn permits_commands(self) -> bool {
        matches!(self, SafetyState::Idle | SafetyState::Running)
    }
}

impl fmt::Display for SafetyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SafetyState::Idle => "Idle",
            SafetyState::Running => "Running",
            SafetyState::Purging => "Purging",
            SafetyState::EmergencyStopped => "EmergencyStopped",
        };
        f.write_str(s)
    }
}

/// Shared cell holding the current [`SafetyState`].
///
/// Backed by a watch channel so long-running sequences (purge hold) can
/// wake up the moment an emergency stop lands.
#[derive(Debug)]
pub struct SafetyGate {
    tx: watch::Sender<SafetyState>,
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SafetyState::Idle);
        Self { tx }
    }

    pub fn current(&self) -> SafetyState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SafetyState> {
        self.tx.subscribe()
    }

    /// Move to `to` if the table allows it from the current state.
    pub fn transition(&self, to: SafetyState) -> ControlResult<SafetyState> {
        let mut outcome = Err(ControlError::InvalidTransition {
            from: self.current(),
            to,
        });
        self.tx.send_if_modified(|state| {
            let from = *state;
            if !from.can_transition_to(to) {
                outcome = Err(ControlError::InvalidTransition { from, to });
                return false;
            }
            *state = to;
            outcome = Ok(from);
            from != to
        });
        if let Ok(from) = outcome {
            info!(%from, %to, "safety state changed");
        }
        outcome
    }

    /// Move `from` -> `to` only if the state is still `from`.
    ///
    /// Sequences that finish on their own (purge) use this so a concurrent
    /// emergency stop is never overwritten.
    pub fn transition_from(&self, from: SafetyState, to: SafetyState) -> ControlResult<()> {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|state| {
            if *state != from || !from.can_transition_to(to) {
                outcome = Err(ControlError::InvalidTransition { from: *state, to });
                return false;
            }
            *state = to;
            from != to
        });
        if outcome.is_ok() {
            info!(%from, %to, "safety state changed");
        }
        outcome
    }

    /// Fail with `Interlocked` unless commands are accepted right now.
    pub fn ensure_commands_allowed(&self, action: &'static str) -> ControlResult<()> {
        let state = self.current();
        if state.permits_commands() {
            Ok(())
        } else {
            Err(ControlError::Interlocked { state, action })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SafetyState::*;

    #[test]
    fn transition_table() {
        assert!(Idle.can_transition_to(Running));
        assert!(Idle.can_transition_to(Purging));
        assert!(Running.can_transition_to(Purging));
        assert!(Purging.can_transition_to(Idle));
        assert!(EmergencyStopped.can_transition_to(Idle));
        for s in [Idle, Running, Purging, EmergencyStopped] {
            assert!(s.can_transition_to(EmergencyStopped));
        }

        assert!(!Running.can_transition_to(Idle));
        assert!(!EmergencyStopped.can_transition_to(Running));
        assert!(!Purging.can_transition_to(Running));
    }

    #[test]
    fn gate_rejects_illegal_moves() {
        let gate = SafetyGate::new();
        assert_eq!(gate.transition(Running).unwrap(), Idle);
        let err = gate.transition(Idle).unwrap_err();
        assert_eq!(err, ControlError::InvalidTransition { from: Running, to: Idle });
        assert_eq!(gate.current(), Running);
    }

    #[tokio::test]
    async fn subscribers_see_emergency_stop() {
        let gate = SafetyGate::new();
        let mut rx = gate.subscribe();
        gate.transition(EmergencyStopped).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), EmergencyStopped);
    }

    #[test]
    fn conditional_move_keeps_an_emergency_stop() {
        let gate = SafetyGate::new();
        gate.transition(Purging).unwrap();
        gate.transition(EmergencyStopped).unwrap();

        let err = gate.transition_from(Purging, Idle).unwrap_err();
        assert_eq!(err, ControlError::InvalidTransition { from: EmergencyStopped, to: Idle });
        assert_eq!(gate.current(), EmergencyStopped);

        let gate = SafetyGate::new();
        gate.transition(Purging).unwrap();
        gate.transition_from(Purging, Idle).unwrap();
        assert_eq!(gate.current(), Idle);
    }

    #[test]
    fn interlock_outside_idle_and_running() {
        let gate = SafetyGate::new();
        assert!(gate.ensure_commands_allowed("set flow").is_ok());
        gate.transition(Purging).unwrap();
        assert!(matches!(
            gate.ensure_commands_allowed("set flow"),
            Err(ControlError::Interlocked { state: Purging, .. })
        ));
    }
}
