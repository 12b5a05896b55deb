// src/supervisor/state.rs

//! Pure lifecycle state machine.
//!
//! Holds the single authoritative [`LifecycleState`] and decides whether a
//! requested transition is legal. No channels, no Tokio, no processes: the
//! control task owns one of these and publishes every accepted change.

use crate::types::LifecycleState;

/// Result of asking the state machine to move to a new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state changed and observers must be told.
    Changed {
        from: LifecycleState,
        to: LifecycleState,
    },
    /// Already in the requested state. Nothing to publish.
    Unchanged,
    /// Not an edge of the lifecycle graph; the state was left alone.
    Rejected {
        from: LifecycleState,
        to: LifecycleState,
    },
}

#[derive(Debug, Default)]
pub struct StateMachine {
    state: LifecycleState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Move to `to` if that is a legal edge.
    ///
    /// Repeating the current state is a no-op, which makes a second
    /// `Stopped` report harmless.
    pub fn transition(&mut self, to: LifecycleState) -> Transition {
        let from = self.state;
        if from == to {
            return Transition::Unchanged;
        }
        if !from.can_transition_to(to) {
            return Transition::Rejected { from, to };
        }
        self.state = to;
        Transition::Changed { from, to }
    }
}
