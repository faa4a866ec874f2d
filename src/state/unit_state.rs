/// Retry state machine for a single unit of work
///
/// A unit starts `Pending`, moves to `Attempting` for its first try and then
/// either succeeds, is retried (`Attempting` again) or gives up (`Exhausted`).
use crate::HarvestError;
use std::fmt;

/// Represents the current state of a unit of work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UnitState {
    /// Unit has been built but no worker was spawned yet
    #[default]
    Pending,

    /// A worker is running (or about to run) an attempt
    Attempting,

    // ===== Terminal States =====
    /// An attempt completed and reported success
    Succeeded,

    /// Every configured attempt failed
    Exhausted,
}

impl UnitState {
    /// Returns true if no further attempts will be made
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Checks whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: UnitState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Attempting)
                | (Self::Attempting, Self::Attempting)
                | (Self::Attempting, Self::Succeeded)
                | (Self::Attempting, Self::Exhausted)
        )
    }

    /// Performs a transition, rejecting illegal ones
    pub fn transition(&mut self, next: UnitState) -> Result<(), HarvestError> {
        if !self.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    /// Returns the lowercase label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Attempting => "attempting",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
