//! Task state and location types
//!
//! A task is in exactly one place at a time: a ready queue, a sleep queue,
//! a channel's wait list, another task's join list, the terminated queue,
//! or running on a worker. `Location` names that place; `TaskState` is
//! the coarse view derived from it.

use std::time::Instant;

use crate::id::TaskId;

/// Coarse lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Runnable, linked on a ready queue
    Ready = 0,

    /// Executing on a worker
    Running = 1,

    /// Blocked on a channel, a join, or a wait without deadline
    Waiting = 2,

    /// Blocked with a deadline (sleep, or alt with deadline)
    Sleeping = 3,

    /// Entry returned; waiting for its stack to be reclaimed
    Terminated = 4,
}

impl TaskState {
    #[inline]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, TaskState::Terminated)
    }
}

/// Where a task currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Created, not yet handed to a scheduler
    Unscheduled,
    /// Linked on a ready or remote queue
    Ready,
    /// Executing on a worker
    Running,
    /// Sleeping; linked on a sleep queue unless the deadline is unbounded
    Sleeping { deadline: Option<Instant> },
    /// Linked on another task's join list
    Joining { target: TaskId },
    /// Pending on a channel's ends queue
    ChannelWait,
    /// Parked in an alt; linked on the alt-sleep queue when a deadline is set
    AltParked { deadline: Option<Instant> },
    /// Linked on the terminated queue
    Terminated,
}

impl Location {
    pub const fn state(&self) -> TaskState {
        match self {
            Location::Unscheduled | Location::Ready => TaskState::Ready,
            Location::Running => TaskState::Running,
            Location::Joining { .. } | Location::ChannelWait => TaskState::Waiting,
            Location::Sleeping { deadline: None } | Location::AltParked { deadline: None } => {
                TaskState::Waiting
            }
            Location::Sleeping { deadline: Some(_) } | Location::AltParked { deadline: Some(_) } => {
                TaskState::Sleeping
            }
            Location::Terminated => TaskState::Terminated,
        }
    }

    /// True for every location a wakeup may move out of
    #[inline]
    pub const fn is_blocked(&self) -> bool {
        matches!(
            self,
            Location::Sleeping { .. }
                | Location::Joining { .. }
                | Location::ChannelWait
                | Location::AltParked { .. }
        )
    }

    /// Whether `self -> next` is a legal move.
    pub const fn can_move_to(&self, next: &Location) -> bool {
        match (self, next) {
            (Location::Unscheduled, Location::Ready) => true,
            (Location::Ready, Location::Running) => true,
            (Location::Running, Location::Running) => false,
            (Location::Running, Location::Unscheduled) => false,
            (Location::Running, _) => true,
            // an alt whose branch fired while it was still enabling
            (Location::AltParked { .. }, Location::Running) => true,
            (from, Location::Ready) => from.is_blocked(),
            _ => false,
        }
    }

    /// Move to `next`, or report the illegal pair.
    pub fn transition(&mut self, next: Location) -> Result<Location, IllegalTransition> {
        if !self.can_move_to(&next) {
            return Err(IllegalTransition { from: *self, to: next });
        }
        let prev = *self;
        *self = next;
        Ok(prev)
    }
}

/// A move the lifecycle does not allow (double termination, resuming a
/// queued task, leaving `Terminated`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal task transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: Location,
    pub to: Location,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_path() {
        let mut loc = Location::Unscheduled;
        loc.transition(Location::Ready).unwrap();
        loc.transition(Location::Running).unwrap();
        loc.transition(Location::ChannelWait).unwrap();
        assert_eq!(loc.state(), TaskState::Waiting);
        loc.transition(Location::Ready).unwrap();
        loc.transition(Location::Running).unwrap();
        loc.transition(Location::Terminated).unwrap();
        assert!(loc.state().is_terminated());
    }

    #[test]
    fn test_terminated_is_absorbing() {
        let mut loc = Location::Terminated;
        assert!(loc.transition(Location::Ready).is_err());
        assert!(loc.transition(Location::Terminated).is_err());
        assert!(loc.transition(Location::Running).is_err());
    }

    #[test]
    fn test_cannot_resume_blocked_task() {
        let mut loc = Location::Joining { target: TaskId::from_raw(3) };
        let err = loc.transition(Location::Running).unwrap_err();
        assert_eq!(err.to, Location::Running);
        assert_eq!(loc, Location::Joining { target: TaskId::from_raw(3) });
    }

    #[test]
    fn test_alt_can_cancel_its_park() {
        let mut loc = Location::AltParked { deadline: None };
        loc.transition(Location::Running).unwrap();
        let mut loc = Location::ChannelWait;
        assert!(loc.transition(Location::Running).is_err());
    }

    #[test]
    fn test_ready_not_rewoken() {
        let mut loc = Location::Ready;
        assert!(loc.transition(Location::Ready).is_err());
    }

    #[test]
    fn test_derived_states() {
        let now = Instant::now();
        assert_eq!(Location::Sleeping { deadline: Some(now) }.state(), TaskState::Sleeping);
        assert_eq!(Location::Sleeping { deadline: None }.state(), TaskState::Waiting);
        assert_eq!(Location::AltParked { deadline: Some(now) }.state(), TaskState::Sleeping);
        assert_eq!(Location::AltParked { deadline: None }.state(), TaskState::Waiting);
        assert_eq!(Location::Unscheduled.state(), TaskState::Ready);
    }
}
