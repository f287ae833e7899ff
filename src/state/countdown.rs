use thiserror::Error;

/// Phases of the pre-match countdown of one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    /// No countdown is running.
    Idle,
    /// Announcing the given number; zero is the "starting" announcement.
    Counting(u8),
    /// Countdown finished; the match is being created. Terminal.
    Starting,
}

/// Events that can be applied to a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// Every member is ready; count down from the given number.
    Start {
        /// First number announced.
        from: u8,
    },
    /// One tick interval elapsed.
    Tick,
    /// A member un-readied or left.
    Cancel,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the countdown was in when the invalid event was received.
    pub from: CountdownPhase,
    /// The event that cannot be applied from this phase.
    pub event: CountdownEvent,
}

/// Per-room countdown state machine.
#[derive(Debug, Clone)]
pub struct Countdown {
    phase: CountdownPhase,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Countdown {
    pub fn new() -> Self {
        Self {
            phase: CountdownPhase::Idle,
        }
    }

    pub fn phase(&self) -> CountdownPhase {
        self.phase
    }

    /// Apply `event`, returning the phase entered.
    pub fn apply(&mut self, event: CountdownEvent) -> Result<CountdownPhase, InvalidTransition> {
        let next = compute_transition(self.phase, event)?;
        self.phase = next;
        Ok(next)
    }
}

fn compute_transition(
    from: CountdownPhase,
    event: CountdownEvent,
) -> Result<CountdownPhase, InvalidTransition> {
    use CountdownEvent::*;
    use CountdownPhase::*;

    let next = match (from, event) {
        (Idle | Counting(_), Start { from: start }) => Counting(start),
        (Counting(0), Tick) => Starting,
        (Counting(n), Tick) => Counting(n - 1),
        (Counting(_), Cancel) => Idle,
        _ => return Err(InvalidTransition { from, event }),
    };
    Ok(next)
}
