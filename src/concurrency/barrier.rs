use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;
use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct BarrierState {
    phase: u64,
    participants: usize,
    arrived: usize,
    /// The phase whose election has already been won.
    elected: u64,
}

/// A phased barrier with a dynamic set of participants.
///
/// Workers `attach` at whatever phase the barrier has reached, and may leave
/// at any time with `detach` or `arrive_and_detach`. A phase ends when every
/// currently attached participant has arrived; exactly one of the workers
/// released from `arrive_and_wait` is told it was elected, so that it can
/// perform the single-writer work of the next phase.
///
/// The phase counter only ever increases, except through `reset` once every
/// participant has left. It is mirrored in an atomic so that `phase()` never
/// takes the lock.
#[derive(Debug)]
pub struct Barrier {
    state: Mutex<BarrierState>,
    released: Condvar,
    phase: AtomicU64,
}

impl Default for Barrier {
    fn default() -> Self {
        Self::new()
    }
}

impl Barrier {
    pub fn new() -> Self {
        Self::with_phase(0)
    }

    /// Creates a barrier that starts out at `phase`.
    pub fn with_phase(phase: u64) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                phase,
                participants: 0,
                arrived: 0,
                elected: phase,
            }),
            released: Condvar::new(),
            phase: AtomicU64::new(phase),
        }
    }

    /// Current phase, read without locking.
    pub fn phase(&self) -> u64 {
        self.phase.load(Ordering::Acquire)
    }

    pub fn participants(&self) -> usize {
        self.state.lock().participants
    }

    /// Joins the barrier.
    ///
    /// # Returns
    /// The phase the barrier is in; the caller continues from there.
    pub fn attach(&self) -> u64 {
        let mut state = self.state.lock();
        state.participants += 1;
        trace!(
            "Attached to barrier at phase {} ({} participants)",
            state.phase, state.participants
        );
        state.phase
    }

    /// Arrives at the end of the current phase and waits for every other
    /// participant.
    ///
    /// # Returns
    /// `true` for exactly one participant per phase: the last to arrive, or,
    /// if the phase was ended by a detach, the first waiter to wake up.
    pub fn arrive_and_wait(&self) -> bool {
        let mut state = self.state.lock();
        let start_phase = state.phase;
        let next_phase = start_phase + 1;
        state.arrived += 1;

        if state.arrived >= state.participants {
            state.arrived = 0;
            state.elected = next_phase;
            self.advance(&mut state, next_phase);
            drop(state);
            self.released.notify_all();
            return true;
        }

        while state.phase == start_phase {
            self.released.wait(&mut state);
        }

        if state.elected != next_phase {
            state.elected = next_phase;
            return true;
        }
        false
    }

    /// Arrives at the end of the current phase and leaves without waiting.
    ///
    /// # Returns
    /// `true` if the caller was the last participant.
    pub fn arrive_and_detach(&self) -> bool {
        self.detach_impl(true)
    }

    /// Leaves the barrier. If everyone still attached has already arrived,
    /// the phase ends.
    ///
    /// # Returns
    /// `true` if the caller was the last participant.
    pub fn detach(&self) -> bool {
        self.detach_impl(false)
    }

    /// Puts an idle barrier back at phase 0 for a fresh execution.
    ///
    /// # Returns
    /// `false`, leaving the barrier untouched, if anyone is still attached.
    pub fn reset(&self) -> bool {
        let mut state = self.state.lock();
        if state.participants > 0 {
            return false;
        }
        state.arrived = 0;
        state.elected = 0;
        self.advance(&mut state, 0);
        true
    }

    fn detach_impl(&self, arrive: bool) -> bool {
        let mut state = self.state.lock();
        debug_assert!(state.participants > 0, "detach from a barrier with no participants");
        state.participants = state.participants.saturating_sub(1);

        let release = (arrive || state.participants > 0) && state.arrived == state.participants;
        if release {
            state.arrived = 0;
            let next_phase = state.phase + 1;
            self.advance(&mut state, next_phase);
        }
        let last = state.participants == 0;
        drop(state);

        if release {
            self.released.notify_all();
        }
        last
    }

    fn advance(&self, state: &mut BarrierState, next_phase: u64) {
        state.phase = next_phase;
        self.phase.store(next_phase, Ordering::Release);
        trace!("Barrier advanced to phase {}", next_phase);
    }
}
