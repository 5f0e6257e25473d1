//! Single-flight run tracking.
//!
//! Every run takes a [`RunTicket`] from the shared [`RunCoordinator`].
//! Starting a new run bumps the generation, which makes every older ticket
//! stale: its training loop stops at the next epoch boundary and its results
//! are refused by the display board.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crime_forecast_forecast::trainer::CancelCheck;

use crate::PipelineError;

/// Hands out run tickets and remembers which one is current.
#[derive(Debug, Clone, Default)]
pub struct RunCoordinator {
    generation: Arc<AtomicU64>,
}

impl RunCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new run, superseding any run in flight.
    #[must_use]
    pub fn begin_run(&self) -> RunTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("run {generation} started");
        RunTicket {
            generation,
            current: Arc::clone(&self.generation),
        }
    }

    /// Generation of the most recently started run (0 before any run).
    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Proof of which run produced a result.
#[derive(Debug, Clone)]
pub struct RunTicket {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl RunTicket {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether no newer run has started since this ticket was issued.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// # Errors
    ///
    /// * [`PipelineError::Superseded`] if a newer run has started
    pub fn ensure_current(&self) -> Result<(), PipelineError> {
        if self.is_current() {
            Ok(())
        } else {
            Err(PipelineError::Superseded {
                generation: self.generation,
            })
        }
    }

    /// Cancellation predicate for a trainer: fires once the ticket is stale.
    #[must_use]
    pub fn cancel_check(&self) -> CancelCheck {
        let ticket = self.clone();
        Arc::new(move || !ticket.is_current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_run_makes_older_ticket_stale() {
        let coordinator = RunCoordinator::new();
        let first = coordinator.begin_run();
        assert!(first.is_current());
        assert!(first.ensure_current().is_ok());

        let second = coordinator.begin_run();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!(second.generation(), first.generation() + 1);
        assert_eq!(coordinator.current_generation(), second.generation());
        assert!(matches!(
            first.ensure_current(),
            Err(PipelineError::Superseded { generation: 1 })
        ));
    }

    #[test]
    fn cancel_check_tracks_staleness() {
        let coordinator = RunCoordinator::new();
        let ticket = coordinator.begin_run();
        let cancelled = ticket.cancel_check();

        assert!(!cancelled());
        let _newer = coordinator.begin_run();
        assert!(cancelled());
    }

    #[test]
    fn clones_share_the_generation() {
        let coordinator = RunCoordinator::new();
        let other = coordinator.clone();
        let ticket = coordinator.begin_run();
        let _ = other.begin_run();
        assert!(!ticket.is_current());
    }
}
