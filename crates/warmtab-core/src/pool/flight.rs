//! Single-flight guards.

use std::sync::atomic::{AtomicBool, Ordering};

/// Allows at most one holder at a time. The check-and-set happens
/// synchronously, before the guarded section reaches its first `.await`.
#[derive(Debug, Default)]
pub(super) struct SingleFlight {
    busy: AtomicBool,
}

impl SingleFlight {
    pub(super) fn try_begin(&self) -> Option<FlightToken<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightToken { flight: self })
    }

    pub(super) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the guard when dropped, including on early return.
pub(super) struct FlightToken<'a> {
    flight: &'a SingleFlight,
}

impl Drop for FlightToken<'_> {
    fn drop(&mut self) {
        self.flight.busy.store(false, Ordering::Release);
    }
}
