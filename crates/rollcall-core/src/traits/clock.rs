//! Clock trait: source of effective time.

use crate::types::Moment;

/// Supplies the current effective time. Implementations may run faster than
/// wall-clock time; every delay the scheduler arms is divided by
/// [`Clock::speed_multiplier`].
pub trait Clock: Send + Sync {
    /// Current effective date, time (minute granularity) and weekday.
    fn now(&self) -> Moment;

    /// How many effective seconds elapse per real second.
    fn speed_multiplier(&self) -> f64 {
        1.0
    }

    /// Whether time is simulated (shown in status output).
    fn is_simulated(&self) -> bool {
        false
    }
}
