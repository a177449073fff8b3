//! Recurrence calculator.
//!
//! Fixed-offset arithmetic only: monthly is 30 days and yearly 365,
//! regardless of calendar length. Kept behind this one function so a
//! calendar-aware rule set can be substituted without touching callers.

use chrono::{DateTime, Duration, Utc};

use crate::domain::models::Recurrence;

/// Compute the next due date for a recurrence rule from a base
/// timestamp. Pure and total over the four rules.
pub fn next_due(base: DateTime<Utc>, rule: Recurrence) -> DateTime<Utc> {
    match rule {
        Recurrence::Daily => base + Duration::days(1),
        Recurrence::Weekly => base + Duration::days(7),
        Recurrence::Monthly => base + Duration::days(30),
        Recurrence::Yearly => base + Duration::days(365),
    }
}
