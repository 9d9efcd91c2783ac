//! Launch schedule computation

use std::time::Duration;

/// A group of instances launched together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    /// Time from scheduler start to launch
    pub offset: Duration,
    pub size: u64,
}

/// Split `quantity` launches into one batch of `stagger` per second,
/// starting `delay` after scheduler start
///
/// The remainder of `quantity / stagger` is dropped. Offsets saturate
/// rather than overflow.
pub fn batch_schedule(quantity: u64, stagger: u64, delay: Duration) -> Vec<Batch> {
    if stagger == 0 {
        return Vec::new();
    }
    (0..quantity / stagger)
        .map(|d| Batch {
            offset: delay.saturating_add(Duration::from_secs(d)),
            size: stagger,
        })
        .collect()
}
