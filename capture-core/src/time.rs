use std::{sync::LazyLock, time::Instant};

pub const NSEC_PER_SEC: i64 = 1_000_000_000;

static EPOCH: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Monotonic nanoseconds since the first call in this process.
pub fn timestamp_nsec() -> i64 {
    let duration = EPOCH.elapsed();
    duration.as_secs() as i64 * NSEC_PER_SEC + duration.subsec_nanos() as i64
}
