//! Engine-wide tunables. The spec fixes the anti-snipe window and extension
//! (§4.2: `W = 5s`, `E = 10s`); they are kept as overridable constructor
//! defaults rather than literals so tests can probe boundary ticks without
//! real wall-clock sleeps (AMBIENT-3, `SPEC_FULL.md`).

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AntiSnipeConfig {
    /// Extension triggers only inside this trailing window of a round.
    pub window: Duration,
    /// How far the deadline is pushed out when triggered.
    pub extension: Duration,
}

impl Default for AntiSnipeConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(5),
            extension: Duration::from_secs(10),
        }
    }
}
