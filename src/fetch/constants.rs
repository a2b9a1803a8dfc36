//! Constants for the fetch module (timeouts, pacing).

use std::time::Duration;

/// Default HTTP connect timeout (10 seconds). The overall request timeout is
/// configured per run.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Warning threshold for cumulative pacing delay across a run (5 minutes).
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(300);
