//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tickwire_core::Component;

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Generous upper bound for anything crossing a loopback socket.
pub const NET_TIMEOUT: Duration = Duration::from_secs(5);

/// Visible counter component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Counter(pub u64);

impl Component for Counter {
    const KEY: &'static str = "counter";
}
