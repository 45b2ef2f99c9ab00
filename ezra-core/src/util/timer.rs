//! Stopwatch for platform and request timing.

use std::time::Instant;

/// Time spent since a platform (or request) started.
#[derive(Clone, Copy, Debug)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Elapsed time in milliseconds, or whole seconds when `milliseconds` is false.
    pub fn time_spent(&self, milliseconds: bool) -> u128 {
        let elapsed = self.started.elapsed();
        if milliseconds {
            elapsed.as_millis()
        } else {
            u128::from(elapsed.as_secs())
        }
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn measures() {
        let watch = Stopwatch::start();
        std::thread::sleep(Duration::from_millis(5));
        assert!(watch.time_spent(true) >= 5);
        assert_eq!(watch.time_spent(false), 0);
    }
}
