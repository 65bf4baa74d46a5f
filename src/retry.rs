//! Bounded polling of board ready flags.

use std::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::Error;

/// How long to poll a ready flag before giving up.
///
/// The first `spin_polls` polls are issued back to back; after that each poll is
/// followed by a `backoff` sleep so a slow device does not pin a CPU core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of polls before reporting a timeout.
    pub max_polls: u32,
    /// Polls issued without sleeping in between.
    pub spin_polls: u32,
    /// Sleep between polls once the spin phase is over.
    pub backoff: Duration,
}

/// Result of waiting on a ready flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The flag was raised.
    Done,
    /// The flag was still low after every poll was spent.
    TimedOut {
        /// Number of polls made.
        polls: u32,
    },
}

impl WaitOutcome {
    /// True if the wait ran out of polls.
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut { .. })
    }
}

impl RetryPolicy {
    /// Policy used for shift-register commits.
    pub const SHIFT_REGISTER: Self = Self {
        max_polls: 1_000_000,
        spin_polls: 100,
        backoff: Duration::from_millis(1),
    };

    /// Policy used when waiting for the TDC gate pulser to finish.
    pub const PULSER: Self = Self {
        max_polls: 10_000,
        spin_polls: 100,
        backoff: Duration::from_millis(1),
    };

    /// Poll `ready` until it returns true or the poll budget is spent.
    ///
    /// Errors from `ready` are passed straight through; running out of polls is
    /// not an error but [`WaitOutcome::TimedOut`].
    pub fn wait<D, F>(&self, delay: &mut D, mut ready: F) -> Result<WaitOutcome, Error>
    where
        D: DelayNs,
        F: FnMut() -> Result<bool, Error>,
    {
        let backoff_ns = u32::try_from(self.backoff.as_nanos()).unwrap_or(u32::MAX);
        for poll in 0..self.max_polls {
            if ready()? {
                return Ok(WaitOutcome::Done);
            }
            if poll >= self.spin_polls {
                delay.delay_ns(backoff_ns);
            }
        }
        Ok(WaitOutcome::TimedOut {
            polls: self.max_polls,
        })
    }
}

/// Blocking delay backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns.into()));
    }
}

/// Sleep for a [`Duration`] that may not fit in a single `delay_ns` call.
pub(crate) fn sleep<D: DelayNs>(delay: &mut D, duration: Duration) {
    let mut remaining_us = duration.as_micros();
    while remaining_us > 0 {
        let chunk = remaining_us.min(u128::from(u32::MAX));
        // chunk is bounded by u32::MAX above.
        delay.delay_us(chunk as u32);
        remaining_us -= chunk;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingDelay {
        calls: u32,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, _ns: u32) {
            self.calls += 1;
        }
    }

    #[test]
    fn ready_on_third_poll() {
        let mut delay = CountingDelay::default();
        let mut polls = 0;
        let outcome = RetryPolicy::PULSER
            .wait(&mut delay, || {
                polls += 1;
                Ok(polls == 3)
            })
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Done);
        assert_eq!(delay.calls, 0, "still in the spin phase");
    }

    #[test]
    fn times_out_after_budget() {
        let policy = RetryPolicy {
            max_polls: 20,
            spin_polls: 5,
            backoff: Duration::from_millis(1),
        };
        let mut delay = CountingDelay::default();
        let outcome = policy.wait(&mut delay, || Ok(false)).unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut { polls: 20 });
        assert_eq!(delay.calls, 15);
    }
}
