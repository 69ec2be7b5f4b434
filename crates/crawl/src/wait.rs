// ABOUTME: Bounded polling waits on concrete readiness signals (element present, frame available).
// ABOUTME: Absence errors are polled through; a dead session ends the wait immediately.

use std::thread;
use std::time::{Duration, Instant};

use crate::driver::{Driver, ElementHandle, Locator};
use crate::error::DriverError;

/// A timeout plus the interval between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    pub timeout: Duration,
    pub poll: Duration,
}

impl Wait {
    pub const fn new(timeout: Duration, poll: Duration) -> Self {
        Self { timeout, poll }
    }

    pub const fn secs(timeout: u64) -> Self {
        Self::new(Duration::from_secs(timeout), Duration::from_millis(250))
    }

    /// A single check with no polling.
    pub const fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Polls `probe` until it yields a value or the timeout passes.
    ///
    /// The probe always runs at least once. Errors for which
    /// [`DriverError::is_absence`] holds count as "not yet"; any other error
    /// is returned as is.
    pub fn until<T, F>(&self, what: &str, mut probe: F) -> Result<T, DriverError>
    where
        F: FnMut() -> Result<Option<T>, DriverError>,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            match probe() {
                Ok(Some(v)) => return Ok(v),
                Ok(None) => {}
                Err(e) if e.is_absence() => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout(what.to_string()));
            }
            if !self.poll.is_zero() {
                thread::sleep(self.poll);
            }
        }
    }

    /// Like [`Wait::until`] but a timeout becomes `Ok(None)`.
    pub fn optional<T, F>(&self, what: &str, probe: F) -> Result<Option<T>, DriverError>
    where
        F: FnMut() -> Result<Option<T>, DriverError>,
    {
        match self.until(what, probe) {
            Ok(v) => Ok(Some(v)),
            Err(DriverError::Timeout(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Waits for the first element matching `locator`.
pub fn wait_for_element<D: Driver + ?Sized>(
    driver: &mut D,
    wait: &Wait,
    scope: Option<&ElementHandle>,
    locator: &Locator,
) -> Result<ElementHandle, DriverError> {
    wait.until(&locator.to_string(), || {
        Ok(driver.find_elements(scope, locator)?.into_iter().next())
    })
}

/// Re-enters a frame from the top-level document, polling until it is available.
pub fn enter_frame<D: Driver + ?Sized>(driver: &mut D, wait: &Wait, frame_id: &str) -> Result<bool, DriverError> {
    wait.optional(&format!("frame {frame_id}"), || {
        driver.switch_to_default()?;
        Ok(driver.switch_to_frame(frame_id)?.then_some(()))
    })
    .map(|entered| entered.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn until_returns_first_ready_value() {
        let mut calls = 0;
        let got = Wait::new(Duration::from_secs(1), Duration::ZERO)
            .until("counter", || {
                calls += 1;
                Ok((calls == 3).then_some(calls))
            })
            .unwrap();
        assert_eq!(got, 3);
    }

    #[test]
    fn until_polls_through_absence_and_times_out() {
        let mut calls = 0;
        let err = Wait::new(Duration::from_millis(20), Duration::from_millis(1))
            .until::<(), _>("missing", || {
                calls += 1;
                Err(DriverError::NoSuchElement("x".into()))
            })
            .unwrap_err();
        assert!(matches!(err, DriverError::Timeout(ref w) if w == "missing"));
        assert!(calls > 1);
    }

    #[test]
    fn until_stops_on_session_loss() {
        let mut calls = 0;
        let err = Wait::secs(5)
            .until::<(), _>("x", || {
                calls += 1;
                Err(DriverError::NoSession)
            })
            .unwrap_err();
        assert!(matches!(err, DriverError::NoSession));
        assert_eq!(calls, 1);
    }

    #[test]
    fn optional_maps_timeout_to_none() {
        let got: Option<u8> = Wait::immediate().optional("never", || Ok(None)).unwrap();
        assert_eq!(got, None);
    }
}
