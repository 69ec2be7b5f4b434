// ABOUTME: Crawl session manager owning the single browser driver: lazy creation, periodic recycling, teardown.
// ABOUTME: Counts consecutive start failures and turns a run of them into a fatal error.

use tracing::{error, info, warn};

use crate::driver::{Driver, DriverFactory};
use crate::error::CrawlError;

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Recreate the driver before every `recycle_every`-th target. Zero disables recycling.
    pub recycle_every: usize,
    /// More consecutive start failures than this is fatal.
    pub max_consecutive_failures: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            recycle_every: 10,
            max_consecutive_failures: 3,
        }
    }
}

pub struct Session<F: DriverFactory> {
    factory: F,
    driver: Option<F::Driver>,
    opts: SessionOptions,
    consecutive_failures: u32,
    started: usize,
}

impl<F: DriverFactory> Session<F> {
    pub fn new(factory: F, opts: SessionOptions) -> Self {
        Self {
            factory,
            driver: None,
            opts,
            consecutive_failures: 0,
            started: 0,
        }
    }

    /// Number of drivers successfully created so far.
    pub fn started(&self) -> usize {
        self.started
    }

    pub fn is_alive(&self) -> bool {
        self.driver.is_some()
    }

    /// Returns the live driver, creating one if needed.
    ///
    /// `Ok(None)` means creation failed and the caller should skip its
    /// current unit of work. Once failures exceed the configured bound the
    /// error is fatal.
    pub fn acquire(&mut self) -> Result<Option<&mut F::Driver>, CrawlError> {
        if self.driver.is_none() {
            match self.factory.create() {
                Ok(driver) => {
                    self.consecutive_failures = 0;
                    self.started += 1;
                    info!(started = self.started, "browser driver created");
                    self.driver = Some(driver);
                }
                Err(e) => {
                    self.consecutive_failures += 1;
                    error!(
                        attempts = self.consecutive_failures,
                        error = %e,
                        "browser driver failed to start"
                    );
                    if self.consecutive_failures > self.opts.max_consecutive_failures {
                        return Err(CrawlError::DriverExhausted {
                            attempts: self.consecutive_failures,
                            last: e.to_string(),
                        });
                    }
                    return Ok(None);
                }
            }
        }
        Ok(self.driver.as_mut())
    }

    /// Quits the driver before the target at `index` when the recycle cadence says so.
    pub fn ensure_fresh(&mut self, index: usize) {
        let due = self.opts.recycle_every > 0 && index > 0 && index % self.opts.recycle_every == 0;
        if due && self.driver.is_some() {
            info!(index, "recycling browser driver");
            self.shutdown();
        }
    }

    /// Drops a driver that was reported dead so the next acquire recreates it.
    pub fn invalidate(&mut self) {
        if self.driver.is_some() {
            warn!("discarding lost browser driver");
            self.shutdown();
        }
    }

    /// Quits the driver explicitly.
    pub fn close(&mut self) -> Result<(), CrawlError> {
        if let Some(mut driver) = self.driver.take() {
            driver.quit()?;
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            if let Err(e) = driver.quit() {
                warn!(error = %e, "driver quit failed");
            }
        }
    }
}

impl<F: DriverFactory> Drop for Session<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
