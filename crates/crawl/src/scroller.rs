// ABOUTME: List page scroller that loads a lazily-populated result list until its item count settles.
// ABOUTME: Termination is decided by a pure StabilityTracker so it can be checked on any count sequence.

use tracing::{debug, warn};

use crate::driver::Driver;
use crate::error::DriverError;
use crate::pacing::Pause;
use crate::site::SiteProfile;
use crate::wait::{wait_for_element, Wait};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    /// The count was unchanged for the configured number of polls.
    Stable,
    /// The iteration cap was reached.
    Exhausted,
}

/// Tracks item counts across polls.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    stable_polls: usize,
    max_iterations: usize,
    last: Option<usize>,
    unchanged: usize,
    iterations: usize,
}

impl StabilityTracker {
    pub fn new(stable_polls: usize, max_iterations: usize) -> Self {
        Self {
            stable_polls: stable_polls.max(1),
            max_iterations: max_iterations.max(1),
            last: None,
            unchanged: 0,
            iterations: 0,
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn observe(&mut self, count: usize) -> Verdict {
        self.iterations += 1;
        if self.last == Some(count) {
            self.unchanged += 1;
        } else {
            self.unchanged = 0;
        }
        self.last = Some(count);

        if self.unchanged >= self.stable_polls {
            Verdict::Stable
        } else if self.iterations >= self.max_iterations {
            Verdict::Exhausted
        } else {
            Verdict::Continue
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    /// The scroll container never appeared.
    NoContainer,
    Stable { items: usize, polls: usize },
    Exhausted { items: usize, polls: usize },
}

#[derive(Debug, Clone)]
pub struct ScrollOptions {
    pub stable_polls: usize,
    pub max_iterations: usize,
    pub container_wait: Wait,
    pub pause: Pause,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            stable_polls: 5,
            max_iterations: 30,
            container_wait: Wait::secs(5),
            pause: Pause::millis(800, 1200),
        }
    }
}

/// Scrolls the result list inside the current frame until the item count settles.
pub fn scroll_list<D: Driver + ?Sized>(
    driver: &mut D,
    site: &SiteProfile,
    opts: &ScrollOptions,
) -> Result<ScrollOutcome, DriverError> {
    let container = match wait_for_element(driver, &opts.container_wait, None, &site.scroll_container) {
        Ok(el) => el,
        Err(DriverError::Timeout(_)) => {
            warn!(container = %site.scroll_container, "scroll container not found");
            return Ok(ScrollOutcome::NoContainer);
        }
        Err(e) => return Err(e),
    };

    let mut tracker = StabilityTracker::new(opts.stable_polls, opts.max_iterations);
    loop {
        let items = driver.find_elements(None, &site.list_item)?.len();
        match tracker.observe(items) {
            Verdict::Continue => {}
            Verdict::Stable => {
                debug!(items, polls = tracker.iterations(), "list settled");
                return Ok(ScrollOutcome::Stable {
                    items,
                    polls: tracker.iterations(),
                });
            }
            Verdict::Exhausted => {
                debug!(items, polls = tracker.iterations(), "scroll cap reached");
                return Ok(ScrollOutcome::Exhausted {
                    items,
                    polls: tracker.iterations(),
                });
            }
        }
        driver.execute_script(
            "arguments[0].scrollBy(0, arguments[1]);",
            vec![container.to_arg(), site.scroll_offset.into()],
        )?;
        opts.pause.sleep();
    }
}
