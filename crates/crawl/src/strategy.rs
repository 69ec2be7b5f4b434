// ABOUTME: Ordered selector strategies and the small interpreter that returns the first usable match.
// ABOUTME: The generic evaluator takes any probe, so fallback order is testable without a browser.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::{Driver, ElementHandle, Locator};
use crate::error::DriverError;

/// One entry in a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(flatten)]
    pub locator: Locator,
    /// Skip this entry when its first match is not displayed.
    #[serde(default)]
    pub displayed: bool,
    /// Skip this entry when its first match has no text.
    #[serde(default)]
    pub non_empty: bool,
}

impl Strategy {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            displayed: false,
            non_empty: false,
        }
    }

    pub fn displayed(mut self) -> Self {
        self.displayed = true;
        self
    }

    pub fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }
}

/// The winning entry and what it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched<T> {
    pub index: usize,
    pub value: T,
}

/// Runs `probe` over `chain` in order and returns the first `Some`.
///
/// Absence errors move on to the next entry. Any other error stops the
/// evaluation, since it usually means the session itself is unhealthy.
pub fn evaluate<T, F>(chain: &[Strategy], mut probe: F) -> Result<Option<Matched<T>>, DriverError>
where
    F: FnMut(&Strategy) -> Result<Option<T>, DriverError>,
{
    for (index, strategy) in chain.iter().enumerate() {
        match probe(strategy) {
            Ok(Some(value)) => return Ok(Some(Matched { index, value })),
            Ok(None) => {}
            Err(e) if e.is_absence() => {
                debug!(strategy = %strategy.locator, error = %e, "strategy missed");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// First element satisfying a strategy in the chain, together with its text.
pub fn first_element<D: Driver + ?Sized>(
    driver: &mut D,
    scope: Option<&ElementHandle>,
    chain: &[Strategy],
) -> Result<Option<Matched<(ElementHandle, String)>>, DriverError> {
    evaluate(chain, |s| {
        let Some(el) = driver.find_elements(scope, &s.locator)?.into_iter().next() else {
            return Ok(None);
        };
        if s.displayed && !driver.is_displayed(&el)? {
            return Ok(None);
        }
        let text = driver.element_text(&el)?.trim().to_string();
        if s.non_empty && text.is_empty() {
            return Ok(None);
        }
        Ok(Some((el, text)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<Strategy> {
        vec![
            Strategy::new(Locator::css("a.place_bluelink")),
            Strategy::new(Locator::css("a[href*='/place/']")),
            Strategy::new(Locator::css("span.xBZDS")),
        ]
    }

    #[test]
    fn first_non_empty_probe_wins() {
        let mut seen = Vec::new();
        let got = evaluate(&chain(), |s| {
            seen.push(s.locator.value().to_string());
            Ok((s.locator.value() == "a[href*='/place/']").then_some("hit"))
        })
        .unwrap()
        .unwrap();
        assert_eq!(got.index, 1);
        assert_eq!(got.value, "hit");
        // later entries are never consulted
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn absence_errors_fall_through() {
        let got = evaluate(&chain(), |s| {
            if s.locator.value() == "span.xBZDS" {
                Ok(Some(()))
            } else {
                Err(DriverError::NoSuchElement(s.locator.to_string()))
            }
        })
        .unwrap();
        assert_eq!(got.map(|m| m.index), Some(2));
    }

    #[test]
    fn session_loss_stops_the_chain() {
        let mut calls = 0;
        let err = evaluate::<(), _>(&chain(), |_| {
            calls += 1;
            Err(DriverError::NoSession)
        })
        .unwrap_err();
        assert!(err.is_session_lost());
        assert_eq!(calls, 1);
    }

    #[test]
    fn exhausted_chain_is_none() {
        assert!(evaluate::<(), _>(&chain(), |_| Ok(None)).unwrap().is_none());
    }

    #[test]
    fn strategy_deserializes_with_flags() {
        let s: Strategy = serde_json::from_str(r#"{"css": "div.TYaxT", "displayed": true}"#).unwrap();
        assert_eq!(s, Strategy::new(Locator::css("div.TYaxT")).displayed());
    }
}
