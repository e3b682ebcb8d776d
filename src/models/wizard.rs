//! Persisted state of the search-creation wizard.

use serde::{Deserialize, Serialize};

use super::Range;

/// Step a user is at while building a search, with the input gathered so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum WizardState {
    AwaitingMake,
    AwaitingModel {
        make: String,
    },
    AwaitingYearChoice {
        make: String,
        model: String,
    },
    AwaitingYearRange {
        make: String,
        model: String,
    },
    AwaitingPriceChoice {
        make: String,
        model: String,
        year: Range,
    },
    AwaitingPriceRange {
        make: String,
        model: String,
        year: Range,
    },
}

impl WizardState {
    /// Whether this step consumes a free-text reply (as opposed to a button press).
    pub fn expects_text(&self) -> bool {
        matches!(
            self,
            WizardState::AwaitingMake
                | WizardState::AwaitingModel { .. }
                | WizardState::AwaitingYearRange { .. }
                | WizardState::AwaitingPriceRange { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_with_step_tag() {
        let state = WizardState::AwaitingPriceChoice {
            make: "BMW".into(),
            model: "X5".into(),
            year: Range::new(Some(2010), Some(2020)),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["step"], "awaiting_price_choice");

        let back: WizardState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_expects_text() {
        assert!(WizardState::AwaitingMake.expects_text());
        assert!(
            !WizardState::AwaitingYearChoice {
                make: "a".into(),
                model: "b".into()
            }
            .expects_text()
        );
    }
}
