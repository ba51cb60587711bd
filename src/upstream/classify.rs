//! Status classification: maps the raw report body to a [`TestResult`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::errors::{AtwError, Result};

/// Body returned while the lab is still working on the sample.
const PROCESSING_BODY: &str = "Test processing.";

/// Body returned when the endpoint did not recognize the retrieval code or
/// date of birth. Surfaced verbatim by the upstream service.
const INVALID_INPUT_BODY: &str = "Cannot read property 'email' of undefined";

/// The classified state of a watched test.
///
/// `Unseen` is the initial sentinel: it is never produced by
/// [`classify`] and only exists so the first real classification compares
/// unequal to "nothing observed yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    /// No poll has succeeded yet.
    #[default]
    Unseen,
    /// The lab is still processing the sample.
    Processing,
    /// The status is no longer "processing". The only distinction drawn
    /// today beyond the processing/error states.
    Changed,
    /// Reserved for future classification refinement; never produced.
    Positive,
    /// Reserved for future classification refinement; never produced.
    Negative,
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unseen => write!(f, "unseen"),
            Self::Processing => write!(f, "processing"),
            Self::Changed => write!(f, "changed"),
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
        }
    }
}

/// Classify a raw report body.
///
/// The invalid-input body is not a result: it means the identifying
/// parameters were rejected upstream, which is fatal because retrying with
/// the same parameters cannot succeed.
pub fn classify(raw: &str) -> Result<TestResult> {
    match raw {
        PROCESSING_BODY => Ok(TestResult::Processing),
        INVALID_INPUT_BODY => Err(AtwError::InvalidInput),
        _ => Ok(TestResult::Changed),
    }
}
