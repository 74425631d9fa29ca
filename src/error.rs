//! Error taxonomy for the sizing and pricing pipeline.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Failure raised by a single pipeline stage.
///
/// Only [`EngineError::InvalidInput`] is recoverable by the caller. Every other
/// variant means the quote cannot be produced and the whole computation aborts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A facility field is missing or out of range.
    #[error("{field}: {message}")]
    InvalidInput {
        /// Field path as the caller knows it (e.g. `"quantities.square_feet"`).
        field: String,
        /// Actionable message, safe to show to end users.
        message: String,
    },
    /// No template family exists for the industry.
    #[error("unknown industry \"{0}\"")]
    UnknownIndustry(String),
    /// The industry exists but the requested subtype has no template.
    #[error("no template for industry \"{industry}\" subtype {subtype:?}")]
    TemplateNotFound {
        /// Requested industry.
        industry: String,
        /// Requested subtype, if any.
        subtype: Option<String>,
    },
    /// NaN, infinity, negative currency or ordering violation detected mid-pipeline.
    #[error("computation invariant violated for {quantity}: {detail}")]
    InvariantViolation {
        /// Name of the offending quantity.
        quantity: String,
        /// What was observed.
        detail: String,
    },
    /// A margin band or cap would have priced below cost.
    #[error("margin policy violation: {0}")]
    MarginPolicyViolation(String),
}

impl EngineError {
    /// Shorthand for [`EngineError::InvalidInput`].
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`EngineError::InvariantViolation`].
    pub fn invariant(quantity: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            quantity: quantity.into(),
            detail: detail.into(),
        }
    }

    /// Whether the message may be shown verbatim to an end user.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}

/// Pipeline stage that produced a [`QuoteError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Template,
    Region,
    Baseline,
    Solar,
    Sizing,
    Financial,
    Margin,
    Assembly,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Template => "template",
            Self::Region => "region",
            Self::Baseline => "baseline",
            Self::Solar => "solar",
            Self::Sizing => "sizing",
            Self::Financial => "financial",
            Self::Margin => "margin",
            Self::Assembly => "assembly",
        };
        f.write_str(name)
    }
}

/// The single typed failure returned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("quote failed at {stage} stage: {source}")]
pub struct QuoteError {
    /// Stage that failed.
    pub stage: Stage,
    /// Underlying stage error.
    #[source]
    pub source: EngineError,
}

impl QuoteError {
    pub fn new(stage: Stage, source: EngineError) -> Self {
        Self { stage, source }
    }

    /// Text safe to show an end user. Internal failures are reduced to the
    /// stage name; their detail belongs in the log.
    pub fn user_message(&self) -> String {
        match &self.source {
            EngineError::InvalidInput { .. }
            | EngineError::UnknownIndustry(_)
            | EngineError::TemplateNotFound { .. } => self.to_string(),
            _ => format!("quote could not be computed ({} stage)", self.stage),
        }
    }
}

/// Convenience alias used by every stage.
pub type EngineResult<T> = Result<T, EngineError>;

/// Attaches a [`Stage`] to a stage result.
pub trait AtStage<T> {
    /// Wraps the error in a [`QuoteError`] tagged with `stage`.
    fn at(self, stage: Stage) -> Result<T, QuoteError>;
}

impl<T> AtStage<T> for EngineResult<T> {
    fn at(self, stage: Stage) -> Result<T, QuoteError> {
        self.map_err(|source| QuoteError::new(stage, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invalid_input_is_user_facing() {
        assert!(EngineError::invalid("roof.value", "roof area must be greater than 0").is_user_facing());
        assert!(!EngineError::invariant("peak_kw", "NaN").is_user_facing());
        assert!(!EngineError::UnknownIndustry("bakery".into()).is_user_facing());
        assert!(!EngineError::MarginPolicyViolation("negative".into()).is_user_facing());
    }

    #[test]
    fn user_message_hides_internal_detail() {
        let e = QuoteError::new(
            Stage::Financial,
            EngineError::invariant("line_items.BatteryEnergy", "non-finite value inf"),
        );
        assert_eq!(e.user_message(), "quote could not be computed (financial stage)");

        let e = QuoteError::new(Stage::Margin, EngineError::MarginPolicyViolation("below cost".into()));
        assert!(!e.user_message().contains("below cost"));

        let e = QuoteError::new(
            Stage::Baseline,
            EngineError::invalid("quantities.rooms", "room count is required"),
        );
        assert!(e.user_message().contains("quantities.rooms: room count is required"));
    }

    #[test]
    fn quote_error_names_the_stage() {
        let err: Result<(), _> = Err(EngineError::invariant("bess.energy_kwh", "is NaN"));
        let err = err.at(Stage::Sizing).expect_err("must fail");
        assert_eq!(err.stage, Stage::Sizing);
        assert!(err.to_string().contains("sizing stage"));
        assert!(err.to_string().contains("bess.energy_kwh"));
    }

    #[test]
    fn invalid_input_message_is_field_prefixed() {
        let err = EngineError::invalid("quantities.square_feet", "must be greater than 0");
        assert_eq!(err.to_string(), "quantities.square_feet: must be greater than 0");
    }
}
