//! The action catalog and dispatcher.
//!
//! Exactly twelve methods exist; callers (the model included) may
//! request nothing else. Parsing happens at the boundary so everything
//! past it works with a typed [`Action`], and a single executor switches
//! on the variant.

pub(crate) mod dispatch;
pub(crate) mod fallback;
pub mod keys;

use serde::Serialize;

use crate::error::ActionError;
use crate::settle::SettleReason;

pub(crate) use dispatch::execute;

/// One element operation from the closed set.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Mouse click: move, press, release.
    Click,
    /// Set an input's value directly, firing input/change.
    Fill { value: String },
    /// Focus and type through the input pipeline; optional trailing
    /// Enter.
    Type { text: String, press_enter: bool },
    /// Press a named key.
    Press { key: String },
    /// Select a `<select>` option by value, then by text.
    SelectOptionFromDropdown { option: String },
    /// Set a checkbox/radio checked.
    Check,
    /// Clear a checkbox.
    Uncheck,
    /// Move the pointer over the element.
    Hover,
    /// Scroll the element into view.
    ScrollToElement,
    /// Smooth-scroll the element to a percentage of its range.
    ScrollToPercentage { percent: f64 },
    /// Scroll the nearest scrollable ancestor forward one viewport.
    NextChunk,
    /// Scroll the nearest scrollable ancestor back one viewport.
    PrevChunk,
}

/// The twelve method names, wire form.
pub const ACTION_METHODS: [&str; 12] = [
    "click",
    "fill",
    "type",
    "press",
    "selectOptionFromDropdown",
    "check",
    "uncheck",
    "hover",
    "scrollToElement",
    "scrollToPercentage",
    "nextChunk",
    "prevChunk",
];

impl Action {
    /// Parse a `(method, args)` request from the boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::BadRequest`] for unknown methods and
    /// malformed argument lists; these are never retried.
    pub fn parse(method: &str, args: &[String]) -> Result<Self, ActionError> {
        let expect_none = |action: Action| {
            if args.is_empty() {
                Ok(action)
            } else {
                Err(ActionError::BadRequest(format!(
                    "{method} takes no arguments, got {}",
                    args.len()
                )))
            }
        };
        let first = || {
            args.first().cloned().ok_or_else(|| {
                ActionError::BadRequest(format!("{method} requires an argument"))
            })
        };

        match method {
            "click" => expect_none(Self::Click),
            "check" => expect_none(Self::Check),
            "uncheck" => expect_none(Self::Uncheck),
            "hover" => expect_none(Self::Hover),
            "scrollToElement" => expect_none(Self::ScrollToElement),
            "nextChunk" => expect_none(Self::NextChunk),
            "prevChunk" => expect_none(Self::PrevChunk),
            "fill" => Ok(Self::Fill { value: first()? }),
            "press" => Ok(Self::Press { key: first()? }),
            "selectOptionFromDropdown" => Ok(Self::SelectOptionFromDropdown { option: first()? }),
            "type" => {
                let text = first()?;
                let press_enter = match args.get(1).map(String::as_str) {
                    None => false,
                    Some("true") => true,
                    Some("false") => false,
                    Some(other) => {
                        return Err(ActionError::BadRequest(format!(
                            "type's second argument must be true/false, got {other:?}"
                        )));
                    }
                };
                Ok(Self::Type { text, press_enter })
            }
            "scrollToPercentage" => {
                let raw = first()?;
                let percent: f64 = raw.trim_end_matches('%').parse().map_err(|_| {
                    ActionError::BadRequest(format!("invalid percentage {raw:?}"))
                })?;
                if !(0.0..=100.0).contains(&percent) {
                    return Err(ActionError::BadRequest(format!(
                        "percentage {percent} out of [0, 100]"
                    )));
                }
                Ok(Self::ScrollToPercentage { percent })
            }
            other => Err(ActionError::BadRequest(format!(
                "unknown method {other:?}; expected one of {ACTION_METHODS:?}"
            ))),
        }
    }

    /// The wire name of this action.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Fill { .. } => "fill",
            Self::Type { .. } => "type",
            Self::Press { .. } => "press",
            Self::SelectOptionFromDropdown { .. } => "selectOptionFromDropdown",
            Self::Check => "check",
            Self::Uncheck => "uncheck",
            Self::Hover => "hover",
            Self::ScrollToElement => "scrollToElement",
            Self::ScrollToPercentage { .. } => "scrollToPercentage",
            Self::NextChunk => "nextChunk",
            Self::PrevChunk => "prevChunk",
        }
    }

    /// Whether the action can change page state. Mutating actions are
    /// followed by a settle wait and invalidate the snapshot.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Hover)
    }

    /// Whether the action needs a pointer position.
    pub fn is_pointer(&self) -> bool {
        matches!(self, Self::Click | Self::Hover)
    }
}

/// Compact, user-visible action result.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    /// Whether the action completed.
    pub ok: bool,
    /// Human-readable summary or failure cause.
    pub message: String,
    /// How the post-action settle ended, when one ran.
    pub settle: Option<SettleReason>,
}

impl ActionOutcome {
    pub(crate) fn ok(message: impl Into<String>, settle: Option<SettleReason>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            settle,
        }
    }

    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            settle: None,
        }
    }
}
