//! Status state machines for orders, samples, results and reports.
//!
//! Every status enum implements [`Lifecycle`], which exposes an explicit transition table.
//! Whether that table is enforced depends on the configured [`TransitionPolicy`]:
//!
//! - `Permissive` accepts any move for samples, results and reports.
//! - `Strict` accepts only the moves listed in the table.
//!
//! Orders are always checked against their table (forward-only, terminal completion and
//! cancellation), whatever the policy.
//!
//! Re-applying the current status is always accepted. Services treat it as a re-application:
//! history is appended but first-write-wins timestamps are left untouched.

use crate::{LisError, LisResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How strictly status moves are validated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    /// Any status may follow any status.
    #[default]
    Permissive,
    /// Only moves listed in the entity's transition table are accepted.
    Strict,
}

impl FromStr for TransitionPolicy {
    type Err = LisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            other => Err(LisError::InvalidInput(format!(
                "unknown transition policy '{other}' (expected 'permissive' or 'strict')"
            ))),
        }
    }
}

/// A status enum with an explicit transition table.
pub trait Lifecycle: Copy + Eq + fmt::Display + 'static {
    /// Entity name used in error messages.
    const ENTITY: &'static str;

    /// Every status, in declaration order.
    fn all() -> &'static [Self];

    /// Statuses reachable from `self` under the strict table.
    fn allowed_targets(self) -> &'static [Self];

    fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }
}

/// Checks a status move against `policy`.
///
/// # Errors
///
/// Returns [`LisError::InvalidTransition`] when the policy is strict and `to` is neither `from`
/// nor listed in `from`'s transition table.
pub fn check_transition<S: Lifecycle>(policy: TransitionPolicy, from: S, to: S) -> LisResult<()> {
    if policy == TransitionPolicy::Permissive || from == to || from.allowed_targets().contains(&to)
    {
        return Ok(());
    }

    Err(LisError::InvalidTransition {
        entity: S::ENTITY,
        from: from.to_string(),
        to: to.to_string(),
    })
}

macro_rules! status_strings {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $ty {
            type Err = $crate::LisError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($ty::$variant),)+
                    other => Err($crate::LisError::InvalidInput(format!(
                        "unknown {} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

pub(crate) use status_strings;

// ============================================================================
// ORDER
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    SampleCollected,
    Completed,
    Cancelled,
}

status_strings!(OrderStatus {
    Pending => "pending",
    Processing => "processing",
    SampleCollected => "sample_collected",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl Lifecycle for OrderStatus {
    const ENTITY: &'static str = "order";

    fn all() -> &'static [Self] {
        use OrderStatus::*;
        &[Pending, Processing, SampleCollected, Completed, Cancelled]
    }

    fn allowed_targets(self) -> &'static [Self] {
        use OrderStatus::*;
        match self {
            Pending => &[Processing, SampleCollected, Completed, Cancelled],
            Processing => &[SampleCollected, Completed, Cancelled],
            SampleCollected => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }
}

// ============================================================================
// SAMPLE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Pending,
    Collected,
    InProcess,
    Processing,
    Completed,
    Cancelled,
    Rejected,
    Expired,
}

status_strings!(CollectionStatus {
    Pending => "pending",
    Collected => "collected",
    InProcess => "in_process",
    Processing => "processing",
    Completed => "completed",
    Cancelled => "cancelled",
    Rejected => "rejected",
    Expired => "expired",
});

impl Lifecycle for CollectionStatus {
    const ENTITY: &'static str = "sample";

    fn all() -> &'static [Self] {
        use CollectionStatus::*;
        &[
            Pending, Collected, InProcess, Processing, Completed, Cancelled, Rejected, Expired,
        ]
    }

    fn allowed_targets(self) -> &'static [Self] {
        use CollectionStatus::*;
        match self {
            Pending => &[Collected, Cancelled, Rejected, Expired],
            Collected => &[InProcess, Processing, Rejected, Cancelled, Expired],
            InProcess => &[Processing, Rejected, Cancelled, Expired],
            Processing => &[Completed, Rejected],
            Completed | Cancelled | Rejected | Expired => &[],
        }
    }
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Pending,
    InProgress,
    Completed,
    Verified,
    Rejected,
    RequiresReview,
}

status_strings!(ResultStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Verified => "verified",
    Rejected => "rejected",
    RequiresReview => "requires_review",
});

impl Lifecycle for ResultStatus {
    const ENTITY: &'static str = "result";

    fn all() -> &'static [Self] {
        use ResultStatus::*;
        &[
            Pending,
            InProgress,
            Completed,
            Verified,
            Rejected,
            RequiresReview,
        ]
    }

    fn allowed_targets(self) -> &'static [Self] {
        use ResultStatus::*;
        match self {
            Pending => &[InProgress, Completed, Rejected, RequiresReview],
            InProgress => &[Completed, Rejected, RequiresReview],
            Completed => &[Completed, Verified, Rejected, RequiresReview],
            RequiresReview => &[Completed, Verified, Rejected],
            Verified => &[RequiresReview, Rejected],
            Rejected => &[InProgress, Completed],
        }
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Draft,
    PendingReview,
    Approved,
    Rejected,
    Delivered,
    Archived,
}

status_strings!(ReportStatus {
    Draft => "draft",
    PendingReview => "pending_review",
    Approved => "approved",
    Rejected => "rejected",
    Delivered => "delivered",
    Archived => "archived",
});

impl Lifecycle for ReportStatus {
    const ENTITY: &'static str = "report";

    fn all() -> &'static [Self] {
        use ReportStatus::*;
        &[Draft, PendingReview, Approved, Rejected, Delivered, Archived]
    }

    fn allowed_targets(self) -> &'static [Self] {
        use ReportStatus::*;
        match self {
            Draft => &[PendingReview],
            PendingReview => &[Approved, Rejected],
            Approved => &[Delivered],
            Rejected => &[Draft, PendingReview],
            Delivered => &[Archived],
            Archived => &[],
        }
    }
}
