//! Scholarship applications and their status lifecycle.
//!
//! The client only ever creates an application (entering `PENDING`) and then
//! observes what the backend reports. [`ApplicationLifecycle`] classifies
//! each observation so illegal backend transitions are noticed rather than
//! silently cached.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Category, Scholarship, ScholarshipId};

/// Backend-assigned application identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

impl ApplicationId {
    /// Wrap a backend identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl AsRef<str> for ApplicationId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Review status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    /// Submitted, awaiting review. Always the initial state.
    Pending,
    /// Accepted. Terminal.
    Approved,
    /// Declined. Terminal.
    Rejected,
}

impl ApplicationStatus {
    /// Status every application is created with.
    pub const INITIAL: Self = Self::Pending;

    /// Whether no further transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Whether the backend may move an application from `self` to `next`.
    ///
    /// # Examples
    /// ```
    /// use scholarship_portal::domain::ApplicationStatus;
    ///
    /// assert!(ApplicationStatus::Pending.can_transition_to(ApplicationStatus::Approved));
    /// assert!(!ApplicationStatus::Rejected.can_transition_to(ApplicationStatus::Approved));
    /// ```
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Rejected)
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        })
    }
}

/// Scholarship details the backend embeds in each listed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScholarshipSummary {
    /// Identifier.
    pub id: ScholarshipId,
    /// Display name.
    pub name: String,
    /// Awarding institution.
    #[serde(default)]
    pub institution: String,
    /// Award amount, when published.
    #[serde(default)]
    pub amount: Option<u64>,
    /// Application deadline.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Funding source.
    #[serde(default)]
    pub category: Option<Category>,
}

impl From<&Scholarship> for ScholarshipSummary {
    fn from(value: &Scholarship) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            institution: value.institution.clone(),
            amount: Some(value.amount),
            deadline: Some(value.deadline),
            category: Some(value.category),
        }
    }
}

/// A user's application for one scholarship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Identifier.
    pub id: ApplicationId,
    /// Scholarship applied for.
    pub scholarship_id: ScholarshipId,
    /// Current review status.
    pub status: ApplicationStatus,
    /// Submission time.
    #[serde(alias = "createdAt")]
    pub applied_at: DateTime<Utc>,
    /// Embedded scholarship details, when the backend includes them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scholarship: Option<ScholarshipSummary>,
}

/// What changed between two observations of the same application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First sighting; the application must be `PENDING`.
    Created,
    /// Status did not change.
    Unchanged,
    /// A permitted transition out of `PENDING`.
    Transitioned {
        /// Previous status.
        from: ApplicationStatus,
        /// New status.
        to: ApplicationStatus,
    },
    /// The backend reported a transition the lifecycle does not allow.
    Illegal {
        /// Previous status, or `None` for a first sighting.
        from: Option<ApplicationStatus>,
        /// Reported status.
        to: ApplicationStatus,
    },
}

/// Lifecycle rules for applications.
pub struct ApplicationLifecycle;

impl ApplicationLifecycle {
    /// Classify `current` against what was cached before.
    ///
    /// Freshly created applications are expected to be `PENDING`, but a
    /// first sighting via a list refresh may legitimately already be
    /// reviewed, so `observe_listed` relaxes that rule.
    pub fn observe(previous: Option<&Application>, current: &Application) -> Observation {
        match previous {
            None if current.status == ApplicationStatus::INITIAL => Observation::Created,
            None => Observation::Illegal {
                from: None,
                to: current.status,
            },
            Some(before) if before.status == current.status => Observation::Unchanged,
            Some(before) if before.status.can_transition_to(current.status) => {
                Observation::Transitioned {
                    from: before.status,
                    to: current.status,
                }
            }
            Some(before) => Observation::Illegal {
                from: Some(before.status),
                to: current.status,
            },
        }
    }

    /// Classify a refreshed list against the cached one, keyed by id.
    ///
    /// Applications seen for the first time in a list are reported as
    /// `Created` whatever their status, since review may have happened
    /// before this client ever cached them.
    pub fn observe_listed(
        cached: &[Application],
        refreshed: &[Application],
    ) -> Vec<(ApplicationId, Observation)> {
        refreshed
            .iter()
            .map(|current| {
                let previous = cached.iter().find(|item| item.id == current.id);
                let observation = match previous {
                    None => Observation::Created,
                    Some(_) => Self::observe(previous, current),
                };
                (current.id.clone(), observation)
            })
            .collect()
    }

    /// Whether `applications` already holds one for `scholarship_id`.
    pub fn already_applied(applications: &[Application], scholarship_id: &ScholarshipId) -> bool {
        applications
            .iter()
            .any(|application| &application.scholarship_id == scholarship_id)
    }
}
