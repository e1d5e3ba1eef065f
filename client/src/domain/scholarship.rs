//! Scholarship catalogue entities, admin drafts, list filters, and saved
//! marks.
//!
//! Scholarships are owned by the backend; the client keeps a read-mostly
//! cached copy and only builds [`NewScholarship`] payloads for admins.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Validation errors raised by catalogue constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScholarshipValidationError {
    /// Identifier was blank or padded with whitespace.
    InvalidId,
    /// A required text field was blank.
    EmptyField { field: &'static str },
    /// Apply link was not an absolute http(s) URL.
    InvalidApplyLink,
    /// Minimum GPA was negative or not finite.
    InvalidMinGpa,
    /// Filter minimum amount exceeded its maximum.
    InvertedAmountRange { min: u64, max: u64 },
}

impl fmt::Display for ScholarshipValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId => write!(f, "scholarship id must contain only letters, digits, `-` or `_`"),
            Self::EmptyField { field } => write!(f, "{field} is required"),
            Self::InvalidApplyLink => write!(f, "apply link must be a valid URL"),
            Self::InvalidMinGpa => write!(f, "minimum GPA must be zero or more"),
            Self::InvertedAmountRange { min, max } => {
                write!(f, "minimum amount {min} exceeds maximum amount {max}")
            }
        }
    }
}

impl std::error::Error for ScholarshipValidationError {}

/// Backend-assigned scholarship identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScholarshipId(String);

impl ScholarshipId {
    /// Validate an identifier.
    ///
    /// Identifiers are interpolated into request paths, so only ASCII
    /// letters, digits, `-` and `_` are accepted.
    ///
    /// # Examples
    /// ```
    /// use scholarship_portal::domain::ScholarshipId;
    ///
    /// assert!(ScholarshipId::new("sch-1").is_ok());
    /// assert!(ScholarshipId::new(" sch-1").is_err());
    /// assert!(ScholarshipId::new("sch-1?admin=1").is_err());
    /// ```
    pub fn new(raw: impl Into<String>) -> Result<Self, ScholarshipValidationError> {
        let raw = raw.into();
        let is_token = raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if raw.is_empty() || !is_token {
            return Err(ScholarshipValidationError::InvalidId);
        }
        Ok(Self(raw))
    }
}

impl AsRef<str> for ScholarshipId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ScholarshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<ScholarshipId> for String {
    fn from(value: ScholarshipId) -> Self {
        value.0
    }
}

impl TryFrom<String> for ScholarshipId {
    type Error = ScholarshipValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Funding source category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Central government scheme.
    Government,
    /// Privately funded.
    Private,
    /// State government scheme.
    State,
}

impl Category {
    /// Wire representation used in query strings.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Government => "GOVERNMENT",
            Self::Private => "PRIVATE",
            Self::State => "STATE",
        }
    }
}

/// Eligibility rules attached to a scholarship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    /// Free-text requirements.
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Minimum grade point average.
    #[serde(rename = "minGPA", default)]
    pub min_gpa: f32,
    /// Eligible academic years.
    #[serde(default)]
    pub year_levels: Vec<String>,
}

/// Cached catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scholarship {
    /// Identifier.
    pub id: ScholarshipId,
    /// Display name.
    pub name: String,
    /// Long description.
    pub description: String,
    /// Award amount in whole currency units.
    pub amount: u64,
    /// Application deadline.
    pub deadline: DateTime<Utc>,
    /// Funding category.
    pub category: Category,
    /// Awarding institution.
    pub institution: String,
    /// External application URL.
    pub apply_link: String,
    /// Eligibility rules.
    #[serde(default)]
    pub eligibility: Eligibility,
    /// Whether the entry is an unpublished admin draft.
    #[serde(default)]
    pub is_draft: bool,
}

/// Admin payload for `POST /admin/scholarships`.
///
/// Validated before dispatch; a failing draft never reaches the network.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScholarship {
    name: String,
    description: String,
    amount: u64,
    deadline: DateTime<Utc>,
    category: Category,
    eligibility: Eligibility,
    institution: String,
    apply_link: String,
    is_draft: bool,
}

/// Unvalidated admin form input for [`NewScholarship::try_from_draft`].
#[derive(Debug, Clone)]
pub struct ScholarshipDraft<'a> {
    /// Display name.
    pub name: &'a str,
    /// Long description.
    pub description: &'a str,
    /// Award amount.
    pub amount: u64,
    /// Deadline.
    pub deadline: DateTime<Utc>,
    /// Category.
    pub category: Category,
    /// Eligibility rules.
    pub eligibility: Eligibility,
    /// Awarding institution.
    pub institution: &'a str,
    /// External application URL.
    pub apply_link: &'a str,
    /// Save as draft rather than publish.
    pub is_draft: bool,
}

impl NewScholarship {
    /// Validate the admin form input.
    pub fn try_from_draft(draft: ScholarshipDraft<'_>) -> Result<Self, ScholarshipValidationError> {
        let name = required("name", draft.name)?;
        let description = required("description", draft.description)?;
        let institution = required("institution", draft.institution)?;
        let apply_link = Url::parse(draft.apply_link.trim())
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or(ScholarshipValidationError::InvalidApplyLink)?;
        if !draft.eligibility.min_gpa.is_finite() || draft.eligibility.min_gpa < 0.0 {
            return Err(ScholarshipValidationError::InvalidMinGpa);
        }
        Ok(Self {
            name,
            description,
            amount: draft.amount,
            deadline: draft.deadline,
            category: draft.category,
            eligibility: draft.eligibility,
            institution,
            apply_link: apply_link.into(),
            is_draft: draft.is_draft,
        })
    }

    /// Whether this payload is saved as a draft.
    pub const fn is_draft(&self) -> bool {
        self.is_draft
    }

    /// Display name.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ScholarshipValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ScholarshipValidationError::EmptyField { field });
    }
    Ok(trimmed.to_owned())
}

/// Sortable catalogue fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// Sort by deadline.
    Deadline,
    /// Sort by award amount.
    Amount,
    /// Sort by name.
    Name,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// Query filter for `GET /scholarships`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScholarshipFilter {
    /// Restrict to one category.
    pub category: Option<Category>,
    /// Minimum award amount.
    pub min_amount: Option<u64>,
    /// Maximum award amount.
    pub max_amount: Option<u64>,
    /// Only scholarships whose deadline is on or after this instant.
    pub deadline: Option<DateTime<Utc>>,
    /// Sort key.
    pub sort_by: Option<SortField>,
    /// Sort direction, sent only together with `sort_by`.
    pub order: SortOrder,
}

impl ScholarshipFilter {
    /// Check the filter and render it as query pairs.
    ///
    /// # Examples
    /// ```
    /// use scholarship_portal::domain::{Category, ScholarshipFilter};
    ///
    /// let filter = ScholarshipFilter {
    ///     category: Some(Category::State),
    ///     min_amount: Some(1000),
    ///     ..ScholarshipFilter::default()
    /// };
    /// let pairs = filter.to_query().unwrap();
    /// assert_eq!(pairs[0], ("category".to_owned(), "STATE".to_owned()));
    /// ```
    pub fn to_query(&self) -> Result<Vec<(String, String)>, ScholarshipValidationError> {
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(ScholarshipValidationError::InvertedAmountRange { min, max });
            }
        }
        let mut pairs = Vec::new();
        if let Some(category) = self.category {
            pairs.push(("category".to_owned(), category.as_str().to_owned()));
        }
        if let Some(min) = self.min_amount {
            pairs.push(("minAmount".to_owned(), min.to_string()));
        }
        if let Some(max) = self.max_amount {
            pairs.push(("maxAmount".to_owned(), max.to_string()));
        }
        if let Some(deadline) = self.deadline {
            pairs.push(("deadline".to_owned(), deadline.to_rfc3339()));
        }
        if let Some(sort_by) = self.sort_by {
            let field = match sort_by {
                SortField::Deadline => "deadline",
                SortField::Amount => "amount",
                SortField::Name => "name",
            };
            let order = match self.order {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            };
            pairs.push(("sortBy".to_owned(), field.to_owned()));
            pairs.push(("order".to_owned(), order.to_owned()));
        }
        Ok(pairs)
    }
}

/// Existence-only relation between the signed-in user and a scholarship.
///
/// The backend usually echoes the scholarship alongside the mark; when it
/// does not, only the id is cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedMark {
    /// Saved scholarship.
    pub scholarship_id: ScholarshipId,
    /// Catalogue entry, when known.
    #[serde(default)]
    pub scholarship: Option<Scholarship>,
}

impl SavedMark {
    /// Mark carrying a known catalogue entry.
    pub fn for_scholarship(scholarship: Scholarship) -> Self {
        Self {
            scholarship_id: scholarship.id.clone(),
            scholarship: Some(scholarship),
        }
    }

    /// Mark with only the id known.
    pub const fn bare(scholarship_id: ScholarshipId) -> Self {
        Self {
            scholarship_id,
            scholarship: None,
        }
    }
}
