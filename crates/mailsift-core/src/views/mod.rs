//! View resolution.
//!
//! A [`ViewConfiguration`] names a view type and a declarative group-by key.
//! Resolving it yields a [`ResolvedView`] whose grouping function maps a
//! message to its criterion value. All configurations of an extraction are
//! resolved before the traversal starts, so a bad configuration never fails
//! mid-traversal.

use std::collections::HashSet;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::archive::MessageNode;
use crate::model::ViewType;

/// Criterion used when the grouped field is missing.
pub const DEFAULT_FALLBACK: &str = "unknown";

/// Errors raised while resolving view configurations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    /// The view type is empty.
    #[error("View type must not be empty")]
    EmptyType,

    /// The group-by key is not known.
    #[error("Unknown group-by key '{group_by}' for view '{view_type}'")]
    UnknownGroupBy {
        /// View being resolved.
        view_type: String,
        /// Offending key.
        group_by: String,
    },

    /// Two configurations share a view type.
    #[error("Duplicate view type '{0}'")]
    DuplicateType(String),
}

/// Declarative description of one view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewConfiguration {
    /// View type the grouping is stored under.
    #[serde(rename = "type")]
    pub view_type: String,
    /// Group-by key, see [`GroupBy`].
    pub group_by: String,
    /// Criterion used when the grouped field is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl ViewConfiguration {
    /// Creates a configuration without a custom fallback.
    #[must_use]
    pub fn new(view_type: impl Into<String>, group_by: impl Into<String>) -> Self {
        Self {
            view_type: view_type.into(),
            group_by: group_by.into(),
            fallback: None,
        }
    }
}

/// Supported group-by keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// Lower-cased domain of the sender address.
    Domain,
    /// UTC year of the delivery time.
    Year,
    /// `YYYY-MM` of the delivery time.
    Month,
    /// Lower-cased sender address, or the sender name without one.
    Correspondent,
    /// `"true"` or `"false"`.
    HasAttachments,
}

impl GroupBy {
    /// Parse from the configuration key.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "domain" => Some(Self::Domain),
            "year" => Some(Self::Year),
            "month" => Some(Self::Month),
            "correspondent" => Some(Self::Correspondent),
            "has-attachments" => Some(Self::HasAttachments),
            _ => None,
        }
    }

    /// Convert to the configuration key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Year => "year",
            Self::Month => "month",
            Self::Correspondent => "correspondent",
            Self::HasAttachments => "has-attachments",
        }
    }

    /// Computes the criterion of a message, `None` when the field is missing.
    fn criterion(self, message: &dyn MessageNode) -> Option<String> {
        match self {
            Self::Domain => message
                .sender_email()
                .rsplit_once('@')
                .map(|(_, domain)| domain.trim().to_lowercase())
                .filter(|domain| !domain.is_empty()),
            Self::Year => message.delivery_time().map(|t| t.year().to_string()),
            Self::Month => message
                .delivery_time()
                .map(|t| format!("{:04}-{:02}", t.year(), t.month())),
            Self::Correspondent => {
                let email = message.sender_email().trim();
                let name = message.sender_name().trim();
                if !email.is_empty() {
                    Some(email.to_lowercase())
                } else if !name.is_empty() {
                    Some(name.to_string())
                } else {
                    None
                }
            }
            Self::HasAttachments => Some(message.has_attachments().to_string()),
        }
    }
}

/// A view ready to be applied during traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedView {
    view_type: ViewType,
    group_by: GroupBy,
    fallback: String,
}

impl ResolvedView {
    /// View type the grouping is stored under.
    #[must_use]
    pub const fn view_type(&self) -> &ViewType {
        &self.view_type
    }

    /// Computes the criterion value a message is grouped under.
    #[must_use]
    pub fn group(&self, message: &dyn MessageNode) -> String {
        self.group_by
            .criterion(message)
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Resolves a single configuration.
///
/// # Errors
///
/// Returns an error if the view type is empty or the group-by key is unknown.
pub fn resolve(config: &ViewConfiguration) -> Result<ResolvedView, ViewError> {
    let view_type = config.view_type.trim();
    if view_type.is_empty() {
        return Err(ViewError::EmptyType);
    }

    let group_by = GroupBy::parse(config.group_by.trim()).ok_or_else(|| {
        ViewError::UnknownGroupBy {
            view_type: view_type.to_string(),
            group_by: config.group_by.clone(),
        }
    })?;

    Ok(ResolvedView {
        view_type: ViewType::new(view_type),
        group_by,
        fallback: config
            .fallback
            .clone()
            .unwrap_or_else(|| DEFAULT_FALLBACK.to_string()),
    })
}

/// Resolves every configuration of an extraction run.
///
/// # Errors
///
/// Returns the first resolution error, or [`ViewError::DuplicateType`] if two
/// configurations share a view type.
pub fn resolve_all(configs: &[ViewConfiguration]) -> Result<Vec<ResolvedView>, ViewError> {
    let mut seen = HashSet::new();
    configs
        .iter()
        .map(|config| {
            let view = resolve(config)?;
            if seen.insert(view.view_type.clone()) {
                Ok(view)
            } else {
                Err(ViewError::DuplicateType(view.view_type.0))
            }
        })
        .collect()
}

/// The configurations used when an extraction does not supply its own.
#[must_use]
pub fn builtin_view_configs() -> Vec<ViewConfiguration> {
    vec![
        ViewConfiguration::new("domain", GroupBy::Domain.as_str()),
        ViewConfiguration::new("year", GroupBy::Year.as_str()),
        ViewConfiguration::new("correspondent", GroupBy::Correspondent.as_str()),
    ]
}
