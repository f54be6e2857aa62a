//! Closed value sets for derived-product attributes. The generator receives
//! free-form strings from the model and maps them onto these enums before
//! anything is persisted; parsing here is strict and only accepts the
//! canonical storage spelling.

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivativeType {
    Tool,
    ContentSite,
    BrowserExtension,
    ApiService,
    TemplatePack,
    Newsletter,
}

impl DerivativeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DerivativeType::Tool => "tool",
            DerivativeType::ContentSite => "content_site",
            DerivativeType::BrowserExtension => "browser_extension",
            DerivativeType::ApiService => "api_service",
            DerivativeType::TemplatePack => "template_pack",
            DerivativeType::Newsletter => "newsletter",
        }
    }

    /// Parse the canonical storage string.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidEnum` for anything outside the closed set.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "tool" => Ok(DerivativeType::Tool),
            "content_site" => Ok(DerivativeType::ContentSite),
            "browser_extension" => Ok(DerivativeType::BrowserExtension),
            "api_service" => Ok(DerivativeType::ApiService),
            "template_pack" => Ok(DerivativeType::TemplatePack),
            "newsletter" => Ok(DerivativeType::Newsletter),
            other => Err(CoreError::InvalidEnum {
                kind: "derivative type",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for DerivativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Estimated build effort, stored as compact duration labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildEffort {
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    HalfDay,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
}

impl BuildEffort {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BuildEffort::TwoHours => "2h",
            BuildEffort::HalfDay => "4h",
            BuildEffort::OneDay => "1d",
            BuildEffort::ThreeDays => "3d",
            BuildEffort::OneWeek => "1w",
        }
    }

    /// Parse the canonical storage string.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidEnum` for anything outside the closed set.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "2h" => Ok(BuildEffort::TwoHours),
            "4h" => Ok(BuildEffort::HalfDay),
            "1d" => Ok(BuildEffort::OneDay),
            "3d" => Ok(BuildEffort::ThreeDays),
            "1w" => Ok(BuildEffort::OneWeek),
            other => Err(CoreError::InvalidEnum {
                kind: "build effort",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for BuildEffort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl CompetitionLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompetitionLevel::Low => "low",
            CompetitionLevel::Medium => "medium",
            CompetitionLevel::High => "high",
            CompetitionLevel::Unknown => "unknown",
        }
    }

    /// Parse the canonical storage string.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidEnum` for anything outside the closed set.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "low" => Ok(CompetitionLevel::Low),
            "medium" => Ok(CompetitionLevel::Medium),
            "high" => Ok(CompetitionLevel::High),
            "unknown" => Ok(CompetitionLevel::Unknown),
            other => Err(CoreError::InvalidEnum {
                kind: "competition level",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for CompetitionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchVolume {
    High,
    Medium,
    Low,
    None,
    Unknown,
}

impl SearchVolume {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SearchVolume::High => "high",
            SearchVolume::Medium => "medium",
            SearchVolume::Low => "low",
            SearchVolume::None => "none",
            SearchVolume::Unknown => "unknown",
        }
    }

    /// Volume tier from an aggregate suggestion count.
    #[must_use]
    pub fn from_suggestion_count(count: usize) -> Self {
        if count >= 15 {
            SearchVolume::High
        } else if count >= 8 {
            SearchVolume::Medium
        } else if count >= 3 {
            SearchVolume::Low
        } else {
            SearchVolume::None
        }
    }

    /// Parse the canonical storage string.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidEnum` for anything outside the closed set.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "high" => Ok(SearchVolume::High),
            "medium" => Ok(SearchVolume::Medium),
            "low" => Ok(SearchVolume::Low),
            "none" => Ok(SearchVolume::None),
            "unknown" => Ok(SearchVolume::Unknown),
            other => Err(CoreError::InvalidEnum {
                kind: "search volume",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for SearchVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductForm {
    Website,
    Tool,
    Extension,
    Api,
    Template,
}

impl ProductForm {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProductForm::Website => "website",
            ProductForm::Tool => "tool",
            ProductForm::Extension => "extension",
            ProductForm::Api => "api",
            ProductForm::Template => "template",
        }
    }

    /// Parse the canonical storage string.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidEnum` for anything outside the closed set.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "website" => Ok(ProductForm::Website),
            "tool" => Ok(ProductForm::Tool),
            "extension" => Ok(ProductForm::Extension),
            "api" => Ok(ProductForm::Api),
            "template" => Ok(ProductForm::Template),
            other => Err(CoreError::InvalidEnum {
                kind: "product form",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ProductForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
