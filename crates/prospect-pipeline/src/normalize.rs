//! Free-form attribute strings from the model mapped onto the closed
//! taxonomy enums.
//!
//! `prospect_core::taxonomy` parses only canonical storage spellings; the
//! derivation model answers with whatever phrasing it likes ("half a day",
//! "Chrome plugin", "Hard"). Matching here is ordered substring checks over
//! the lowercased input, with a defined default per attribute so a missing
//! or unrecognizable answer still lands on a legal value. Check order
//! matters: "half a day" must hit the half-day arm before the day arm, and
//! "rapid deployment tool" must hit the tool arm before the api arm
//! ("rapid" contains "api").

use prospect_core::{BuildEffort, CompetitionLevel, DerivativeType, ProductForm, SearchVolume};

#[must_use]
pub fn normalize_effort(raw: Option<&str>) -> BuildEffort {
    let Some(raw) = raw else {
        return BuildEffort::OneDay;
    };
    let lowered = raw.to_lowercase();
    let text = lowered.as_str();
    if text.contains("half") || text.contains("4h") || text.contains("4 h") {
        BuildEffort::HalfDay
    } else if text.contains("week") || text.contains("1w") {
        BuildEffort::OneWeek
    } else if text.contains("3d") || text.contains("3 d") || text.contains("three d") {
        BuildEffort::ThreeDays
    } else if text.contains("2h") || text.contains("2 h") || text.contains("two hour") {
        BuildEffort::TwoHours
    } else if text.contains("1d") || text.contains("day") {
        BuildEffort::OneDay
    } else if text.contains("hour") {
        BuildEffort::TwoHours
    } else {
        BuildEffort::OneDay
    }
}

#[must_use]
pub fn normalize_competition(raw: Option<&str>) -> CompetitionLevel {
    let Some(raw) = raw else {
        return CompetitionLevel::Unknown;
    };
    let lowered = raw.to_lowercase();
    let text = lowered.as_str();
    if text.contains("high")
        || text.contains("hard")
        || text.contains("crowded")
        || text.contains("saturated")
    {
        CompetitionLevel::High
    } else if text.contains("medium") || text.contains("moderate") || text.contains("mid") {
        CompetitionLevel::Medium
    } else if text.contains("low") || text.contains("easy") || text.contains("none") {
        CompetitionLevel::Low
    } else {
        CompetitionLevel::Unknown
    }
}

#[must_use]
pub fn normalize_volume(raw: Option<&str>) -> SearchVolume {
    let Some(raw) = raw else {
        return SearchVolume::Unknown;
    };
    let lowered = raw.to_lowercase();
    let text = lowered.as_str();
    if text.contains("high") {
        SearchVolume::High
    } else if text.contains("medium") || text.contains("moderate") || text.contains("mid") {
        SearchVolume::Medium
    } else if text.contains("low") {
        SearchVolume::Low
    } else if text.contains("none") || text.contains("zero") {
        SearchVolume::None
    } else {
        SearchVolume::Unknown
    }
}

#[must_use]
pub fn normalize_form(raw: Option<&str>) -> ProductForm {
    let Some(raw) = raw else {
        return ProductForm::Website;
    };
    let lowered = raw.to_lowercase();
    let text = lowered.as_str();
    if text.contains("template") {
        ProductForm::Template
    } else if text.contains("extension") || text.contains("plugin") || text.contains("addon") {
        ProductForm::Extension
    } else if text.contains("tool")
        || text.contains("calculator")
        || text.contains("generator")
        || text.contains("app")
    {
        ProductForm::Tool
    } else if text.contains("api") || text.contains("endpoint") {
        ProductForm::Api
    } else if text.contains("site")
        || text.contains("blog")
        || text.contains("directory")
        || text.contains("web")
    {
        ProductForm::Website
    } else {
        ProductForm::Website
    }
}

#[must_use]
pub fn normalize_derivative_type(raw: Option<&str>) -> DerivativeType {
    let Some(raw) = raw else {
        return DerivativeType::Tool;
    };
    let lowered = raw.to_lowercase();
    let text = lowered.as_str();
    if text.contains("newsletter") || text.contains("digest") {
        DerivativeType::Newsletter
    } else if text.contains("template") {
        DerivativeType::TemplatePack
    } else if text.contains("extension") || text.contains("plugin") || text.contains("addon") {
        DerivativeType::BrowserExtension
    } else if text.contains("content")
        || text.contains("site")
        || text.contains("blog")
        || text.contains("directory")
    {
        DerivativeType::ContentSite
    } else if text.contains("tool")
        || text.contains("app")
        || text.contains("calculator")
        || text.contains("generator")
    {
        DerivativeType::Tool
    } else if text.contains("api") || text.contains("service") {
        DerivativeType::ApiService
    } else {
        DerivativeType::Tool
    }
}

/// Model scores arrive as floats; storage wants a 0-100 smallint.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn score_to_smallint(score: f64) -> i16 {
    score.round().clamp(0.0, 100.0) as i16
}
