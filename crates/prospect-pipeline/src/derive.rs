//! Derivative generation stage: accepted opportunities in, concrete product
//! concepts out.
//!
//! Each qualifying opportunity (scored high enough, no derivatives yet) is
//! turned into up to a handful of ideas by the model. Ideas pass through
//! local filters before anything is persisted: minimum score, enum
//! normalisation, slug collision, and a keyword-overlap check against every
//! non-rejected derivative from the trailing thirty days. Overlapping ideas
//! are persisted as rejected so the suppression is visible; everything else
//! lands with status `derived` for the validation gates.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use prospect_ai::GenerateRequest;
use prospect_core::text::slugify;
use prospect_db::{NewDerivedProduct, OpportunityRow};

use crate::error::PipelineError;
use crate::normalize::{
    normalize_competition, normalize_derivative_type, normalize_effort, normalize_form,
    normalize_volume, score_to_smallint,
};
use crate::{PipelineContext, StageSummary};

const STAGE: &str = "derive";
/// Overlap window for keyword suppression.
const OVERLAP_WINDOW_DAYS: i64 = 30;
/// Fraction of a new idea's keywords that must overlap before suppression.
const OVERLAP_THRESHOLD: f64 = 0.5;

#[derive(Debug, Deserialize)]
struct IdeaList {
    #[serde(default)]
    ideas: Vec<DerivativeIdea>,
}

/// One generated product concept, as the model shapes it. Stored verbatim in
/// the derivative's `idea_snapshot` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivativeIdea {
    pub title: String,
    #[serde(default)]
    pub derivative_type: Option<String>,
    #[serde(default)]
    pub product_form: Option<String>,
    #[serde(default)]
    pub build_effort: Option<String>,
    #[serde(default)]
    pub competition_level: Option<String>,
    #[serde(default)]
    pub search_volume: Option<String>,
    #[serde(default)]
    pub target_keywords: Vec<String>,
    #[serde(default)]
    pub monetization: Vec<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Generate derivatives for one batch of qualifying opportunities.
///
/// # Errors
///
/// Returns `PipelineError` on database failure. Model and budget conditions
/// are handled by skipping or stopping, never by erroring.
pub async fn run_derive(ctx: &PipelineContext) -> Result<StageSummary, PipelineError> {
    let mut summary = StageSummary::default();

    let budget = ctx.budget.status().await?;
    if budget.exceeded {
        warn!(
            spent = %budget.spent_today,
            limit = %budget.daily_limit,
            "daily budget exhausted, skipping derivation run"
        );
        return Ok(summary);
    }

    let candidates = prospect_db::list_derivation_candidates(
        &ctx.pool,
        ctx.scoring.thresholds.derivation_min_score,
        ctx.derive_batch,
    )
    .await?;
    if candidates.is_empty() {
        info!("no opportunities awaiting derivation");
        return Ok(summary);
    }
    info!(candidates = candidates.len(), "deriving product concepts");

    for opportunity in &candidates {
        let budget = ctx.budget.status().await?;
        if budget.exceeded {
            warn!(
                processed = summary.processed,
                "daily budget reached mid-run, stopping derivation"
            );
            break;
        }
        summary.processed += 1;

        let request =
            derivation_request(opportunity, ctx.scoring.thresholds.max_derivatives_per_opportunity);
        let Some(list) = ctx.assisted_json::<IdeaList>(STAGE, &request).await? else {
            debug!(slug = %opportunity.slug, "no usable idea list, leaving opportunity for the next run");
            continue;
        };
        if list.ideas.is_empty() {
            debug!(slug = %opportunity.slug, "model returned no ideas");
            continue;
        }

        // Everything persisted (and not rejected) in the last thirty days,
        // plus the ideas accepted earlier in this very loop.
        let since = Utc::now() - Duration::days(OVERLAP_WINDOW_DAYS);
        let mut existing: Vec<(String, Vec<String>)> =
            prospect_db::list_recent_derivative_keywords(&ctx.pool, since)
                .await?
                .iter()
                .map(|row| (row.slug.clone(), row.keywords()))
                .collect();

        let limit = ctx.scoring.thresholds.max_derivatives_per_opportunity;
        for idea in list.ideas.iter().take(limit) {
            match settle_idea(ctx, opportunity, idea, &existing).await? {
                IdeaOutcome::Created { slug } => {
                    summary.created += 1;
                    existing.push((slug, idea.target_keywords.clone()));
                }
                IdeaOutcome::Rejected => summary.rejected += 1,
                IdeaOutcome::Dropped => {}
            }
        }
    }

    info!(
        processed = summary.processed,
        created = summary.created,
        rejected = summary.rejected,
        "derivation run finished"
    );
    Ok(summary)
}

enum IdeaOutcome {
    Created { slug: String },
    Rejected,
    Dropped,
}

async fn settle_idea(
    ctx: &PipelineContext,
    opportunity: &OpportunityRow,
    idea: &DerivativeIdea,
    existing: &[(String, Vec<String>)],
) -> Result<IdeaOutcome, PipelineError> {
    if idea.score < ctx.scoring.thresholds.min_derivative_score {
        debug!(title = %idea.title, score = idea.score, "idea below score floor, discarding");
        return Ok(IdeaOutcome::Dropped);
    }

    let slug = slugify(&idea.title);
    if slug.is_empty() {
        warn!(title = %idea.title, "idea title produced no usable slug, discarding");
        return Ok(IdeaOutcome::Dropped);
    }
    if prospect_db::derivative_slug_exists(&ctx.pool, &slug).await? {
        debug!(slug = %slug, "derivative already exists");
        return Ok(IdeaOutcome::Dropped);
    }

    let overlap = existing
        .iter()
        .map(|(other_slug, keywords)| {
            (other_slug, keyword_overlap_ratio(&idea.target_keywords, keywords))
        })
        .find(|&(_, ratio)| ratio >= OVERLAP_THRESHOLD);

    let (status, reason) = match overlap {
        Some((other_slug, ratio)) => (
            "rejected",
            Some(format!(
                "keyword overlap {:.0}% with recent derivative {other_slug}",
                ratio * 100.0
            )),
        ),
        None => ("derived", None),
    };

    let product = NewDerivedProduct {
        opportunity_id: opportunity.id,
        derivative_type: normalize_derivative_type(idea.derivative_type.as_deref()).as_str(),
        title: &idea.title,
        slug: &slug,
        target_keywords: json!(idea.target_keywords),
        build_effort: normalize_effort(idea.build_effort.as_deref()).as_str(),
        competition_level: normalize_competition(idea.competition_level.as_deref()).as_str(),
        search_volume: normalize_volume(idea.search_volume.as_deref()).as_str(),
        product_form: normalize_form(idea.product_form.as_deref()).as_str(),
        monetization: json!(idea.monetization),
        score: score_to_smallint(idea.score),
        status,
        rejection_reason: reason.as_deref(),
        idea_snapshot: json!(idea),
    };

    let Some(id) = prospect_db::insert_derived_product(&ctx.pool, &product).await? else {
        debug!(slug = %slug, "derivative slug taken concurrently");
        return Ok(IdeaOutcome::Dropped);
    };

    info!(id, slug = %slug, status, score = idea.score, "derivative persisted");
    if status == "derived" {
        Ok(IdeaOutcome::Created { slug })
    } else {
        Ok(IdeaOutcome::Rejected)
    }
}

fn derivation_request(opportunity: &OpportunityRow, max_ideas: usize) -> GenerateRequest {
    let secondary: Vec<&str> = opportunity
        .secondary_keywords
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let prompt = format!(
        "Opportunity: {title}\n\
         Target keyword: {keyword}\n\
         Secondary keywords: {secondary}\n\
         Category: {category}\n\
         Weighted score: {score}/100\n\n\
         Propose up to {max_ideas} small, single-purpose products a solo builder \
         could ship to capture this demand.\n\n\
         Reply with a single JSON object:\n\
         {{\"ideas\": [{{\n\
           \"title\": \"specific product name\",\n\
           \"derivative_type\": \"tool|content_site|browser_extension|api_service|template_pack|newsletter\",\n\
           \"product_form\": \"website|tool|extension|api|template\",\n\
           \"build_effort\": \"2h|4h|1d|3d|1w\",\n\
           \"competition_level\": \"low|medium|high\",\n\
           \"search_volume\": \"high|medium|low|none\",\n\
           \"target_keywords\": [\"3 to 6 search keywords\"],\n\
           \"monetization\": [\"adsense\", \"affiliate\", \"paid\", ...],\n\
           \"score\": <0-100 confidence>,\n\
           \"rationale\": \"one sentence\"}}]}}",
        title = opportunity.title,
        keyword = opportunity.target_keyword,
        secondary = secondary.join(", "),
        category = opportunity.category.as_deref().unwrap_or("uncategorized"),
        score = opportunity.weighted_score,
        max_ideas = max_ideas,
    );
    GenerateRequest::new(prompt)
        .with_system(
            "You design tiny derivative products for validated demand. \
             Answer with strict JSON only.",
        )
        .with_max_tokens(1536)
}

/// Fraction of `new` keywords that overlap `existing` by case-insensitive
/// substring containment in either direction. Blank keywords never match.
#[allow(clippy::cast_precision_loss)]
fn keyword_overlap_ratio(new: &[String], existing: &[String]) -> f64 {
    if new.is_empty() {
        return 0.0;
    }
    let matched = new
        .iter()
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .filter(|kw| {
            existing
                .iter()
                .map(|old| old.trim().to_lowercase())
                .filter(|old| !old.is_empty())
                .any(|old| kw.contains(&old) || old.contains(kw))
        })
        .count();
    matched as f64 / new.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn half_overlap_reaches_the_suppression_threshold() {
        // One of two keywords is a substring of an existing keyword, so the
        // ratio is exactly 0.5 and the idea must be suppressed.
        let new = strings(&["seedance tutorial", "seedance guide"]);
        let existing = strings(&["seedance tutorial 2024"]);
        let ratio = keyword_overlap_ratio(&new, &existing);
        assert!((ratio - 0.5).abs() < 1e-9);
        assert!(ratio >= OVERLAP_THRESHOLD);
    }

    #[test]
    fn containment_counts_in_both_directions() {
        let new = strings(&["invoice tracker"]);
        let existing = strings(&["free invoice tracker online"]);
        assert!((keyword_overlap_ratio(&new, &existing) - 1.0).abs() < 1e-9);

        let new = strings(&["free invoice tracker online"]);
        let existing = strings(&["invoice tracker"]);
        assert!((keyword_overlap_ratio(&new, &existing) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn comparison_ignores_case() {
        let new = strings(&["Seedance Tutorial"]);
        let existing = strings(&["seedance tutorial"]);
        assert!((keyword_overlap_ratio(&new, &existing) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn low_overlap_stays_below_the_threshold() {
        let new = strings(&["crop planner", "frost date lookup", "seed spacing chart"]);
        let existing = strings(&["seed spacing calculator", "seed spacing chart"]);
        let ratio = keyword_overlap_ratio(&new, &existing);
        assert!((ratio - 1.0 / 3.0).abs() < 1e-9);
        assert!(ratio < OVERLAP_THRESHOLD);
    }

    #[test]
    fn blank_keywords_never_match() {
        let new = strings(&["", "invoice tracker"]);
        let existing = strings(&[""]);
        assert!(keyword_overlap_ratio(&new, &existing).abs() < 1e-9);
    }

    #[test]
    fn no_keywords_means_no_overlap() {
        assert!(keyword_overlap_ratio(&[], &strings(&["anything"])).abs() < 1e-9);
    }
}
