//! Signal evaluation stage: raw signals in, scored opportunities out.
//!
//! Signals are clustered into topic groups, each group is assessed by the
//! model across the configured scoring dimensions, then walked through four
//! gates in order: hard viability cutoff, semantic dedup against recent
//! opportunities, slug collision, and the weighted-score threshold. Signals
//! belonging to a decided group are consumed (merged members dismissed, the
//! rest marked evaluated) whatever the verdict; groups the router could not
//! assess stay raw for the next run.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use prospect_ai::GenerateRequest;
use prospect_core::text::{jaccard, slugify, topic_words};
use prospect_core::{ScoringConfig, WindowStatus, VIABILITY_DIMENSION};
use prospect_db::{NewOpportunity, TopicSource};

use crate::cluster::{group_by_topic, TopicGroup};
use crate::error::PipelineError;
use crate::normalize::score_to_smallint;
use crate::{PipelineContext, StageSummary};

const STAGE: &str = "evaluate";
/// How many recent opportunities the dedup gate compares against.
const RECENT_TOPICS_LIMIT: i64 = 100;
/// Assumed demand window when the model gives no estimate.
const DEFAULT_WINDOW_DAYS: i64 = 30;

/// The model's structured verdict on one topic group. Stored verbatim in the
/// opportunity's `assessment` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicAssessment {
    pub title: String,
    pub target_keyword: String,
    #[serde(default)]
    pub secondary_keywords: Vec<String>,
    #[serde(default)]
    pub dimensions: BTreeMap<String, f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub demand_window_days: Option<i64>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Evaluate one batch of raw signals.
///
/// # Errors
///
/// Returns `PipelineError` on database failure. Model and budget conditions
/// are handled by skipping or stopping, never by erroring.
pub async fn run_evaluate(ctx: &PipelineContext) -> Result<StageSummary, PipelineError> {
    let mut summary = StageSummary::default();

    let budget = ctx.budget.status().await?;
    if budget.exceeded {
        warn!(
            spent = %budget.spent_today,
            limit = %budget.daily_limit,
            "daily budget exhausted, skipping evaluation run"
        );
        return Ok(summary);
    }

    let signals = prospect_db::list_raw_signals(&ctx.pool, ctx.evaluate_batch).await?;
    if signals.is_empty() {
        info!("no raw signals to evaluate");
        return Ok(summary);
    }

    let groups = group_by_topic(&signals);
    let recent = prospect_db::recent_topic_sources(&ctx.pool, RECENT_TOPICS_LIMIT).await?;
    info!(
        signals = signals.len(),
        groups = groups.len(),
        "evaluating signal topics"
    );

    for group in &groups {
        let budget = ctx.budget.status().await?;
        if budget.exceeded {
            warn!(
                processed = summary.processed,
                "daily budget reached mid-run, stopping evaluation"
            );
            break;
        }
        summary.processed += 1;

        let request = assessment_request(&ctx.scoring, group);
        let Some(assessment) = ctx.assisted_json::<TopicAssessment>(STAGE, &request).await?
        else {
            debug!(signal = group.primary_id, "no usable assessment, leaving signals raw");
            continue;
        };

        match settle_group(ctx, group, &assessment, &recent).await? {
            Outcome::Created => summary.created += 1,
            Outcome::Rejected => summary.rejected += 1,
            Outcome::AlreadyCovered | Outcome::Unusable => {}
        }
    }

    info!(
        processed = summary.processed,
        created = summary.created,
        rejected = summary.rejected,
        "evaluation run finished"
    );
    Ok(summary)
}

enum Outcome {
    Created,
    Rejected,
    /// Slug collision; the topic already has an opportunity row.
    AlreadyCovered,
    /// Assessment too degenerate to act on; signals stay raw.
    Unusable,
}

async fn settle_group(
    ctx: &PipelineContext,
    group: &TopicGroup,
    assessment: &TopicAssessment,
    recent: &[TopicSource],
) -> Result<Outcome, PipelineError> {
    let thresholds = &ctx.scoring.thresholds;

    if !passes_viability(&assessment.dimensions, thresholds.min_viability) {
        debug!(
            signal = group.primary_id,
            title = %assessment.title,
            "below viability floor, rejecting without persisting"
        );
        consume_signals(ctx, group).await?;
        return Ok(Outcome::Rejected);
    }

    if is_duplicate_topic(
        &assessment.title,
        &assessment.target_keyword,
        recent,
        thresholds.duplicate_similarity,
    ) {
        debug!(
            signal = group.primary_id,
            title = %assessment.title,
            "duplicate coverage of a recent opportunity, rejecting"
        );
        consume_signals(ctx, group).await?;
        return Ok(Outcome::Rejected);
    }

    let mut slug = slugify(&assessment.title);
    if slug.is_empty() {
        slug = slugify(&assessment.target_keyword);
    }
    if slug.is_empty() {
        warn!(
            signal = group.primary_id,
            title = %assessment.title,
            "assessment produced no usable slug, leaving signals raw"
        );
        return Ok(Outcome::Unusable);
    }
    if prospect_db::opportunity_slug_exists(&ctx.pool, &slug).await? {
        debug!(slug = %slug, "opportunity already exists");
        consume_signals(ctx, group).await?;
        return Ok(Outcome::AlreadyCovered);
    }

    let weighted = ctx.scoring.weighted_score(&assessment.dimensions);
    let (status, reason) = if weighted >= thresholds.min_weighted_score {
        ("evaluated", None)
    } else {
        (
            "rejected",
            Some(format!(
                "weighted score {weighted:.1} below threshold {:.0}",
                thresholds.min_weighted_score
            )),
        )
    };

    let window_days = assessment.demand_window_days.unwrap_or(DEFAULT_WINDOW_DAYS);
    let window = WindowStatus::from_days_remaining(window_days);
    let closes_at = Utc::now() + Duration::days(window_days);

    let opportunity = NewOpportunity {
        signal_ids: json!(group.signal_ids),
        title: &assessment.title,
        slug: &slug,
        target_keyword: &assessment.target_keyword,
        secondary_keywords: json!(assessment.secondary_keywords),
        category: assessment.category.as_deref(),
        score_breakdown: json!(assessment.dimensions),
        weighted_score: score_to_smallint(weighted),
        window_status: window.as_str(),
        window_closes_at: Some(closes_at),
        status,
        decision_reason: reason.as_deref(),
        assessment: json!(assessment),
    };

    let Some(id) = prospect_db::insert_opportunity(&ctx.pool, &opportunity).await? else {
        // Lost a slug race within this run; same as the pre-check above.
        debug!(slug = %slug, "opportunity slug taken concurrently");
        consume_signals(ctx, group).await?;
        return Ok(Outcome::AlreadyCovered);
    };

    info!(
        id,
        slug = %slug,
        score = weighted,
        status,
        window = window.as_str(),
        "opportunity persisted"
    );
    consume_signals(ctx, group).await?;

    if status == "evaluated" {
        Ok(Outcome::Created)
    } else {
        Ok(Outcome::Rejected)
    }
}

/// Dismiss the merged members, then mark everything still raw as evaluated.
async fn consume_signals(ctx: &PipelineContext, group: &TopicGroup) -> Result<(), PipelineError> {
    prospect_db::dismiss_merged_signals(&ctx.pool, &group.merged_ids, group.primary_id).await?;
    prospect_db::mark_signals_evaluated(&ctx.pool, &group.signal_ids).await?;
    Ok(())
}

fn assessment_request(scoring: &ScoringConfig, group: &TopicGroup) -> GenerateRequest {
    let dimensions = scoring.dimension_names().join(", ");
    let description = group.description.as_deref().unwrap_or("(no description)");
    let prompt = format!(
        "Assess this product-opportunity signal.\n\n\
         Title: {title}\n\
         Details: {description}\n\
         Source: {source} ({upvotes} upvotes, {comments} comments)\n\n\
         Score each dimension from 0 to 100: {dimensions}.\n\n\
         Reply with a single JSON object:\n\
         {{\"title\": \"concise product-idea title\",\n\
          \"target_keyword\": \"primary search keyword\",\n\
          \"secondary_keywords\": [\"up to 5 related keywords\"],\n\
          \"dimensions\": {{\"<dimension>\": <0-100>, ...}},\n\
          \"category\": \"one- or two-word category\",\n\
          \"demand_window_days\": <estimated days before the moment passes>,\n\
          \"summary\": \"two sentences on the opportunity\"}}",
        title = group.title,
        description = description,
        source = group.source,
        upvotes = group.upvotes,
        comments = group.comment_count,
        dimensions = dimensions,
    );
    GenerateRequest::new(prompt)
        .with_system(
            "You evaluate demand signals for micro-product opportunities. \
             Answer with strict JSON only.",
        )
        .with_max_tokens(768)
}

/// The viability dimension alone can sink a topic; a missing value counts
/// as zero.
fn passes_viability(dimensions: &BTreeMap<String, f64>, min_viability: f64) -> bool {
    dimensions
        .get(VIABILITY_DIMENSION)
        .copied()
        .unwrap_or(0.0)
        >= min_viability
}

/// Whether `title + keyword` word-overlaps any recent opportunity at or
/// above `threshold`.
fn is_duplicate_topic(
    title: &str,
    target_keyword: &str,
    recent: &[TopicSource],
    threshold: f64,
) -> bool {
    let candidate = topic_words(&format!("{title} {target_keyword}"));
    recent.iter().any(|existing| {
        let words = topic_words(&format!("{} {}", existing.title, existing.target_keyword));
        jaccard(&candidate, &words) >= threshold
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> TopicGroup {
        TopicGroup {
            primary_id: 1,
            title: "struggling to chase overdue invoices".to_string(),
            description: Some("Clients pay late and nothing tracks it.".to_string()),
            source: "reddit".to_string(),
            source_url: None,
            upvotes: 12,
            comment_count: 4,
            signal_ids: vec![1],
            merged_ids: vec![],
        }
    }

    #[test]
    fn viability_floor_overrides_strong_dimensions() {
        let mut dimensions = BTreeMap::new();
        dimensions.insert(VIABILITY_DIMENSION.to_string(), 20.0);
        dimensions.insert("demand_urgency".to_string(), 90.0);
        dimensions.insert("solo_buildability".to_string(), 90.0);
        dimensions.insert("search_potential".to_string(), 90.0);
        assert!(!passes_viability(&dimensions, 30.0));
    }

    #[test]
    fn missing_viability_counts_as_zero() {
        let mut dimensions = BTreeMap::new();
        dimensions.insert("demand_urgency".to_string(), 95.0);
        assert!(!passes_viability(&dimensions, 30.0));
        assert!(passes_viability(&dimensions, 0.0));
    }

    #[test]
    fn near_identical_topics_count_as_duplicates() {
        let recent = vec![TopicSource {
            title: "Invoice deadline alerts".to_string(),
            target_keyword: "invoice deadline calculator".to_string(),
        }];
        // Word sets overlap at 3/5 = 0.6, past the 0.35 threshold.
        assert!(is_duplicate_topic(
            "Invoice deadline tracker",
            "invoice deadline calculator",
            &recent,
            0.35,
        ));
    }

    #[test]
    fn unrelated_topics_are_not_duplicates() {
        let recent = vec![TopicSource {
            title: "Dog grooming booking".to_string(),
            target_keyword: "dog groomer app".to_string(),
        }];
        assert!(!is_duplicate_topic(
            "Invoice deadline tracker",
            "invoice deadline calculator",
            &recent,
            0.35,
        ));
    }

    #[test]
    fn assessment_prompt_carries_group_and_dimensions() {
        let scoring = ScoringConfig::default();
        let request = assessment_request(&scoring, &group());
        assert!(request.prompt.contains("struggling to chase overdue invoices"));
        assert!(request.prompt.contains(VIABILITY_DIMENSION));
        assert!(request.system.is_some());
    }
}
