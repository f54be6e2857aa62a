//! Keyword validation gate for derived products.
//!
//! The cheapest possible demand probe: keyless autocomplete suggestions for
//! up to four of the derivative's target keywords. The aggregate suggestion
//! count maps to a volume tier, suggestion diversity plus the recorded
//! competition level give a difficulty estimate, and the pair decides
//! pass or reject. Like the competitive gate, the validation row is unique
//! per derivative and a re-run skips everything already decided.

use std::collections::HashSet;

use serde_json::json;
use tracing::{debug, info, warn};

use prospect_core::SearchVolume;
use prospect_db::{DerivedProductRow, NewKeywordValidation};

use crate::error::PipelineError;
use crate::{PipelineContext, StageSummary};

/// How many of the derivative's keywords are probed.
const MAX_KEYWORDS_PER_ITEM: usize = 4;
/// How many suggestions are kept in the stored sample.
const SAMPLE_LIMIT: usize = 10;
/// Distinct suggestions at or above this imply a contested keyword space.
const DIVERSITY_MODERATE: usize = 20;
/// Distinct suggestions at or above this imply at least some interest.
const DIVERSITY_EASY: usize = 5;

/// Run the keyword gate over one batch of derived products.
///
/// # Errors
///
/// Returns `PipelineError` on database failure. Suggestion-fetch failures
/// and budget conditions are handled by skipping or stopping, never by
/// erroring.
pub async fn run_keywords(ctx: &PipelineContext) -> Result<StageSummary, PipelineError> {
    let mut summary = StageSummary::default();

    let budget = ctx.budget.status().await?;
    if budget.exceeded {
        warn!(
            spent = %budget.spent_today,
            limit = %budget.daily_limit,
            "daily budget exhausted, skipping keyword validation run"
        );
        return Ok(summary);
    }

    let items = prospect_db::list_awaiting_keyword_validation(&ctx.pool, ctx.gate_batch).await?;
    if items.is_empty() {
        info!("no derivatives awaiting keyword validation");
        return Ok(summary);
    }
    info!(items = items.len(), "validating keywords");

    for item in &items {
        let budget = ctx.budget.status().await?;
        if budget.exceeded {
            warn!(
                processed = summary.processed,
                "daily budget reached mid-run, stopping keyword validation"
            );
            break;
        }
        summary.processed += 1;

        match validate_item(ctx, item).await? {
            GateOutcome::Passed => summary.created += 1,
            GateOutcome::Rejected => summary.rejected += 1,
            GateOutcome::Skipped => {}
        }
    }

    info!(
        processed = summary.processed,
        created = summary.created,
        rejected = summary.rejected,
        "keyword validation run finished"
    );
    Ok(summary)
}

enum GateOutcome {
    Passed,
    Rejected,
    Skipped,
}

async fn validate_item(
    ctx: &PipelineContext,
    item: &DerivedProductRow,
) -> Result<GateOutcome, PipelineError> {
    let keywords = item.keywords();
    let mut suggestions: Vec<String> = Vec::new();
    for keyword in keywords.iter().take(MAX_KEYWORDS_PER_ITEM) {
        match ctx.suggest.suggestions(keyword).await {
            Ok(batch) => suggestions.extend(batch),
            Err(error) => {
                warn!(%error, keyword = %keyword, "suggestion fetch failed, continuing");
            }
        }
    }

    let total = suggestions.len();
    let volume = SearchVolume::from_suggestion_count(total);
    let diversity = suggestions
        .iter()
        .map(|s| s.to_lowercase())
        .collect::<HashSet<_>>()
        .len();
    let difficulty = estimate_difficulty(&item.competition_level, diversity);

    let rejects = fails_validation(volume, difficulty);
    let reason = rejects.then(|| {
        format!(
            "search volume {} ({total} suggestions across {} keywords), difficulty {difficulty}",
            volume.as_str(),
            keywords.len().min(MAX_KEYWORDS_PER_ITEM),
        )
    });
    let sample: Vec<&str> = suggestions
        .iter()
        .take(SAMPLE_LIMIT)
        .map(String::as_str)
        .collect();

    let validation = NewKeywordValidation {
        derived_product_id: item.id,
        passed: !rejects,
        volume: volume.as_str(),
        difficulty,
        suggestion_count: count_to_i32(total),
        suggestion_sample: json!(sample),
        reason: reason.as_deref(),
    };
    if prospect_db::insert_keyword_validation(&ctx.pool, &validation).await?.is_none() {
        debug!(slug = %item.slug, "keyword validation already recorded");
        return Ok(GateOutcome::Skipped);
    }

    if let Some(reason) = reason {
        prospect_db::reject_derived_product(&ctx.pool, item.id, &reason).await?;
        info!(slug = %item.slug, volume = volume.as_str(), total, "derivative rejected by keyword validation");
        Ok(GateOutcome::Rejected)
    } else {
        prospect_db::validate_derived_product(&ctx.pool, item.id, volume.as_str()).await?;
        info!(slug = %item.slug, volume = volume.as_str(), total, "derivative validated");
        Ok(GateOutcome::Passed)
    }
}

/// Difficulty from the recorded competition level, falling back to
/// suggestion diversity when the level is uninformative.
fn estimate_difficulty(competition_level: &str, diversity: usize) -> &'static str {
    match competition_level {
        "high" => "hard",
        "low" => "easy",
        _ => {
            if diversity >= DIVERSITY_MODERATE {
                "moderate"
            } else if diversity >= DIVERSITY_EASY {
                "easy"
            } else {
                "unknown"
            }
        }
    }
}

/// No measurable volume always fails; low volume fails only when the
/// keyword space is also hard.
fn fails_validation(volume: SearchVolume, difficulty: &str) -> bool {
    volume == SearchVolume::None || (volume == SearchVolume::Low && difficulty == "hard")
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn count_to_i32(count: usize) -> i32 {
    count as i32
}
