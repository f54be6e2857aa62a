//! Competitive check gate for derived products.
//!
//! Each derivative still awaiting its check gets one SERP lookup for its
//! primary keyword (when a SERP client is configured) and one model estimate
//! of ranking difficulty. Result domains are split into authority and small
//! sites against a fixed list. A derivative fails on very hard difficulty,
//! or when authority domains crowd the results with no visible content gap.
//! Either way the check row is immutable and unique per derivative, so a
//! re-run skips everything already decided.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use prospect_ai::GenerateRequest;
use prospect_db::{DerivedProductRow, NewCompetitiveCheck};

use crate::error::PipelineError;
use crate::search::SerpResult;
use crate::{PipelineContext, StageSummary};

const STAGE: &str = "competitive";
/// Ranked results requested per keyword.
const SERP_RESULT_LIMIT: usize = 10;

/// Domains whose presence in the results signals entrenched competition.
const AUTHORITY_DOMAINS: &[&str] = &[
    "wikipedia.org",
    "youtube.com",
    "amazon.com",
    "reddit.com",
    "quora.com",
    "medium.com",
    "github.com",
    "stackoverflow.com",
    "linkedin.com",
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "pinterest.com",
    "nytimes.com",
    "forbes.com",
    "techcrunch.com",
    "theverge.com",
    "wired.com",
    "cnet.com",
    "producthunt.com",
    "g2.com",
    "capterra.com",
];

#[derive(Debug, Deserialize)]
struct CompetitiveEstimate {
    #[serde(default)]
    difficulty: String,
    #[serde(default)]
    content_gap: bool,
    #[serde(default)]
    analysis: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Difficulty {
    Easy,
    Moderate,
    Hard,
    VeryHard,
    Unknown,
}

impl Difficulty {
    fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Moderate => "moderate",
            Difficulty::Hard => "hard",
            Difficulty::VeryHard => "very_hard",
            Difficulty::Unknown => "unknown",
        }
    }

    /// The competition level recorded on the product after a pass.
    fn competition_level(self) -> &'static str {
        match self {
            Difficulty::Easy => "low",
            Difficulty::Moderate => "medium",
            Difficulty::Hard | Difficulty::VeryHard => "high",
            Difficulty::Unknown => "unknown",
        }
    }
}

/// Run the competitive gate over one batch of derived products.
///
/// # Errors
///
/// Returns `PipelineError` on database failure. SERP, model and budget
/// conditions are handled by skipping or stopping, never by erroring.
pub async fn run_competitive(ctx: &PipelineContext) -> Result<StageSummary, PipelineError> {
    let mut summary = StageSummary::default();

    let budget = ctx.budget.status().await?;
    if budget.exceeded {
        warn!(
            spent = %budget.spent_today,
            limit = %budget.daily_limit,
            "daily budget exhausted, skipping competitive run"
        );
        return Ok(summary);
    }

    let items = prospect_db::list_awaiting_competitive_check(&ctx.pool, ctx.gate_batch).await?;
    if items.is_empty() {
        info!("no derivatives awaiting competitive check");
        return Ok(summary);
    }
    info!(items = items.len(), "running competitive checks");

    for item in &items {
        let budget = ctx.budget.status().await?;
        if budget.exceeded {
            warn!(
                processed = summary.processed,
                "daily budget reached mid-run, stopping competitive checks"
            );
            break;
        }
        summary.processed += 1;

        match check_item(ctx, item).await? {
            GateOutcome::Passed => summary.created += 1,
            GateOutcome::Rejected => summary.rejected += 1,
            GateOutcome::Skipped => {}
        }
    }

    info!(
        processed = summary.processed,
        created = summary.created,
        rejected = summary.rejected,
        "competitive run finished"
    );
    Ok(summary)
}

enum GateOutcome {
    Passed,
    Rejected,
    Skipped,
}

async fn check_item(
    ctx: &PipelineContext,
    item: &DerivedProductRow,
) -> Result<GateOutcome, PipelineError> {
    let keywords = item.keywords();
    let Some(keyword) = keywords.first() else {
        // Nothing to look up; the derivative can never be validated.
        let reason = "no target keyword to check";
        let check = NewCompetitiveCheck {
            derived_product_id: item.id,
            passed: false,
            difficulty: Difficulty::Unknown.as_str(),
            content_gap: false,
            big_site_count: 0,
            small_site_count: 0,
            reason: Some(reason),
            serp_snapshot: json!([]),
            analysis: None,
        };
        if prospect_db::insert_competitive_check(&ctx.pool, &check).await?.is_none() {
            debug!(slug = %item.slug, "competitive check already recorded");
            return Ok(GateOutcome::Skipped);
        }
        prospect_db::reject_derived_product(&ctx.pool, item.id, reason).await?;
        warn!(slug = %item.slug, "derivative rejected: no target keyword");
        return Ok(GateOutcome::Rejected);
    };

    let serp_results = match &ctx.serp {
        Some(client) => match client.search(keyword, SERP_RESULT_LIMIT).await {
            Ok(results) => results,
            Err(error) => {
                warn!(%error, keyword = %keyword, "SERP lookup failed, continuing without results");
                Vec::new()
            }
        },
        None => Vec::new(),
    };
    let (big_sites, small_sites) = classify_domains(&serp_results);

    let request = estimate_request(item, keyword, &serp_results);
    let Some(estimate) = ctx.assisted_json::<CompetitiveEstimate>(STAGE, &request).await? else {
        debug!(slug = %item.slug, "no usable difficulty estimate, leaving for the next run");
        return Ok(GateOutcome::Skipped);
    };

    let difficulty = parse_difficulty(&estimate.difficulty);
    let rejects = fails_gate(
        difficulty,
        big_sites,
        estimate.content_gap,
        ctx.scoring.thresholds.big_site_threshold,
    );
    let reason = rejects.then(|| {
        if difficulty == Difficulty::VeryHard {
            format!("very hard to rank for \"{keyword}\"")
        } else {
            format!(
                "{big_sites} authority domains rank for \"{keyword}\" with no content gap"
            )
        }
    });

    let check = NewCompetitiveCheck {
        derived_product_id: item.id,
        passed: !rejects,
        difficulty: difficulty.as_str(),
        content_gap: estimate.content_gap,
        big_site_count: count_to_i32(big_sites),
        small_site_count: count_to_i32(small_sites),
        reason: reason.as_deref(),
        serp_snapshot: json!(serp_results),
        analysis: estimate.analysis.as_deref(),
    };
    if prospect_db::insert_competitive_check(&ctx.pool, &check).await?.is_none() {
        debug!(slug = %item.slug, "competitive check already recorded");
        return Ok(GateOutcome::Skipped);
    }

    if let Some(reason) = reason {
        prospect_db::reject_derived_product(&ctx.pool, item.id, &reason).await?;
        info!(slug = %item.slug, difficulty = difficulty.as_str(), big_sites, "derivative rejected by competitive check");
        Ok(GateOutcome::Rejected)
    } else {
        prospect_db::set_competition_level(&ctx.pool, item.id, difficulty.competition_level())
            .await?;
        info!(slug = %item.slug, difficulty = difficulty.as_str(), big_sites, "competitive check passed");
        Ok(GateOutcome::Passed)
    }
}

fn estimate_request(
    item: &DerivedProductRow,
    keyword: &str,
    serp_results: &[SerpResult],
) -> GenerateRequest {
    let listing = if serp_results.is_empty() {
        "No search results available; estimate from the keyword alone.".to_string()
    } else {
        serp_results
            .iter()
            .map(|r| format!("- {} ({})", r.title, r.link))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let prompt = format!(
        "How hard is it for a brand-new site to rank for this keyword?\n\n\
         Product: {title}\n\
         Keyword: {keyword}\n\
         Current top results:\n{listing}\n\n\
         Reply with a single JSON object:\n\
         {{\"difficulty\": \"easy|moderate|hard|very_hard\",\n\
          \"content_gap\": <true if the results leave an underserved angle>,\n\
          \"analysis\": \"two sentences\"}}",
        title = item.title,
        keyword = keyword,
        listing = listing,
    );
    GenerateRequest::new(prompt)
        .with_system(
            "You estimate SEO ranking difficulty for niche products. \
             Answer with strict JSON only.",
        )
        .with_max_tokens(512)
}

/// Split result links into (authority, small) counts by host suffix.
fn classify_domains(results: &[SerpResult]) -> (usize, usize) {
    let mut big = 0;
    let mut small = 0;
    for result in results {
        if is_authority_link(&result.link) {
            big += 1;
        } else {
            small += 1;
        }
    }
    (big, small)
}

fn is_authority_link(link: &str) -> bool {
    let Ok(url) = reqwest::Url::parse(link) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    AUTHORITY_DOMAINS.iter().any(|domain| {
        host == *domain
            || host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

fn parse_difficulty(raw: &str) -> Difficulty {
    let lowered = raw.to_lowercase();
    if lowered.contains("very") && lowered.contains("hard") {
        Difficulty::VeryHard
    } else if lowered.contains("hard") {
        Difficulty::Hard
    } else if lowered.contains("moderate") || lowered.contains("medium") {
        Difficulty::Moderate
    } else if lowered.contains("easy") || lowered.contains("low") {
        Difficulty::Easy
    } else {
        Difficulty::Unknown
    }
}

/// Very hard difficulty always fails; otherwise it takes a crowded result
/// page with no content gap.
fn fails_gate(
    difficulty: Difficulty,
    big_sites: usize,
    content_gap: bool,
    big_site_threshold: usize,
) -> bool {
    difficulty == Difficulty::VeryHard || (big_sites >= big_site_threshold && !content_gap)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn count_to_i32(count: usize) -> i32 {
    count as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(link: &str) -> SerpResult {
        SerpResult {
            title: "result".to_string(),
            link: link.to_string(),
        }
    }

    #[test]
    fn difficulty_parses_loose_phrasings() {
        assert_eq!(parse_difficulty("very_hard"), Difficulty::VeryHard);
        assert_eq!(parse_difficulty("Very Hard"), Difficulty::VeryHard);
        assert_eq!(parse_difficulty("hard"), Difficulty::Hard);
        assert_eq!(parse_difficulty("Moderate"), Difficulty::Moderate);
        assert_eq!(parse_difficulty("pretty easy"), Difficulty::Easy);
        assert_eq!(parse_difficulty("???"), Difficulty::Unknown);
    }

    #[test]
    fn difficulty_maps_to_competition_levels() {
        assert_eq!(Difficulty::Easy.competition_level(), "low");
        assert_eq!(Difficulty::Moderate.competition_level(), "medium");
        assert_eq!(Difficulty::Hard.competition_level(), "high");
        assert_eq!(Difficulty::VeryHard.competition_level(), "high");
        assert_eq!(Difficulty::Unknown.competition_level(), "unknown");
    }

    #[test]
    fn subdomains_of_authority_sites_count_as_big() {
        let results = vec![
            result("https://en.wikipedia.org/wiki/Invoice"),
            result("https://www.reddit.com/r/freelance/"),
            result("https://myinvoicetool.example/pricing"),
            result("not a url"),
        ];
        assert_eq!(classify_domains(&results), (2, 2));
    }

    #[test]
    fn suffix_matching_requires_a_dot_boundary() {
        // notreddit.com must not match reddit.com.
        assert!(!is_authority_link("https://notreddit.com/thread"));
        assert!(is_authority_link("https://old.reddit.com/thread"));
    }

    #[test]
    fn very_hard_fails_even_with_a_content_gap() {
        assert!(fails_gate(Difficulty::VeryHard, 0, true, 5));
    }

    #[test]
    fn crowded_results_without_a_gap_fail() {
        assert!(fails_gate(Difficulty::Moderate, 5, false, 5));
        assert!(!fails_gate(Difficulty::Moderate, 5, true, 5));
        assert!(!fails_gate(Difficulty::Moderate, 4, false, 5));
    }

    #[test]
    fn easy_and_sparse_results_pass() {
        assert!(!fails_gate(Difficulty::Easy, 1, false, 5));
        assert!(!fails_gate(Difficulty::Unknown, 0, false, 5));
    }
}
