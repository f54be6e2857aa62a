//! Topic-text utilities shared by clustering, deduplication, and slug
//! generation. All functions here are pure; similarity policy thresholds
//! live with the callers.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

/// Function words plus generic guide/tutorial filler that carry no topic
/// meaning. Tokens of length two or less are dropped before this list is
/// consulted, so short entries are omitted.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "not", "nor", "but", "with", "without", "into", "onto", "over", "under",
    "about", "above", "below", "between", "through", "during", "before", "after", "from", "this",
    "that", "these", "those", "there", "here", "what", "when", "where", "which", "who", "whom",
    "whose", "why", "how", "all", "any", "both", "each", "few", "more", "most", "other", "some",
    "such", "only", "own", "same", "than", "too", "very", "can", "cannot", "could", "should",
    "would", "will", "shall", "may", "might", "must", "have", "has", "had", "having", "does",
    "did", "doing", "are", "was", "were", "been", "being", "you", "your", "yours", "they", "them",
    "their", "its", "our", "ours", "out", "off", "again", "further", "then", "once", "now", "new",
    "just", "also", "get", "got", "gets", "getting", "make", "makes", "making", "made", "need",
    "needs", "want", "wants", "use", "uses", "using", "used", "way", "ways", "best", "top",
    "guide", "guides", "tutorial", "tutorials", "tips", "tricks", "intro", "introduction",
    "beginner", "beginners", "complete", "ultimate", "review", "reviews", "learn", "learning",
    "start", "started", "starting", "step", "steps",
];

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Four-digit tokens in the 19xx/20xx range are publication-year noise
/// ("best X 2025") and never topic content.
fn is_year_token(token: &str) -> bool {
    token.len() == 4
        && token.chars().all(|c| c.is_ascii_digit())
        && (token.starts_with("19") || token.starts_with("20"))
}

/// Extract the set of topic-bearing words from free text.
///
/// Lowercases, replaces everything outside ASCII alphanumerics and CJK
/// ideographs with whitespace, then drops tokens of length two or less,
/// stop words, and bare year tokens.
#[must_use]
pub fn topic_words(text: &str) -> HashSet<String> {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || is_cjk(c) {
            cleaned.push(c);
        } else {
            cleaned.push(' ');
        }
    }

    cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .filter(|t| !STOP_WORDS.contains(t))
        .filter(|t| !is_year_token(t))
        .map(std::string::ToString::to_string)
        .collect()
}

/// Jaccard similarity over two word sets. Returns 0.0 when either set is
/// empty so degenerate titles never cluster with everything.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Canonical form of a source URL for exact-duplicate detection:
/// query and fragment stripped, trailing slashes stripped, lowercased.
/// Returns `None` for blank input.
#[must_use]
pub fn normalize_source_url(url: &str) -> Option<String> {
    let lowered = url.trim().to_lowercase();
    let base = lowered.split(['?', '#']).next().unwrap_or("");
    let trimmed = base.trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Generate a URL-safe slug from a title.
#[must_use]
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else if c.is_whitespace() {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|&c| c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Content hash for exact-duplicate detection at signal ingestion.
///
/// SHA-256 over `source || title || normalized url`, with the title
/// lowercased/trimmed so trivial whitespace or casing edits do not mint a
/// new signal. Hex-encoded.
#[must_use]
pub fn content_hash(source: &str, title: &str, source_url: Option<&str>) -> String {
    let normalized_url = source_url.and_then(normalize_source_url).unwrap_or_default();
    let input = format!(
        "{}\x00{}\x00{}",
        source.trim().to_lowercase(),
        title.trim().to_lowercase(),
        normalized_url,
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
