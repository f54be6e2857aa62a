//! Topic clustering for raw signals.
//!
//! Signals arrive as individual posts; several of them are usually the same
//! underlying complaint. Grouping is single-pass and opener-anchored: the
//! first unassigned signal opens a group and every later unassigned signal
//! joins it when its title words overlap the opener's by Jaccard 0.4 or
//! better, or when both point at the same canonical URL. Members are never
//! compared with each other, only with the opener, so a chain of pairwise
//! look-alikes cannot drag unrelated topics into one group.

use std::collections::HashSet;

use prospect_core::text::{jaccard, normalize_source_url, topic_words};
use prospect_db::SignalRow;

/// Minimum title-word overlap for two signals to count as one topic.
const TOPIC_MERGE_THRESHOLD: f64 = 0.4;

/// One topic worth of merged signals, represented by its primary signal.
#[derive(Debug, Clone)]
pub struct TopicGroup {
    pub primary_id: i64,
    pub title: String,
    /// Primary description with one `Also reported:` line per merged signal,
    /// so the assessment prompt sees the whole cluster.
    pub description: Option<String>,
    pub source: String,
    pub source_url: Option<String>,
    pub upvotes: i32,
    pub comment_count: i32,
    /// Every member signal id, primary included, in query order.
    pub signal_ids: Vec<i64>,
    /// Member ids other than the primary.
    pub merged_ids: Vec<i64>,
}

/// Cluster signals into topic groups, preserving query order.
#[must_use]
pub fn group_by_topic(signals: &[SignalRow]) -> Vec<TopicGroup> {
    let words: Vec<HashSet<String>> = signals.iter().map(|s| topic_words(&s.title)).collect();
    let urls: Vec<Option<String>> = signals
        .iter()
        .map(|s| s.source_url.as_deref().and_then(normalize_source_url))
        .collect();

    let mut assigned = vec![false; signals.len()];
    let mut groups = Vec::new();

    for i in 0..signals.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut members = vec![i];
        for j in (i + 1)..signals.len() {
            if assigned[j] {
                continue;
            }
            let same_url = matches!((&urls[i], &urls[j]), (Some(a), Some(b)) if a == b);
            if same_url || jaccard(&words[i], &words[j]) >= TOPIC_MERGE_THRESHOLD {
                assigned[j] = true;
                members.push(j);
            }
        }
        groups.push(build_group(signals, &members));
    }

    groups
}

fn build_group(signals: &[SignalRow], members: &[usize]) -> TopicGroup {
    // Highest engagement wins the primary slot; ties keep the earliest.
    let mut primary = members[0];
    for &m in &members[1..] {
        let challenger = signals[m].upvotes + signals[m].comment_count;
        let holder = signals[primary].upvotes + signals[primary].comment_count;
        if challenger > holder {
            primary = m;
        }
    }

    let lead = &signals[primary];
    let mut description = lead.description.clone().unwrap_or_default();
    for &m in members {
        if m == primary {
            continue;
        }
        let merged = &signals[m];
        if !description.is_empty() {
            description.push('\n');
        }
        description.push_str(&format!("Also reported: {} ({})", merged.title, merged.source));
    }

    TopicGroup {
        primary_id: lead.id,
        title: lead.title.clone(),
        description: if description.is_empty() {
            None
        } else {
            Some(description)
        },
        source: lead.source.clone(),
        source_url: lead.source_url.clone(),
        upvotes: lead.upvotes,
        comment_count: lead.comment_count,
        signal_ids: members.iter().map(|&m| signals[m].id).collect(),
        merged_ids: members
            .iter()
            .filter(|&&m| m != primary)
            .map(|&m| signals[m].id)
            .collect(),
    }
}
