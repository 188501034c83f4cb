//! Chunk group boost and required-group enforcement.

use crate::search::types::{Chunk, ChunkId, ScoredChunk};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A chunk group as seen across the chunk set.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupEntry {
    pub name: String,
    /// Union of every member's group keywords, lowercased
    pub keywords: Vec<String>,
    /// Any member flags the group as required
    pub required: bool,
    /// Member positions in the indexed chunk set
    pub members: Vec<usize>,
}

/// Groups keyed by name, in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    groups: Vec<GroupEntry>,
}

impl GroupIndex {
    pub fn build(chunks: &[Chunk]) -> Self {
        let mut groups: Vec<GroupEntry> = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();

        for (pos, chunk) in chunks.iter().enumerate() {
            let Some(group) = &chunk.chunk_group else {
                continue;
            };
            if group.name.trim().is_empty() {
                continue;
            }
            let slot = *slots.entry(group.name.as_str()).or_insert_with(|| {
                groups.push(GroupEntry {
                    name: group.name.clone(),
                    keywords: Vec::new(),
                    required: false,
                    members: Vec::new(),
                });
                groups.len() - 1
            });

            let entry = &mut groups[slot];
            entry.members.push(pos);
            entry.required |= group.requires_group_member;
            for keyword in &group.group_keywords {
                let keyword = keyword.trim().to_lowercase();
                if !keyword.is_empty() && !entry.keywords.contains(&keyword) {
                    entry.keywords.push(keyword);
                }
            }
        }

        Self { groups }
    }

    pub fn groups(&self) -> &[GroupEntry] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Names of groups with a keyword occurring in `query` (case-insensitive substring).
    pub fn matching(&self, query: &str) -> HashSet<&str> {
        let query = query.to_lowercase();
        self.groups
            .iter()
            .filter(|g| g.keywords.iter().any(|k| query.contains(k.as_str())))
            .map(|g| g.name.as_str())
            .collect()
    }
}

/// Multiplies the score of every member of a query-matched group.
///
/// Returns the number of boosted chunks.
pub fn apply_group_boost(
    results: &mut [ScoredChunk],
    index: &GroupIndex,
    query: &str,
    multiplier: f32,
) -> usize {
    let matched = index.matching(query);
    if matched.is_empty() {
        return 0;
    }

    let mut boosted = 0;
    for scored in results.iter_mut() {
        let in_group = scored
            .chunk
            .chunk_group
            .as_ref()
            .is_some_and(|g| matched.contains(g.name.as_str()));
        if in_group {
            scored.score *= multiplier;
            scored.group_boosted = true;
            boosted += 1;
        }
    }
    debug!(groups = matched.len(), boosted, "Applied group boost");
    boosted
}

/// Appends the best non-disabled member of every required group that has no
/// member in `results`, at most `max_to_add` chunks in total.
///
/// `scored_pool` holds the pipeline scores of every candidate before
/// selection; members outside it count as score 0. Ties go to the member that
/// comes first in `universe`.
pub fn enforce_required_groups(
    results: &mut Vec<ScoredChunk>,
    universe: &[Chunk],
    index: &GroupIndex,
    scored_pool: &[ScoredChunk],
    max_to_add: usize,
) -> usize {
    let present: HashSet<String> = results
        .iter()
        .filter_map(|s| s.chunk.chunk_group.as_ref().map(|g| g.name.clone()))
        .collect();
    let pool: HashMap<&ChunkId, &ScoredChunk> =
        scored_pool.iter().map(|s| (s.id(), s)).collect();

    let mut added = 0;
    for group in index.groups().iter().filter(|g| g.required) {
        if present.contains(&group.name) {
            continue;
        }
        if added >= max_to_add {
            debug!(group = %group.name, "Required group skipped, max_to_add reached");
            break;
        }

        let mut best: Option<(f32, &Chunk)> = None;
        for &pos in &group.members {
            let chunk = &universe[pos];
            if chunk.disabled {
                continue;
            }
            let score = pool.get(&chunk.id).map_or(0.0, |s| s.score);
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, chunk));
            }
        }

        let Some((score, chunk)) = best else {
            continue;
        };
        let mut forced = pool
            .get(&chunk.id)
            .map(|s| (*s).clone())
            .unwrap_or_else(|| ScoredChunk::new(chunk.clone(), score));
        forced.forced_by_group = Some(group.name.clone());
        debug!(group = %group.name, chunk = %chunk.id, score, "Force-included required group member");
        results.push(forced);
        added += 1;
    }
    added
}
