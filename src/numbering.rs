//! Episode numbering: deduplication against already imported episodes,
//! number assignment for new imports, renumbering and fixing numbers from the
//! feed.
//!
//! Everything here is pure; callers load and persist the episodes.

use crate::feed::FeedEpisode;
use crate::store::Episode;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Feed episodes split into those not imported yet and those already present.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<'a> {
    pub new: Vec<&'a FeedEpisode>,
    pub existing: Vec<&'a FeedEpisode>,
}

/// Splits `feed` against the GUIDs of `existing` episodes.
///
/// An episode without a GUID is always new. With `replace`, the existing
/// episodes are about to be deleted and everything in the feed is new.
pub fn partition_new<'a>(feed: &'a [FeedEpisode], existing: &[Episode], replace: bool) -> Partition<'a> {
    let known: HashSet<&str> = if replace {
        HashSet::new()
    } else {
        existing.iter().filter_map(Episode::guid).collect()
    };

    let (existing, new): (Vec<_>, Vec<_>) = feed
        .iter()
        .partition(|ep| ep.guid().is_some_and(|guid| known.contains(guid)));

    Partition { new, existing }
}

/// How new episodes get their numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "policy", content = "start")]
pub enum NumberingPolicy {
    /// Feed number, else a number found in the title, else the 1-based
    /// position in the batch.
    #[default]
    Feed,
    /// 1, 2, 3, ... in batch order.
    Sequential,
    /// `start`, `start + 1`, ... in batch order.
    CustomStart(u32),
    /// Feed number, else the highest existing number plus the position.
    Continue,
}

/// Assigns numbers to `episodes` (in batch order) under `policy`.
///
/// `existing` is only consulted by [`NumberingPolicy::Continue`].
pub fn assign_numbers(episodes: &[&FeedEpisode], policy: NumberingPolicy, existing: &[Episode]) -> Vec<String> {
    match policy {
        NumberingPolicy::Feed => episodes
            .iter()
            .enumerate()
            .map(|(index, ep)| {
                ep.number()
                    .map(str::to_string)
                    .or_else(|| ep.title.as_deref().and_then(extract_number_from_title))
                    .unwrap_or_else(|| (index + 1).to_string())
            })
            .collect(),
        NumberingPolicy::Sequential => sequential(episodes.len(), 1),
        NumberingPolicy::CustomStart(start) => sequential(episodes.len(), start),
        NumberingPolicy::Continue => {
            let highest = existing
                .iter()
                .map(|e| numeric_value(e.number.as_deref()))
                .max()
                .unwrap_or(0);

            episodes
                .iter()
                .enumerate()
                .map(|(index, ep)| {
                    let position = index as u64 + 1;
                    ep.number().map(str::to_string).unwrap_or_else(|| {
                        // Past the top of u64 the position is all that is left.
                        highest.checked_add(position).unwrap_or(position).to_string()
                    })
                })
                .collect()
        }
    }
}

fn sequential(count: usize, start: u32) -> Vec<String> {
    (0..count as u64)
        .map(|offset| (start as u64 + offset).to_string())
        .collect()
}

static EPISODE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:episode|ep\.?)\s*(\d+)").expect("valid regex"));
static E_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bE(\d+)\b").expect("valid regex"));
static HASH_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\s*(\d+)").expect("valid regex"));
static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)[\s.\-:]").expect("valid regex"));

/// Finds an episode number in a title.
///
/// Tried in order: `Episode 5` / `Ep. 5` / `Ep 5`, `E5`, `#5`, and a leading
/// `005 - Title`. Leading zeros are dropped.
///
/// ```
/// use coverstamp::numbering::extract_number_from_title;
///
/// assert_eq!(extract_number_from_title("Ep. 12: Pilots"), Some("12".to_string()));
/// assert_eq!(extract_number_from_title("005 - Origins"), Some("5".to_string()));
/// assert_eq!(extract_number_from_title("Trailer"), None);
/// ```
pub fn extract_number_from_title(title: &str) -> Option<String> {
    [&*EPISODE_WORD, &*E_PREFIX, &*HASH_PREFIX, &*LEADING_NUMBER]
        .iter()
        .find_map(|pattern| pattern.captures(title))
        .and_then(|captures| captures.get(1))
        .map(|digits| strip_leading_zeros(digits.as_str()))
}

fn strip_leading_zeros(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Numeric value of a display number: its leading digits, or 0.
pub fn numeric_value(number: Option<&str>) -> u64 {
    let Some(number) = number else {
        return 0;
    };
    let number = number.trim();
    let end = number
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(number.len());
    number[..end].parse().unwrap_or(0)
}

/// Order used when renumbering a whole project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenumberOrder {
    /// Oldest first, undated episodes last.
    PublishedAt,
    /// Lowest current number first.
    CurrentNumber,
}

/// A number to write to an episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberAssignment {
    pub episode_id: String,
    pub number: String,
}

/// Numbers every episode sequentially from `start` in the given order.
///
/// Ties fall back to the current number, then the id, so the result does not
/// depend on the order `episodes` arrive in. Running it again on its own
/// output assigns the same numbers.
pub fn renumber(episodes: &[Episode], order: RenumberOrder, start: u32) -> Vec<NumberAssignment> {
    let mut ordered: Vec<&Episode> = episodes.iter().collect();

    match order {
        RenumberOrder::PublishedAt => {
            ordered.sort_by(|a, b| {
                (a.published_at.is_none(), a.published_at)
                    .cmp(&(b.published_at.is_none(), b.published_at))
                    .then_with(|| by_current_number(a, b))
            });
        }
        RenumberOrder::CurrentNumber => ordered.sort_by(|a, b| by_current_number(a, b)),
    }

    ordered
        .into_iter()
        .zip(sequential(episodes.len(), start))
        .map(|(episode, number)| NumberAssignment {
            episode_id: episode.id.clone(),
            number,
        })
        .collect()
}

fn by_current_number(a: &Episode, b: &Episode) -> Ordering {
    numeric_value(a.number.as_deref())
        .cmp(&numeric_value(b.number.as_deref()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Copies numbers and seasons from feed entries onto matching episodes.
///
/// Episodes match on a non-empty GUID; a feed entry without a number and
/// without a season changes nothing. Returns the updated episodes only.
pub fn fix_from_feed(episodes: &[Episode], feed: &[FeedEpisode]) -> Vec<Episode> {
    let by_guid: HashMap<&str, &FeedEpisode> = feed
        .iter()
        .filter_map(|ep| ep.guid().map(|guid| (guid, ep)))
        .collect();

    episodes
        .iter()
        .filter_map(|episode| {
            let entry = by_guid.get(episode.guid()?)?;
            let season = entry.season.as_deref().map(str::trim).filter(|s| !s.is_empty());
            if entry.number().is_none() && season.is_none() {
                return None;
            }

            let mut fixed = episode.clone();
            if let Some(number) = entry.number() {
                fixed.number = Some(number.to_string());
            }
            if let Some(season) = season {
                fixed.season = Some(season.to_string());
            }
            Some(fixed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_patterns_in_priority_order() {
        assert_eq!(extract_number_from_title("Episode 5: Intro").as_deref(), Some("5"));
        assert_eq!(extract_number_from_title("ep 7 - more").as_deref(), Some("7"));
        assert_eq!(extract_number_from_title("S2 E05 Return").as_deref(), Some("5"));
        assert_eq!(extract_number_from_title("Show #19").as_deref(), Some("19"));
        assert_eq!(extract_number_from_title("003. Third").as_deref(), Some("3"));
        assert_eq!(extract_number_from_title("Deep dive 2024"), None);
    }

    #[test]
    fn continue_numbering_survives_the_top_of_u64() {
        let trailer = FeedEpisode {
            title: Some("Trailer".to_string()),
            guid: Some("g-1".to_string()),
            ..FeedEpisode::default()
        };
        let mut last = Episode::new("p", "Last");
        last.number = Some(u64::MAX.to_string());

        let numbers = assign_numbers(&[&trailer], NumberingPolicy::Continue, &[last]);
        assert_eq!(numbers, ["1"]);
    }

    #[test]
    fn numeric_values_use_leading_digits() {
        assert_eq!(numeric_value(Some("12")), 12);
        assert_eq!(numeric_value(Some("12b")), 12);
        assert_eq!(numeric_value(Some("bonus")), 0);
        assert_eq!(numeric_value(None), 0);
    }
}
