//! Episode progress from logged watch sessions.
//!
//! A (season, episode) pair is mapped to an absolute ordinal through the
//! cumulative episode count of all earlier regular seasons. Progress is the
//! furthest ordinal ever logged, not the number of distinct episodes seen.

use std::collections::{BTreeMap, HashMap};

use crate::watch_log::WatchSession;

/// Season number reserved for specials; excluded from offsets and totals.
pub const SPECIALS_SEASON: u32 = 0;

/// Per-season episode count as reported by the content metadata service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct SeasonSummary {
    pub season_number: u32,
    pub episode_count: u32,
}

/// Season number to count of episodes in all strictly earlier seasons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeasonOffsets {
    offsets: BTreeMap<u32, u32>,
    total_episodes: u32,
}

impl SeasonOffsets {
    pub fn from_seasons(seasons: &[SeasonSummary]) -> Self {
        let mut regular: Vec<SeasonSummary> = seasons
            .iter()
            .copied()
            .filter(|season| season.season_number != SPECIALS_SEASON)
            .collect();
        regular.sort_by_key(|season| season.season_number);

        let mut offsets = BTreeMap::new();
        let mut running = 0u32;
        for season in regular {
            // Duplicate season entries keep the first offset but still add episodes.
            offsets.entry(season.season_number).or_insert(running);
            running = running.saturating_add(season.episode_count);
        }
        Self {
            offsets,
            total_episodes: running,
        }
    }

    /// Offset for `season`; unknown seasons (including specials) count from 0.
    pub fn offset_for(&self, season: u32) -> u32 {
        self.offsets.get(&season).copied().unwrap_or(0)
    }

    /// Episode count across all regular seasons.
    pub fn total_episodes(&self) -> u32 {
        self.total_episodes
    }
}

pub fn absolute_episode(offsets: &SeasonOffsets, season: u32, episode: u32) -> u32 {
    offsets.offset_for(season).saturating_add(episode)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct EpisodeProgress {
    pub total: u32,
    /// Furthest absolute episode logged.
    pub completed: u32,
    /// `0..=100`; `0` when the total is unknown.
    pub percent: u8,
}

/// Computes the high-water-mark progress for one series.
pub fn compute_progress(
    offsets: &SeasonOffsets,
    total: Option<u32>,
    sessions: &[WatchSession],
) -> EpisodeProgress {
    let completed = sessions
        .iter()
        .map(|session| absolute_episode(offsets, session.season_number, session.episode_number))
        .max()
        .unwrap_or(0);
    let total = total.unwrap_or(0);
    EpisodeProgress {
        total,
        completed,
        percent: percent_of(completed, total),
    }
}

fn percent_of(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = 100.0 * f64::from(completed) / f64::from(total);
    ratio.round().clamp(0.0, 100.0) as u8
}

/// Per-series offsets and totals, keyed by media id.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    offsets: HashMap<String, SeasonOffsets>,
    totals: HashMap<String, u32>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers season metadata; the total defaults to the regular-season episode sum.
    pub fn register_series(&mut self, media_id: &str, seasons: &[SeasonSummary]) {
        let offsets = SeasonOffsets::from_seasons(seasons);
        self.totals
            .insert(media_id.to_string(), offsets.total_episodes());
        self.offsets.insert(media_id.to_string(), offsets);
    }

    /// Overrides the total episode count reported for a series.
    pub fn set_total(&mut self, media_id: &str, total: u32) {
        self.totals.insert(media_id.to_string(), total);
    }

    pub fn total_for(&self, media_id: &str) -> Option<u32> {
        self.totals.get(media_id).copied()
    }

    /// Progress for `media_id`; sessions logged for other media are ignored.
    pub fn progress_for(&self, media_id: &str, sessions: &[WatchSession]) -> EpisodeProgress {
        let relevant: Vec<WatchSession> = sessions
            .iter()
            .filter(|session| session.media_id == media_id)
            .cloned()
            .collect();
        let offsets = self.offsets.get(media_id).cloned().unwrap_or_default();
        compute_progress(&offsets, self.total_for(media_id), &relevant)
    }
}

/// Parses `"1:12,2:12"` into season summaries.
pub fn parse_season_list(value: &str) -> Result<Vec<SeasonSummary>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (season, count) = entry
                .split_once(':')
                .ok_or_else(|| format!("expected season:episodes, got '{entry}'"))?;
            let season_number = season
                .trim()
                .parse::<u32>()
                .map_err(|error| format!("invalid season number '{season}': {error}"))?;
            let episode_count = count
                .trim()
                .parse::<u32>()
                .map_err(|error| format!("invalid episode count '{count}': {error}"))?;
            Ok(SeasonSummary {
                season_number,
                episode_count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        absolute_episode, compute_progress, parse_season_list, ProgressTracker, SeasonOffsets,
        SeasonSummary,
    };
    use crate::watch_log::WatchSession;
    use chrono::NaiveDate;

    fn season(season_number: u32, episode_count: u32) -> SeasonSummary {
        SeasonSummary {
            season_number,
            episode_count,
        }
    }

    fn session(media_id: &str, season_number: u32, episode_number: u32) -> WatchSession {
        WatchSession {
            id: format!("{media_id}-{season_number}-{episode_number}"),
            user_id: "user-1".to_string(),
            media_id: media_id.to_string(),
            season_number,
            episode_number,
            watched_on: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            minutes: None,
            note: None,
        }
    }

    #[test]
    fn test_offsets_are_cumulative_and_skip_specials() {
        let offsets =
            SeasonOffsets::from_seasons(&[season(2, 10), season(0, 4), season(1, 8), season(3, 6)]);
        assert_eq!(offsets.offset_for(1), 0);
        assert_eq!(offsets.offset_for(2), 8);
        assert_eq!(offsets.offset_for(3), 18);
        assert_eq!(offsets.offset_for(0), 0);
        assert_eq!(offsets.total_episodes(), 24);
    }

    #[test]
    fn test_two_season_example_is_63_percent() {
        let offsets = SeasonOffsets::from_seasons(&[season(1, 12), season(2, 12)]);
        let sessions = vec![session("tv:1", 1, 5), session("tv:1", 2, 3)];

        let progress = compute_progress(&offsets, Some(24), &sessions);

        assert_eq!(progress.total, 24);
        assert_eq!(progress.completed, 15);
        assert_eq!(progress.percent, 63);
    }

    #[test]
    fn test_logging_an_earlier_episode_does_not_lower_progress() {
        let offsets = SeasonOffsets::from_seasons(&[season(1, 12), season(2, 12)]);
        let mut sessions = vec![session("tv:1", 2, 3)];
        let before = compute_progress(&offsets, Some(24), &sessions);

        sessions.push(session("tv:1", 1, 2));
        let after = compute_progress(&offsets, Some(24), &sessions);

        assert_eq!(before.completed, 15);
        assert_eq!(after.completed, 15);
        assert_eq!(after.percent, before.percent);
    }

    #[test]
    fn test_final_episode_is_100_percent() {
        let offsets = SeasonOffsets::from_seasons(&[season(1, 12), season(2, 12)]);
        let progress = compute_progress(&offsets, Some(24), &[session("tv:1", 2, 12)]);
        assert_eq!(progress.completed, 24);
        assert_eq!(progress.percent, 100);
    }

    #[test]
    fn test_skipping_to_finale_reports_full_progress() {
        // High-water mark: jumping to the last episode counts as complete even
        // though earlier episodes were never logged.
        let offsets = SeasonOffsets::from_seasons(&[season(1, 10)]);
        let progress = compute_progress(&offsets, Some(10), &[session("tv:1", 1, 10)]);
        assert_eq!(progress.completed, 10);
        assert_eq!(progress.percent, 100);
    }

    #[test]
    fn test_percent_is_clamped_when_past_total() {
        let offsets = SeasonOffsets::from_seasons(&[season(1, 10)]);
        let progress = compute_progress(&offsets, Some(10), &[session("tv:1", 2, 4)]);
        assert_eq!(progress.completed, 4);

        let progress = compute_progress(&offsets, Some(10), &[session("tv:1", 1, 14)]);
        assert_eq!(progress.completed, 14);
        assert_eq!(progress.percent, 100);
    }

    #[test]
    fn test_unknown_or_zero_total_yields_zero_percent() {
        let offsets = SeasonOffsets::default();
        let sessions = vec![session("tv:1", 1, 3)];
        assert_eq!(compute_progress(&offsets, None, &sessions).percent, 0);
        assert_eq!(compute_progress(&offsets, Some(0), &sessions).percent, 0);
        assert_eq!(compute_progress(&offsets, None, &sessions).completed, 3);
    }

    #[test]
    fn test_no_sessions_is_zero_progress() {
        let offsets = SeasonOffsets::from_seasons(&[season(1, 8)]);
        let progress = compute_progress(&offsets, Some(8), &[]);
        assert_eq!(progress.completed, 0);
        assert_eq!(progress.percent, 0);
    }

    #[test]
    fn test_absolute_episode_uses_offset() {
        let offsets = SeasonOffsets::from_seasons(&[season(1, 12), season(2, 12)]);
        assert_eq!(absolute_episode(&offsets, 2, 1), 13);
        assert_eq!(absolute_episode(&offsets, 1, 1), 1);
    }

    #[test]
    fn test_tracker_uses_registered_series_and_ignores_other_media() {
        let mut tracker = ProgressTracker::new();
        tracker.register_series("tv:1", &[season(1, 12), season(2, 12)]);
        let sessions = vec![
            session("tv:1", 1, 5),
            session("tv:2", 9, 9),
            session("tv:1", 2, 3),
        ];

        let progress = tracker.progress_for("tv:1", &sessions);
        assert_eq!(progress.total, 24);
        assert_eq!(progress.completed, 15);
        assert_eq!(progress.percent, 63);

        tracker.set_total("tv:1", 30);
        assert_eq!(tracker.progress_for("tv:1", &sessions).percent, 50);
    }

    #[test]
    fn test_tracker_unknown_series_has_zero_percent() {
        let tracker = ProgressTracker::new();
        let progress = tracker.progress_for("tv:404", &[session("tv:404", 1, 2)]);
        assert_eq!(progress.total, 0);
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.percent, 0);
    }

    #[test]
    fn test_parse_season_list() {
        assert_eq!(
            parse_season_list("1:12, 2:12,0:3").expect("list should parse"),
            vec![season(1, 12), season(2, 12), season(0, 3)]
        );
        assert!(parse_season_list("1-12").is_err());
        assert!(parse_season_list("x:12").is_err());
        assert!(parse_season_list("").expect("empty list parses").is_empty());
    }
}
