//! Watch session records logged per user and media item.

use chrono::NaiveDate;

/// One logged viewing event. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WatchSession {
    pub id: String,
    pub user_id: String,
    pub media_id: String,
    pub season_number: u32,
    pub episode_number: u32,
    pub watched_on: NaiveDate,
    pub minutes: Option<u32>,
    pub note: Option<String>,
}

/// Fields supplied by the user when logging progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWatchSession {
    pub user_id: String,
    pub media_id: String,
    pub season_number: u32,
    pub episode_number: u32,
    pub watched_on: NaiveDate,
    pub minutes: Option<u32>,
    pub note: Option<String>,
}

impl NewWatchSession {
    /// Rejects sessions that cannot be placed on a series timeline.
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("user id must not be empty".to_string());
        }
        if self.media_id.trim().is_empty() {
            return Err("media id must not be empty".to_string());
        }
        if self.episode_number == 0 {
            return Err("episode numbers start at 1".to_string());
        }
        Ok(())
    }

    pub fn into_session(self, id: String) -> WatchSession {
        WatchSession {
            id,
            user_id: self.user_id,
            media_id: self.media_id,
            season_number: self.season_number,
            episode_number: self.episode_number,
            watched_on: self.watched_on,
            minutes: self.minutes,
            // Blank notes are stored as absent.
            note: self.note.filter(|note| !note.trim().is_empty()),
        }
    }
}
