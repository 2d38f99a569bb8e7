use crate::kv_store::{KeyValueStore, StoreError};
use crate::watch_log::{NewWatchSession, WatchSession};
use chrono::NaiveDate;
use log::debug;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct DbManager {
    conn: Connection,
}

impl DbManager {
    /// Opens (creating if needed) the database file at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        debug!("Opened database at {}", db_path.display());
        Ok(Self::with_connection(conn)?)
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, rusqlite::Error> {
        let db_manager = Self { conn };
        db_manager.initialize_schema()?;
        Ok(db_manager)
    }

    fn initialize_schema(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS watch_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                media_id TEXT NOT NULL,
                season_number INTEGER NOT NULL,
                episode_number INTEGER NOT NULL,
                watched_on TEXT NOT NULL,
                minutes INTEGER,
                note TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_watch_sessions_user_media
                ON watch_sessions (user_id, media_id)",
            [],
        )?;
        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Validates and stores a new session, assigning it a fresh id.
    pub fn log_watch_session(
        &self,
        new_session: NewWatchSession,
    ) -> Result<WatchSession, StoreError> {
        new_session.validate().map_err(StoreError::Invalid)?;
        let session = new_session.into_session(Uuid::new_v4().to_string());
        self.conn.execute(
            "INSERT INTO watch_sessions
                (id, user_id, media_id, season_number, episode_number, watched_on, minutes, note)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.id,
                session.user_id,
                session.media_id,
                session.season_number,
                session.episode_number,
                session.watched_on.format(DATE_FORMAT).to_string(),
                session.minutes,
                session.note,
            ],
        )?;
        Ok(session)
    }

    pub fn watch_sessions_for_media(
        &self,
        user_id: &str,
        media_id: &str,
    ) -> Result<Vec<WatchSession>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, media_id, season_number, episode_number, watched_on, minutes, note
                FROM watch_sessions
                WHERE user_id = ?1 AND media_id = ?2
                ORDER BY watched_on ASC, rowid ASC",
        )?;
        let session_iter = stmt.query_map(params![user_id, media_id], |row| {
            let watched_on_text: String = row.get(5)?;
            let watched_on = NaiveDate::parse_from_str(&watched_on_text, DATE_FORMAT)
                .map_err(|error| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(error))
                })?;
            Ok(WatchSession {
                id: row.get(0)?,
                user_id: row.get(1)?,
                media_id: row.get(2)?,
                season_number: row.get(3)?,
                episode_number: row.get(4)?,
                watched_on,
                minutes: row.get(6)?,
                note: row.get(7)?,
            })
        })?;

        let mut sessions = Vec::new();
        for session in session_iter {
            sessions.push(session?);
        }
        Ok(sessions)
    }
}

impl KeyValueStore for DbManager {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get_value(key)?)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Ok(self.set_value(key, value)?)
    }
}
