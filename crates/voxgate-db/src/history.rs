//! Record of completed syntheses.

use rusqlite::{params, Connection};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// A synthesis about to be recorded.
#[derive(Debug, Clone)]
pub struct NewGeneration {
    pub language: String,
    /// Voice label or clone model name.
    pub voice: String,
    pub reference_text: Option<String>,
    pub generation_text: String,
    /// File name of the delivered audio. The file itself is gone by the time
    /// anyone reads this back.
    pub audio_path: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

/// A stored synthesis, as returned by [`list_recent_generations`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRecord {
    pub id: i64,
    pub language: String,
    pub voice: String,
    pub reference_text: Option<String>,
    pub generation_text: String,
    pub audio_path: String,
    pub created_at: String,
}

/// Inserts a generation and returns its row id.
///
/// # Errors
///
/// Returns `HistoryError::Database` if the insert fails.
pub fn record_generation(conn: &Connection, generation: &NewGeneration) -> Result<i64, HistoryError> {
    conn.execute(
        "INSERT INTO audio_generations
            (language, voice, reference_text, generation_text, audio_path, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            generation.language,
            generation.voice,
            generation.reference_text,
            generation.generation_text,
            generation.audio_path,
            generation.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Returns up to `limit` generations, newest first.
///
/// # Errors
///
/// Returns `HistoryError::Database` if the query fails.
pub fn list_recent_generations(
    conn: &Connection,
    limit: u32,
) -> Result<Vec<GenerationRecord>, HistoryError> {
    let mut stmt = conn.prepare(
        "SELECT id, language, voice, reference_text, generation_text, audio_path, created_at
         FROM audio_generations
         ORDER BY created_at DESC, id DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit], |row| {
        Ok(GenerationRecord {
            id: row.get(0)?,
            language: row.get(1)?,
            voice: row.get(2)?,
            reference_text: row.get(3)?,
            generation_text: row.get(4)?,
            audio_path: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}
