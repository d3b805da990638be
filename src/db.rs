use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::network::{Layer, Net};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DqnMetadata {
    pub episode: usize,
    pub epsilon: f32,
    pub best_score: u32,
    pub mean_score: f32,
    pub grid_width: u32,
    pub grid_height: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DqnModel {
    pub layers: Vec<Layer>,
}

impl DqnModel {
    pub fn from_net(net: &Net) -> Self {
        Self { layers: net.layers().to_vec() }
    }

    pub fn to_net(&self) -> Result<Net> {
        Net::from_layers(self.layers.clone())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DqnCheckpoint {
    pub meta: DqnMetadata,
    pub model: DqnModel,
}

/// save in json file
pub fn save_checkpoint(path: &Path, checkpoint: &DqnCheckpoint) -> Result<()> {
    let json = serde_json::to_string(checkpoint).context("could not serialize checkpoint")?;
    fs::write(path, json).with_context(|| format!("could not write checkpoint {}", path.display()))
}

/// `Ok(None)` when there is no checkpoint yet.
pub fn load_checkpoint(path: &Path) -> Result<Option<DqnCheckpoint>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("could not read checkpoint {}", path.display()))?;
    let ckpt = serde_json::from_str(&content)
        .with_context(|| format!("could not parse checkpoint {}", path.display()))?;
    Ok(Some(ckpt))
}

/// One finished training episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRecord {
    pub episode: usize,
    pub score: u32,
    pub steps: usize,
    pub mean_score: f32,
    pub epsilon: f32,
}

/// Episode history kept in SQLite.
pub struct History {
    conn: Connection,
}

impl History {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("could not open history db {}", path.display()))?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS episodes (
                id          INTEGER PRIMARY KEY,
                episode     INTEGER NOT NULL,
                score       INTEGER NOT NULL,
                steps       INTEGER NOT NULL,
                mean_score  REAL NOT NULL,
                epsilon     REAL NOT NULL,
                recorded_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn insert_episode(&self, rec: &EpisodeRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO episodes (episode, score, steps, mean_score, epsilon, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                rec.episode as i64,
                rec.score,
                rec.steps as i64,
                rec.mean_score as f64,
                rec.epsilon as f64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn best_score(&self) -> Result<Option<u32>> {
        let best: Option<u32> = self
            .conn
            .query_row("SELECT MAX(score) FROM episodes", [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(best)
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM episodes", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Last `limit` episodes, oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<EpisodeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT episode, score, steps, mean_score, epsilon FROM episodes
             ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(EpisodeRecord {
                episode: row.get::<_, i64>(0)? as usize,
                score: row.get(1)?,
                steps: row.get::<_, i64>(2)? as usize,
                mean_score: row.get::<_, f64>(3)? as f32,
                epsilon: row.get::<_, f64>(4)? as f32,
            })
        })?;
        let mut out = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        out.reverse();
        Ok(out)
    }
}
