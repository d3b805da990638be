use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Board settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    pub initial_length: usize,
    /// Fixed seed for food placement; random when absent.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        // 800x600 window with 40px cells
        Self { grid_width: 20, grid_height: 15, initial_length: 3, seed: None }
    }
}

/// DQN and harness hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub episodes: usize,
    pub max_steps: usize,      // per episode, 0 = unlimited
    pub ticks_per_step: usize, // speed multiplier: policy+update cycles per loop pass
    pub hidden: usize,
    pub gamma: f32,
    pub lr: f32,
    pub batch_size: usize,
    pub memory_size: usize,
    pub eps_start: f32,
    pub eps_min: f32,
    pub eps_decay: f32, // multiplied in at the end of every episode
    pub tau: f32,       // soft target update rate
    pub food_reward: f32,
    pub death_penalty: f32,
    pub step_reward: f32,
    pub seed: u64,
    pub log_every: usize,
    pub checkpoint_path: String,
    pub history_path: String,
    pub log_path: String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            episodes: 1000,
            max_steps: 2000,
            ticks_per_step: 1,
            hidden: 64,
            gamma: 0.99,
            lr: 0.001,
            batch_size: 64,
            memory_size: 10_000,
            eps_start: 1.0,
            eps_min: 0.01,
            eps_decay: 0.99,
            tau: 0.01,
            food_reward: 10.0,
            death_penalty: -10.0,
            step_reward: 0.0,
            seed: 42,
            log_every: 100,
            checkpoint_path: "best_model.json".to_string(),
            history_path: "history.db".to_string(),
            log_path: "train.log".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub game: GameConfig,
    pub train: TrainConfig,
}

impl AppConfig {
    /// Reads a JSON config; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read config {}", path.display()))?;
        let cfg: AppConfig = serde_json::from_str(&text)
            .with_context(|| format!("could not parse config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("could not write config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.game;
        let t = &self.train;
        ensure!(g.grid_width > 0 && g.grid_height > 0, "grid must be at least 1x1");
        ensure!(g.initial_length >= 1, "initial_length must be at least 1");
        ensure!(
            g.initial_length <= g.grid_width as usize / 2 + 1,
            "initial_length {} does not fit a grid {} cells wide",
            g.initial_length,
            g.grid_width
        );
        ensure!(t.hidden > 0, "hidden must be positive");
        ensure!(t.batch_size > 0, "batch_size must be positive");
        ensure!(t.memory_size >= t.batch_size, "memory_size must hold at least one batch");
        ensure!(t.ticks_per_step >= 1, "ticks_per_step must be at least 1");
        ensure!((0.0..=1.0).contains(&t.gamma), "gamma must be in [0, 1]");
        ensure!((0.0..=1.0).contains(&t.tau), "tau must be in [0, 1]");
        ensure!(t.eps_min <= t.eps_start, "eps_min must not exceed eps_start");
        ensure!(t.eps_decay > 0.0 && t.eps_decay <= 1.0, "eps_decay must be in (0, 1]");
        ensure!(t.lr > 0.0, "lr must be positive");
        Ok(())
    }
}
