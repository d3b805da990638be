use anyhow::Result;
use rayon::prelude::*;
use std::path::Path;

use crate::config::{AppConfig, GameConfig, TrainConfig};
use crate::db::*;
use crate::dqn::{AgentConfig, DQNAgent, GreedyPolicy};
use crate::game::{Game, GameStatus, Snapshot};
use crate::game_input::extract_features;
use crate::log;
use crate::network::Net;
use crate::policy::{drive, Policy};
use crate::snake::Direction;
use crate::utils::{rolling_mean, vec_stats, Stats};

/// Window of the rolling mean score.
const MEAN_WINDOW: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeResult {
    pub score: u32,
    pub steps: usize,
    pub status: GameStatus,
}

#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub episodes: usize,
    pub best_score: u32,
    pub mean_score: f32,
    pub epsilon: f32,
}

/// Game settings for one episode: the configured board with a per-episode seed.
fn episode_config(game_cfg: &GameConfig, base_seed: u64, episode: usize) -> GameConfig {
    GameConfig {
        seed: Some(game_cfg.seed.unwrap_or(base_seed).wrapping_add(episode as u64)),
        ..game_cfg.clone()
    }
}

/// Plays one game with `policy` until it ends or `max_steps` ticks pass (0 = no cap).
pub fn play_episode<P: Policy + ?Sized>(policy: &mut P, game: &mut Game, max_steps: usize) -> EpisodeResult {
    let mut steps = 0;
    while !game.is_over() && (max_steps == 0 || steps < max_steps) {
        drive(policy, game);
        game.update();
        steps += 1;
    }
    EpisodeResult { score: game.score(), steps, status: game.status() }
}

pub struct Trainer {
    game_cfg: GameConfig,
    cfg: TrainConfig,
    agent: DQNAgent,
    history: Option<History>,
    scores: Vec<f32>,
    mean_scores: Vec<f32>,
    best_score: u32,
    start_episode: usize,
}

impl Trainer {
    pub fn new(game_cfg: GameConfig, cfg: TrainConfig) -> Result<Self> {
        AppConfig { game: game_cfg.clone(), train: cfg.clone() }.validate()?;
        let agent = DQNAgent::new(AgentConfig::from(&cfg))?;
        Ok(Self {
            game_cfg,
            cfg,
            agent,
            history: None,
            scores: Vec::new(),
            mean_scores: Vec::new(),
            best_score: 0,
            start_episode: 0,
        })
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = Some(history);
        self
    }

    /// Continues from a saved checkpoint if one exists. Returns whether it did.
    /// With a history attached, the rolling mean picks up its last episodes.
    pub fn resume_from(&mut self, path: &Path) -> Result<bool> {
        let Some(ckpt) = load_checkpoint(path)? else {
            return Ok(false);
        };
        self.agent.load_model(&ckpt.model, ckpt.meta.epsilon)?;
        self.best_score = ckpt.meta.best_score;
        self.start_episode = ckpt.meta.episode + 1;
        if let Some(history) = &self.history {
            self.scores = history.recent(MEAN_WINDOW)?.iter().map(|r| r.score as f32).collect();
        }
        log::info(&format!(
            "loaded {} (episode {}, best {}, eps {:.3})",
            path.display(),
            ckpt.meta.episode,
            ckpt.meta.best_score,
            ckpt.meta.epsilon
        ));
        Ok(true)
    }

    pub fn agent(&self) -> &DQNAgent {
        &self.agent
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn mean_scores(&self) -> &[f32] {
        &self.mean_scores
    }

    pub fn best_score(&self) -> u32 {
        self.best_score
    }

    /// One learning episode. `on_frame` sees the board every `ticks_per_step` ticks.
    pub fn run_episode<F: FnMut(&Snapshot)>(&mut self, episode: usize, on_frame: &mut F) -> Result<EpisodeResult> {
        let mut game = Game::from_config(&episode_config(&self.game_cfg, self.cfg.seed, episode))?;
        let mut state = extract_features(&game);
        let mut steps = 0usize;

        'episode: loop {
            for _ in 0..self.cfg.ticks_per_step {
                let action = self.agent.select_action(&state);
                game.change_direction(Direction::ALL[action]);

                let score_before = game.score();
                game.update();
                steps += 1;

                let mut reward = self.cfg.step_reward;
                if game.score() > score_before {
                    reward = self.cfg.food_reward;
                }
                if let GameStatus::GameOver(_) = game.status() {
                    reward = self.cfg.death_penalty;
                }
                let done = game.is_over();

                let next_state = extract_features(&game);
                self.agent.remember(state, action, reward, next_state, done);
                self.agent.replay();
                state = next_state;

                if done || (self.cfg.max_steps > 0 && steps >= self.cfg.max_steps) {
                    break 'episode;
                }
            }
            on_frame(&game.snapshot());
        }
        on_frame(&game.snapshot());

        Ok(EpisodeResult { score: game.score(), steps, status: game.status() })
    }

    pub fn train(&mut self) -> Result<TrainSummary> {
        self.train_with(&mut |_| {})
    }

    pub fn train_with<F: FnMut(&Snapshot)>(&mut self, on_frame: &mut F) -> Result<TrainSummary> {
        let start = self.start_episode;
        let end = start + self.cfg.episodes;
        for episode in start..end {
            let result = self.run_episode(episode, on_frame)?;
            self.agent.end_episode();
            self.record(episode, &result)?;
        }
        self.start_episode = end;

        let summary = TrainSummary {
            episodes: end - start,
            best_score: self.best_score,
            mean_score: self.mean_scores.last().copied().unwrap_or(0.0),
            epsilon: self.agent.epsilon(),
        };
        log::info(&format!(
            "training done: {} episodes, best {}, mean {:.2}, eps {:.4}",
            summary.episodes, summary.best_score, summary.mean_score, summary.epsilon
        ));
        Ok(summary)
    }

    fn record(&mut self, episode: usize, result: &EpisodeResult) -> Result<()> {
        self.scores.push(result.score as f32);
        let mean_score = rolling_mean(&self.scores, MEAN_WINDOW);
        self.mean_scores.push(mean_score);

        if let Some(history) = &self.history {
            history.insert_episode(&EpisodeRecord {
                episode,
                score: result.score,
                steps: result.steps,
                mean_score,
                epsilon: self.agent.epsilon(),
            })?;
        }

        if result.score > self.best_score {
            self.best_score = result.score;
            let checkpoint = DqnCheckpoint {
                meta: DqnMetadata {
                    episode,
                    epsilon: self.agent.epsilon(),
                    best_score: self.best_score,
                    mean_score,
                    grid_width: self.game_cfg.grid_width,
                    grid_height: self.game_cfg.grid_height,
                },
                model: self.agent.model(),
            };
            save_checkpoint(Path::new(&self.cfg.checkpoint_path), &checkpoint)?;
            log::info(&format!("new best model: score = {} (episode {})", self.best_score, episode));
        }

        if self.cfg.log_every > 0 && episode % self.cfg.log_every == 0 {
            log::info(&format!(
                "Episode: {}, Score: {}, Average Score: {:.2}, Epsilon: {:.2}, Memory: {}",
                episode,
                result.score,
                mean_score,
                self.agent.epsilon(),
                self.agent.replay_len()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EvalSummary {
    pub scores: Vec<u32>,
    pub stats: Stats,
    pub crashes: usize,
}

/// Plays `games` greedy games in parallel, game `i` seeded with `seed + i`.
pub fn evaluate(net: &Net, game_cfg: &GameConfig, games: usize, seed: u64, max_steps: usize) -> Result<EvalSummary> {
    let policy = GreedyPolicy::new(net.clone())?;
    let results = (0..games)
        .into_par_iter()
        .map(|i| {
            let mut game = Game::from_config(&episode_config(game_cfg, seed, i))?;
            let mut policy = policy.clone();
            Ok(play_episode(&mut policy, &mut game, max_steps))
        })
        .collect::<Result<Vec<EpisodeResult>>>()?;

    let scores: Vec<u32> = results.iter().map(|r| r.score).collect();
    let as_f32: Vec<f32> = scores.iter().map(|&s| s as f32).collect();
    let crashes = results.iter().filter(|r| matches!(r.status, GameStatus::GameOver(_))).count();
    Ok(EvalSummary { stats: vec_stats(&as_f32), scores, crashes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RandomPolicy;

    fn small_cfgs(tag: &str) -> (GameConfig, TrainConfig) {
        let game = GameConfig { grid_width: 8, grid_height: 8, initial_length: 3, seed: Some(1) };
        let path = std::env::temp_dir().join(format!("snake_dqn_train_{}_{}.json", tag, std::process::id()));
        let train = TrainConfig {
            episodes: 4,
            max_steps: 60,
            hidden: 8,
            batch_size: 8,
            memory_size: 200,
            log_every: 0,
            checkpoint_path: path.to_string_lossy().into_owned(),
            ..TrainConfig::default()
        };
        (game, train)
    }

    #[test]
    fn test_episode_config_seeds() {
        let fixed = GameConfig { seed: Some(10), ..GameConfig::default() };
        assert_eq!(episode_config(&fixed, 99, 3).seed, Some(13));
        let free = GameConfig::default();
        assert_eq!(episode_config(&free, 99, 3).seed, Some(102));
    }

    #[test]
    fn test_play_episode_respects_step_cap() {
        let mut game = Game::from_config(&GameConfig { seed: Some(2), ..GameConfig::default() }).unwrap();
        let mut policy = RandomPolicy::new(5);
        let result = play_episode(&mut policy, &mut game, 5);
        assert!(result.steps <= 5);
        assert!(result.steps == 5 || game.is_over());
    }

    #[test]
    fn test_random_play_always_ends() {
        let mut game = Game::from_config(&GameConfig { seed: Some(4), ..GameConfig::default() }).unwrap();
        let result = play_episode(&mut RandomPolicy::new(1), &mut game, 0);
        assert!(game.is_over());
        assert_eq!(result.status, game.status());
    }

    #[test]
    fn test_training_run_records_everything() {
        log::init(None);
        let (game, train) = small_cfgs("run");
        let ckpt_path = std::path::PathBuf::from(&train.checkpoint_path);
        let _ = std::fs::remove_file(&ckpt_path);

        let mut trainer = Trainer::new(game, train).unwrap().with_history(History::in_memory().unwrap());
        let mut frames = 0usize;
        let summary = trainer.train_with(&mut |_| frames += 1).unwrap();

        assert_eq!(summary.episodes, 4);
        assert_eq!(trainer.scores().len(), 4);
        assert_eq!(trainer.mean_scores().len(), 4);
        assert!(frames >= 4);
        assert!(summary.epsilon < 1.0);
        let history = trainer.history.as_ref().unwrap();
        assert_eq!(history.count().unwrap(), 4);

        let best = trainer.scores().iter().cloned().fold(0.0f32, f32::max) as u32;
        assert_eq!(summary.best_score, best);
        assert_eq!(ckpt_path.exists(), best > 0);
        let _ = std::fs::remove_file(&ckpt_path);
    }

    #[test]
    fn test_ticks_per_step_batches_frames() {
        log::init(None);
        let (game, mut train) = small_cfgs("ticks");
        train.ticks_per_step = 4;
        let mut trainer = Trainer::new(game, train).unwrap();
        let mut frames = 0usize;
        let result = trainer.run_episode(0, &mut |_| frames += 1).unwrap();
        // one frame per full batch of ticks, plus the final board
        assert_eq!(frames, result.steps.div_ceil(4));
        let _ = std::fs::remove_file(&trainer.cfg.checkpoint_path);
    }

    #[test]
    fn test_resume_from_checkpoint() {
        log::init(None);
        let (game, train) = small_cfgs("resume");
        let path = std::path::PathBuf::from(&train.checkpoint_path);
        let source = DQNAgent::new(AgentConfig::from(&train)).unwrap();
        let ckpt = DqnCheckpoint {
            meta: DqnMetadata { episode: 9, epsilon: 0.25, best_score: 3, mean_score: 1.0, grid_width: 8, grid_height: 8 },
            model: source.model(),
        };
        save_checkpoint(&path, &ckpt).unwrap();

        let mut trainer = Trainer::new(game, train).unwrap();
        assert!(trainer.resume_from(&path).unwrap());
        assert_eq!(trainer.best_score(), 3);
        assert_eq!(trainer.start_episode, 10);
        assert!((trainer.agent().epsilon() - 0.25).abs() < 1e-6);
        let _ = std::fs::remove_file(&path);
        assert!(!trainer.resume_from(&path).unwrap());
    }

    #[test]
    fn test_resume_restores_mean_window_from_history() {
        log::init(None);
        let (game, mut train) = small_cfgs("resume_hist");
        train.episodes = 1;
        let path = std::path::PathBuf::from(&train.checkpoint_path);
        let source = DQNAgent::new(AgentConfig::from(&train)).unwrap();
        let ckpt = DqnCheckpoint {
            meta: DqnMetadata { episode: 2, epsilon: 0.5, best_score: 100, mean_score: 4.0, grid_width: 8, grid_height: 8 },
            model: source.model(),
        };
        save_checkpoint(&path, &ckpt).unwrap();

        let history = History::in_memory().unwrap();
        for (episode, score) in [(0, 2u32), (1, 6), (2, 4)] {
            history
                .insert_episode(&EpisodeRecord { episode, score, steps: 5, mean_score: 0.0, epsilon: 0.5 })
                .unwrap();
        }
        let mut trainer = Trainer::new(game, train).unwrap().with_history(history);
        assert!(trainer.resume_from(&path).unwrap());
        assert_eq!(trainer.scores(), &[2.0, 6.0, 4.0]);

        let summary = trainer.train().unwrap();
        assert_eq!(summary.episodes, 1);
        assert_eq!(trainer.scores().len(), 4);
        let expected = trainer.scores().iter().sum::<f32>() / 4.0;
        assert!((summary.mean_score - expected).abs() < 1e-5);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let net = Net::new(&[crate::game_input::INPUTS, 8, 8, 4], 6).unwrap();
        let cfg = GameConfig { grid_width: 10, grid_height: 10, initial_length: 3, seed: None };
        let a = evaluate(&net, &cfg, 6, 100, 200).unwrap();
        let b = evaluate(&net, &cfg, 6, 100, 200).unwrap();
        assert_eq!(a.scores.len(), 6);
        assert_eq!(a.scores, b.scores);
        assert!(a.crashes <= 6);
    }

    #[test]
    fn test_evaluate_rejects_network_of_wrong_shape() {
        // five outputs, the bias always picks the out-of-range one
        let mut layers = Net::new(&[crate::game_input::INPUTS, 5], 1).unwrap().layers().to_vec();
        layers[0].biases[4] = 100.0;
        let net = Net::from_layers(layers).unwrap();
        let cfg = GameConfig { grid_width: 10, grid_height: 10, initial_length: 3, seed: None };
        assert!(evaluate(&net, &cfg, 1, 0, 10).is_err());
    }
}
