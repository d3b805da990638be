use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use snake_dqn::config::AppConfig;
use snake_dqn::db::{load_checkpoint, History};
use snake_dqn::game::Game;
use snake_dqn::log;
use snake_dqn::policy::RandomPolicy;
use snake_dqn::train::{evaluate, play_episode, Trainer};

#[derive(Parser)]
#[command(name = "snake_dqn")]
#[command(version, about = "Headless snake with a Double DQN trainer")]
struct Cli {
    /// JSON config file; defaults are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the agent, resuming from the checkpoint if there is one
    Train {
        #[arg(long)]
        episodes: Option<usize>,

        #[arg(long)]
        checkpoint: Option<PathBuf>,

        #[arg(long)]
        history: Option<PathBuf>,

        /// Start from fresh weights even if a checkpoint exists
        #[arg(long)]
        fresh: bool,
    },
    /// Play greedy games with a saved model
    Eval {
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        #[arg(long, default_value = "100")]
        games: usize,

        #[arg(long, default_value = "0")]
        seed: u64,

        /// Play with a uniformly random policy instead of a model
        #[arg(long)]
        random: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Command::Train { episodes, checkpoint, history, fresh } => {
            if let Some(n) = episodes {
                cfg.train.episodes = n;
            }
            if let Some(p) = checkpoint {
                cfg.train.checkpoint_path = p.to_string_lossy().into_owned();
            }
            if let Some(p) = history {
                cfg.train.history_path = p.to_string_lossy().into_owned();
            }
            cfg.validate()?;
            log::init(Some(PathBuf::from(&cfg.train.log_path)));
            train(cfg, fresh)
        }
        Command::Eval { checkpoint, games, seed, random } => {
            log::init(None);
            let path = checkpoint.unwrap_or_else(|| PathBuf::from(&cfg.train.checkpoint_path));
            if random {
                eval_random(&cfg, games, seed)
            } else {
                eval(&cfg, &path, games, seed)
            }
        }
    }
}

fn train(cfg: AppConfig, fresh: bool) -> Result<()> {
    let history = History::open(Path::new(&cfg.train.history_path))?;
    if let Some(best) = history.best_score()? {
        log::info(&format!("history has {} episodes, best score {}", history.count()?, best));
    }

    let checkpoint = PathBuf::from(&cfg.train.checkpoint_path);
    let mut trainer = Trainer::new(cfg.game.clone(), cfg.train.clone())?.with_history(history);
    if !fresh && !trainer.resume_from(&checkpoint)? {
        log::info("no checkpoint found, starting from scratch");
    }
    trainer.train()?;
    Ok(())
}

fn eval(cfg: &AppConfig, path: &Path, games: usize, seed: u64) -> Result<()> {
    let Some(ckpt) = load_checkpoint(path)? else {
        bail!("no checkpoint at {}", path.display());
    };
    if (ckpt.meta.grid_width, ckpt.meta.grid_height) != (cfg.game.grid_width, cfg.game.grid_height) {
        log::warn(&format!(
            "model was trained on {}x{}, evaluating on {}x{}",
            ckpt.meta.grid_width, ckpt.meta.grid_height, cfg.game.grid_width, cfg.game.grid_height
        ));
    }
    let net = ckpt.model.to_net()?;
    let summary = evaluate(&net, &cfg.game, games, seed, cfg.train.max_steps)?;
    log::info(&format!(
        "{} games: mean {:.2}, min {}, max {}, crashes {}",
        summary.scores.len(),
        summary.stats.mean,
        summary.stats.min,
        summary.stats.max,
        summary.crashes
    ));
    Ok(())
}

fn eval_random(cfg: &AppConfig, games: usize, seed: u64) -> Result<()> {
    let mut policy = RandomPolicy::new(seed);
    let mut total = 0u64;
    let mut best = 0u32;
    for i in 0..games {
        let game_cfg = snake_dqn::config::GameConfig {
            seed: Some(seed.wrapping_add(i as u64)),
            ..cfg.game.clone()
        };
        let mut game = Game::from_config(&game_cfg)?;
        let result = play_episode(&mut policy, &mut game, cfg.train.max_steps);
        total += result.score as u64;
        best = best.max(result.score);
    }
    let mean = if games == 0 { 0.0 } else { total as f64 / games as f64 };
    log::info(&format!("random policy, {} games: mean {:.2}, best {}", games, mean, best));
    Ok(())
}
