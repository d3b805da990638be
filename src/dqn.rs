//! Double DQN agent: epsilon-greedy acting, replay, soft target updates.

use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TrainConfig;
use crate::db::DqnModel;
use crate::game_input::{Features, INPUTS};
use crate::log;
use crate::network::Net;
use crate::policy::Policy;
use crate::replay_buffer::{ReplayBuffer, Transition};
use crate::snake::Direction;
use crate::utils::*;

/// Up / Down / Left / Right.
pub const ACTIONS: usize = 4;

/// Scalars are logged once per this many updates.
const SCALAR_EVERY: u64 = 100;

/// Hyperparameters for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub hidden: usize,          // hidden width of both hidden layers
    pub buffer_capacity: usize, // replay memory size
    pub batch_size: usize,
    pub gamma: f32,             // discount factor
    pub lr: f32,
    pub eps_start: f32,
    pub eps_min: f32,
    pub eps_decay: f32,         // per finished episode
    pub tau: f32,               // soft-update rate for the target network
    pub seed: u64,
}

impl From<&TrainConfig> for AgentConfig {
    fn from(t: &TrainConfig) -> Self {
        Self {
            hidden: t.hidden,
            buffer_capacity: t.memory_size,
            batch_size: t.batch_size,
            gamma: t.gamma,
            lr: t.lr,
            eps_start: t.eps_start,
            eps_min: t.eps_min,
            eps_decay: t.eps_decay,
            tau: t.tau,
            seed: t.seed,
        }
    }
}

/// A policy network must map the feature vector to one Q-value per action.
fn check_policy_shape(net: &Net) -> Result<()> {
    ensure!(
        net.input_dim() == INPUTS && net.output_dim() == ACTIONS,
        "network is {}->{}, expected {}->{}",
        net.input_dim(),
        net.output_dim(),
        INPUTS,
        ACTIONS
    );
    Ok(())
}

/// DQN / Double-DQN agent.
pub struct DQNAgent {
    cfg: AgentConfig,
    online: Net, // argmax and SGD
    target: Net, // bootstrap targets
    replay: ReplayBuffer,
    rng: StdRng, // epsilon-greedy + sampling
    eps: f32,
    episodes_done: usize,
    updates: u64,
}

impl DQNAgent {
    pub fn new(cfg: AgentConfig) -> Result<Self> {
        ensure!(cfg.batch_size > 0, "batch_size must be positive");
        let sizes = [INPUTS, cfg.hidden, cfg.hidden, ACTIONS];
        let online = Net::new(&sizes, cfg.seed)?;
        let mut target = Net::new(&sizes, cfg.seed ^ 0xA5A5_5A5A)?;
        target.copy_from(&online);

        Ok(Self {
            replay: ReplayBuffer::new(cfg.buffer_capacity),
            rng: StdRng::seed_from_u64(0xDEAD_BEEF ^ cfg.seed),
            eps: cfg.eps_start,
            cfg,
            online,
            target,
            episodes_done: 0,
            updates: 0,
        })
    }

    /// Replaces both networks with saved weights and resumes at `epsilon`.
    pub fn load_model(&mut self, model: &DqnModel, epsilon: f32) -> Result<()> {
        let net = model.to_net()?;
        check_policy_shape(&net)?;
        self.online = net;
        self.target.copy_from(&self.online);
        self.eps = epsilon.max(self.cfg.eps_min).min(1.0);
        Ok(())
    }

    pub fn model(&self) -> DqnModel {
        DqnModel::from_net(&self.online)
    }

    pub fn online(&self) -> &Net {
        &self.online
    }

    pub fn epsilon(&self) -> f32 {
        self.eps
    }

    pub fn episodes_done(&self) -> usize {
        self.episodes_done
    }

    pub fn replay_len(&self) -> usize {
        self.replay.len()
    }

    /// Epsilon-greedy action: with prob ε a random action, else argmax Q(s, ·).
    pub fn select_action(&mut self, obs: &Features) -> usize {
        if self.rng.r#gen::<f32>() < self.eps {
            return self.rng.gen_range(0..ACTIONS);
        }
        let q = self.online.forward(obs);
        if has_non_finite(&q) {
            log::error("Q contains NaN/Inf in select_action, falling back to a random action");
            return self.rng.gen_range(0..ACTIONS);
        }
        argmax(&q)
    }

    pub fn remember(&mut self, state: Features, action: usize, reward: f32, next_state: Features, done: bool) {
        self.replay.push(Transition { state, action, reward, next_state, done });
    }

    /// One minibatch update once the memory holds a full batch.
    /// Returns the averaged Huber loss when an update happened.
    pub fn replay(&mut self) -> Option<f32> {
        if !self.replay.is_ready(self.cfg.batch_size) {
            return None;
        }
        self.learn_once()
    }

    fn learn_once(&mut self) -> Option<f32> {
        let batch_size = self.cfg.batch_size as f32;
        let batch: Vec<Transition> = self
            .replay
            .sample(self.cfg.batch_size, &mut self.rng)
            .into_iter()
            .cloned()
            .collect();
        self.online.zero_grad();

        let mut loss_acc = 0.0f32;
        let mut td_errs: Vec<f32> = Vec::with_capacity(batch.len());

        for tr in &batch {
            let trace = self.online.forward_trace(&tr.state);
            let q_s = trace.output();
            if has_non_finite(q_s) {
                log::error("NaN/Inf in Q(s,·) during learn_once, skipping this sample");
                continue;
            }

            // a* = argmax_a' Q_online(s', a'), y = r + γ Q_target(s', a*)
            let mut y = tr.reward;
            if !tr.done {
                let a_star = argmax(&self.online.forward(&tr.next_state));
                y += self.cfg.gamma * self.target.forward(&tr.next_state)[a_star];
            }

            let e = q_s[tr.action] - y;
            td_errs.push(e);

            // Huber (δ=1); dL/dQ is zero except at the taken action
            let g = if e.abs() <= 1.0 { e } else { e.signum() };
            let mut d_q = [0.0f32; ACTIONS];
            d_q[tr.action] = g / batch_size;
            self.online.backward(&trace, &d_q);

            let l = if e.abs() <= 1.0 { 0.5 * e * e } else { e.abs() - 0.5 };
            loss_acc += l / batch_size;
        }

        if td_errs.is_empty() {
            log::warn("learn_once: batch had only NaN samples, skipping update");
            return None;
        }

        let grad_l2 = self.online.grad_l2_sum_all().sqrt();
        if self.online.non_finite_any() || !grad_l2.is_finite() {
            log::error(&format!("non-finite grads/params before step (||g||={}), skipping update", grad_l2));
            self.online.zero_grad();
            return None;
        }

        let scale = self.online.clip_grad_norm(1.0);
        self.online.step_adam(self.cfg.lr, 0.9, 0.999, 1e-8, scale);
        self.target.soft_update_from(&self.online, self.cfg.tau);
        self.updates += 1;

        if self.updates % SCALAR_EVERY == 0 {
            let td = vec_stats(&td_errs);
            log::scalar(self.updates, "loss", loss_acc);
            log::scalar(self.updates, "grad_norm", grad_l2);
            log::scalar(self.updates, "td_mean", td.mean);
            log::scalar(self.updates, "epsilon", self.eps);
        }
        Some(loss_acc)
    }

    /// Called when an episode ends: multiplicative epsilon decay.
    pub fn end_episode(&mut self) {
        self.episodes_done += 1;
        self.eps = (self.eps * self.cfg.eps_decay).max(self.cfg.eps_min);
    }
}

impl Policy for DQNAgent {
    fn act(&mut self, features: &Features) -> Direction {
        Direction::ALL[self.select_action(features)]
    }
}

/// Argmax over a fixed network; used to play or evaluate a trained model.
#[derive(Clone)]
pub struct GreedyPolicy {
    net: Net,
}

impl GreedyPolicy {
    pub fn new(net: Net) -> Result<Self> {
        check_policy_shape(&net)?;
        Ok(Self { net })
    }
}

impl Policy for GreedyPolicy {
    fn act(&mut self, features: &Features) -> Direction {
        Direction::ALL[argmax(&self.net.forward(features))]
    }
}
