//! Deep Deterministic Policy Gradient
//!
//! Off-policy actor-critic for continuous actions. Every environment step adds
//! one transition to the replay buffer; once the buffer holds `min_pool_size`
//! transitions each step also triggers `n_updates_per_sample` updates:
//!
//! 1. `y = r + (1 - done) * γ * Q'(s', μ'(s'))` from the target networks
//! 2. one critic step on `MSE(Q(s, a), y)`
//! 3. one actor step on `-mean(Q(s, μ(s)))`
//! 4. `θ' ← τθ + (1 - τ)θ'` for both target networks
//!
//! At the end of every epoch the noise-free actor is evaluated and the
//! parameters are handed to the snapshotter.

pub mod stats;

use std::marker::PhantomData;
use std::path::Path;

use anyhow::{Result, ensure};
use tch::{Device, Kind, Reduction, Tensor, nn};

use crate::agent::Agent;
use crate::config::DdpgConfig;
use crate::environment::Environment;
use crate::networks::actor::Actor;
use crate::networks::critic::Critic;
use crate::networks::params::{param_norm, soft_update};
use crate::policies::ExplorationStrategy;
use crate::policy::Policy;
use crate::replay_buffer::{ReplayBuffer, TransitionBatch};
use crate::snapshot::{self, DdpgSnapshot, Snapshotter};
use crate::utils::{batch_tensor, column_tensor, mean, plot_rewards};

use self::stats::{EvalStats, UpdateAccumulator, UpdateStats, summarize_returns};

/// Bookkeeping of the episode currently being collected.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpisodeState {
    pub path_length: usize,
    pub path_return: f32,
    pub terminal: bool,
}

/// Loop state carried between environment steps.
#[derive(Debug, Clone)]
pub struct TrainingState<S> {
    pub observation: S,
    pub episode: EpisodeState,
    /// Global environment step counter
    pub itr: usize,
}

impl<S> TrainingState<S> {
    pub fn new(observation: S) -> Self {
        TrainingState {
            observation,
            episode: EpisodeState::default(),
            itr: 0,
        }
    }
}

pub struct DdpgAgent<E: Environment, ES: ExplorationStrategy> {
    config: DdpgConfig,
    actor: Actor,
    critic: Critic,
    target_actor: Actor,
    target_critic: Critic,
    actor_opt: nn::Optimizer,
    critic_opt: nn::Optimizer,
    pool: ReplayBuffer,
    es: ES,
    device: Device,
    observation_dim: usize,
    action_dim: usize,
    update_stats: UpdateAccumulator,
    es_path_returns: Vec<f32>,
    eval_history: Vec<EvalStats>,
    snapshotter: Option<Box<dyn Snapshotter>>,
    epochs_completed: usize,
    _marker: PhantomData<E>, // ⬅️ 为了让编译器知道用到了 E
}

impl<E, ES> DdpgAgent<E, ES>
where
    E: Environment,
    ES: ExplorationStrategy,
{
    pub fn new(env: &E, mut es: ES, config: DdpgConfig, device: Device) -> Result<Self> {
        config.validate()?;
        if let Some(seed) = config.seed {
            tch::manual_seed(seed as i64);
            es.seed(seed);
        }

        let observation_dim = env.state_dim();
        let action_dim = env.action_dim();

        let actor = Actor::new(
            nn::VarStore::new(device),
            observation_dim,
            action_dim,
            &config.actor_hidden_sizes,
            env.action_bound(),
        );
        let critic = Critic::new(
            nn::VarStore::new(device),
            observation_dim,
            action_dim,
            &config.critic_hidden_sizes,
        );

        // Targets start as exact copies and are never handed to an optimizer.
        let mut target_actor = actor.try_clone()?;
        target_actor.var_store_mut().freeze();
        let mut target_critic = critic.try_clone()?;
        target_critic.var_store_mut().freeze();

        let critic_opt = config.qf_update_method.build(
            critic.var_store(),
            config.qf_learning_rate,
            config.qf_weight_decay,
        )?;
        let actor_opt = config.policy_update_method.build(
            actor.var_store(),
            config.policy_learning_rate,
            config.policy_weight_decay,
        )?;

        let pool = match config.seed {
            Some(seed) => ReplayBuffer::with_seed(config.replay_pool_size, observation_dim, action_dim, seed),
            None => ReplayBuffer::new(config.replay_pool_size, observation_dim, action_dim),
        };

        tracing::info!(
            ?device,
            observation_dim,
            action_dim,
            "DDPG agent created"
        );

        Ok(DdpgAgent {
            config,
            actor,
            critic,
            target_actor,
            target_critic,
            actor_opt,
            critic_opt,
            pool,
            es,
            device,
            observation_dim,
            action_dim,
            update_stats: UpdateAccumulator::default(),
            es_path_returns: Vec::new(),
            eval_history: Vec::new(),
            snapshotter: None,
            epochs_completed: 0,
            _marker: PhantomData,
        })
    }

    pub fn with_snapshotter(mut self, snapshotter: impl Snapshotter + 'static) -> Self {
        self.snapshotter = Some(Box::new(snapshotter));
        self
    }

    pub fn config(&self) -> &DdpgConfig {
        &self.config
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn critic(&self) -> &Critic {
        &self.critic
    }

    pub fn target_actor(&self) -> &Actor {
        &self.target_actor
    }

    pub fn target_critic(&self) -> &Critic {
        &self.target_critic
    }

    pub fn pool(&self) -> &ReplayBuffer {
        &self.pool
    }

    pub fn exploration(&self) -> &ES {
        &self.es
    }

    pub fn eval_history(&self) -> &[EvalStats] {
        &self.eval_history
    }

    /// Updates performed since the last evaluation.
    pub fn pending_updates(&self) -> usize {
        self.update_stats.len()
    }

    /// Start a new episode if the previous step ended one.
    pub fn reset_if_terminal(&mut self, env: &mut E, state: &mut TrainingState<E::State>) -> Result<()> {
        if state.episode.terminal {
            // The observation reached by the last step of an episode is never
            // used as the source of a stored transition.
            state.observation = env.reset()?;
            self.es.reset();
            self.es_path_returns.push(state.episode.path_return);
            state.episode = EpisodeState::default();
        }
        Ok(())
    }

    /// Collect one transition and run the updates it triggers.
    pub fn env_step(&mut self, env: &mut E, state: &mut TrainingState<E::State>) -> Result<()> {
        self.reset_if_terminal(env, state)?;

        let action = self
            .es
            .get_action(state.itr, state.observation.as_ref(), &self.actor)?;
        let result = env.step(&action)?;
        let reward: f32 = result.reward.into();

        state.episode.path_length += 1;
        state.episode.path_return += reward;
        state.episode.terminal = result.done;

        let scaled_reward = reward * self.config.scale_reward;
        if !result.done && state.episode.path_length >= self.config.max_path_length {
            state.episode.terminal = true;
            // only include the terminal transition in this case if the flag was set
            if self.config.include_horizon_terminal_transitions {
                self.pool.add_sample(
                    state.observation.as_ref(),
                    &action,
                    scaled_reward,
                    result.next_state.as_ref(),
                    true,
                )?;
            }
        } else {
            self.pool.add_sample(
                state.observation.as_ref(),
                &action,
                scaled_reward,
                result.next_state.as_ref(),
                result.done,
            )?;
        }

        state.observation = result.next_state;

        if !self.pool.is_empty() && self.pool.size() >= self.config.min_pool_size {
            for _ in 0..self.config.n_updates_per_sample {
                let batch = self.pool.random_batch(self.config.batch_size)?;
                let stats = self.do_training(&batch)?;
                self.update_stats.push(stats);
            }
        }

        state.itr += 1;
        Ok(())
    }

    /// Regression targets `r + (1 - done) * γ * Q'(s', μ'(s'))`, shape `[batch, 1]`.
    pub fn compute_targets(&self, rewards: &Tensor, terminals: &Tensor, next_observations: &Tensor) -> Tensor {
        tch::no_grad(|| {
            let next_actions = self.target_actor.forward(next_observations);
            let next_q = self.target_critic.forward(next_observations, &next_actions);
            let not_terminal = terminals.ones_like() - terminals;
            rewards + not_terminal * self.config.discount * next_q
        })
    }

    /// One full update on a mini-batch: critic, actor, then both targets.
    pub fn do_training(&mut self, batch: &TransitionBatch) -> Result<UpdateStats> {
        ensure!(batch.batch_size > 0, "empty mini-batch");
        ensure!(
            batch.observation_dim == self.observation_dim && batch.action_dim == self.action_dim,
            "mini-batch dimensions ({}, {}) do not match the networks ({}, {})",
            batch.observation_dim,
            batch.action_dim,
            self.observation_dim,
            self.action_dim
        );

        let b = batch.batch_size;
        let obs = batch_tensor(&batch.observations, b, self.observation_dim, self.device);
        let actions = batch_tensor(&batch.actions, b, self.action_dim, self.device);
        let next_obs = batch_tensor(&batch.next_observations, b, self.observation_dim, self.device);
        let rewards = column_tensor(&batch.rewards, self.device);
        let terminals = column_tensor(&batch.terminals, self.device);

        let ys = self.compute_targets(&rewards, &terminals, &next_obs);

        let (qf_loss, qs) = self.train_qf(&ys, &obs, &actions);
        let policy_surr = self.train_policy(&obs);

        soft_update(
            self.target_actor.var_store_mut(),
            self.actor.var_store(),
            self.config.soft_target_tau,
        )?;
        soft_update(
            self.target_critic.var_store_mut(),
            self.critic.var_store(),
            self.config.soft_target_tau,
        )?;

        Ok(UpdateStats {
            qf_loss,
            policy_surr,
            q_mean: qs.mean(Kind::Double).double_value(&[]),
            abs_q_mean: qs.abs().mean(Kind::Double).double_value(&[]),
            y_mean: ys.mean(Kind::Double).double_value(&[]),
            abs_y_mean: ys.abs().mean(Kind::Double).double_value(&[]),
            abs_qy_diff_mean: (&qs - &ys).abs().mean(Kind::Double).double_value(&[]),
        })
    }

    /// Fit `Q(s, a)` to the targets with one optimizer step; returns the loss and the
    /// pre-update Q values.
    fn train_qf(&mut self, ys: &Tensor, obs: &Tensor, actions: &Tensor) -> (f64, Tensor) {
        let qs = self.critic.forward(obs, actions);
        let loss = qs.mse_loss(ys, Reduction::Mean);
        self.critic_opt.backward_step(&loss);
        (loss.double_value(&[]), qs.detach())
    }

    /// Gradient ascent on `mean(Q(s, μ(s)))`; only the actor optimizer steps.
    fn train_policy(&mut self, obs: &Tensor) -> f64 {
        let surr = -self.critic.forward(obs, &self.actor.forward(obs)).mean(Kind::Float);
        self.actor_opt.backward_step(&surr);
        surr.double_value(&[])
    }

    fn save_epoch_snapshot(&mut self, epoch: usize, stats: Option<&EvalStats>) -> Result<()> {
        if let Some(snapshotter) = self.snapshotter.as_mut() {
            let snapshot = DdpgSnapshot {
                epoch,
                actor: self.actor.var_store(),
                critic: self.critic.var_store(),
                target_actor: self.target_actor.var_store(),
                target_critic: self.target_critic.var_store(),
                config: &self.config,
                stats,
            };
            snapshotter.save_itr_params(epoch, &snapshot)?;
        }
        Ok(())
    }
}

impl<E, ES> Agent<E> for DdpgAgent<E, ES>
where
    E: Environment + Clone,
    ES: ExplorationStrategy,
{
    type Report = EvalStats;

    fn train(&mut self, env: &mut E) -> Result<()> {
        // Evaluation runs on its own copy so it never disturbs the episode being collected.
        let mut eval_env = env.clone();
        if let Some(seed) = self.config.seed {
            env.seed(seed);
            eval_env.seed(seed.wrapping_add(1));
        }
        let mut state = TrainingState::new(env.reset()?);

        for epoch in 0..self.config.n_epochs {
            let span = tracing::info_span!("epoch", epoch);
            let _enter = span.enter();
            tracing::info!("Training started");

            for _ in 0..self.config.epoch_length {
                self.env_step(env, &mut state)?;
            }

            tracing::info!("Training finished");
            if self.pool.size() >= self.config.min_pool_size {
                let stats = self.evaluate(&mut eval_env, epoch)?;
                self.save_epoch_snapshot(epoch, Some(&stats))?;
            }
            self.epochs_completed = epoch + 1;
        }

        env.terminate();
        eval_env.terminate();

        if let Some(path) = self.config.plot_path.clone() {
            let returns: Vec<f32> = self
                .eval_history
                .iter()
                .map(|s| s.average_return as f32)
                .collect();
            if !returns.is_empty() {
                plot_rewards(&returns, &path, "DDPG Evaluation Return")?;
            }
        }
        Ok(())
    }

    /// Runs the noise-free actor for exactly `eval_samples` steps, so the last path may be cut short.
    fn evaluate(&mut self, env: &mut E, epoch: usize) -> Result<EvalStats> {
        tracing::info!("Collecting samples for evaluation");

        let mut returns = Vec::new();
        let mut samples = 0;
        let mut abs_action_sum = 0.0_f64;
        let mut action_values = 0_usize;

        while samples < self.config.eval_samples {
            let mut observation = env.reset()?;
            let mut path_return = 0.0_f64;
            let mut path_length = 0;

            while path_length < self.config.max_path_length && samples < self.config.eval_samples {
                let action = self.actor.select_action(observation.as_ref())?;
                abs_action_sum += action.iter().map(|a| a.abs() as f64).sum::<f64>();
                action_values += action.len();

                let result = env.step(&action)?;
                path_return += Into::<f32>::into(result.reward) as f64;
                path_length += 1;
                samples += 1;
                observation = result.next_state;
                if result.done {
                    break;
                }
            }
            returns.push(path_return);
        }

        let (average_return, std_return, max_return, min_return) = summarize_returns(&returns);
        let es_returns: Vec<f64> = self.es_path_returns.iter().map(|&r| r as f64).collect();

        let stats = EvalStats {
            epoch,
            num_paths: returns.len(),
            num_samples: samples,
            average_return,
            std_return,
            max_return,
            min_return,
            average_es_return: mean(&es_returns),
            updates: self.update_stats.averaged(),
            num_updates: self.update_stats.len(),
            average_abs_action: if action_values == 0 {
                0.0
            } else {
                abs_action_sum / action_values as f64
            },
            policy_param_norm: param_norm(self.actor.var_store()),
            qf_param_norm: param_norm(self.critic.var_store()),
        };

        tracing::info!(
            epoch,
            num_paths = stats.num_paths,
            average_return = stats.average_return,
            std_return = stats.std_return,
            max_return = stats.max_return,
            min_return = stats.min_return,
            average_es_return = stats.average_es_return,
            average_qf_loss = stats.updates.qf_loss,
            average_policy_surr = stats.updates.policy_surr,
            average_q = stats.updates.q_mean,
            average_abs_q = stats.updates.abs_q_mean,
            average_y = stats.updates.y_mean,
            average_abs_y = stats.updates.abs_y_mean,
            average_abs_qy_diff = stats.updates.abs_qy_diff_mean,
            average_abs_action = stats.average_abs_action,
            policy_param_norm = stats.policy_param_norm,
            qf_param_norm = stats.qf_param_norm,
            "evaluation"
        );

        self.update_stats.clear();
        self.es_path_returns.clear();
        self.eval_history.push(stats.clone());
        Ok(stats)
    }

    fn save(&self, dir: &Path) -> Result<()> {
        let snapshot = DdpgSnapshot {
            epoch: self.epochs_completed,
            actor: self.actor.var_store(),
            critic: self.critic.var_store(),
            target_actor: self.target_actor.var_store(),
            target_critic: self.target_critic.var_store(),
            config: &self.config,
            stats: self.eval_history.last(),
        };
        snapshot::write_snapshot(dir, &snapshot)
    }

    fn load(&mut self, dir: &Path) -> Result<()> {
        self.actor.var_store_mut().load(dir.join(snapshot::ACTOR_FILE))?;
        self.critic.var_store_mut().load(dir.join(snapshot::CRITIC_FILE))?;
        self.target_actor
            .var_store_mut()
            .load(dir.join(snapshot::TARGET_ACTOR_FILE))?;
        self.target_critic
            .var_store_mut()
            .load(dir.join(snapshot::TARGET_CRITIC_FILE))?;
        self.epochs_completed = snapshot::read_metadata(dir)?.epoch;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Observation is the step counter; terminates after `done_at` steps when set.
    #[derive(Clone)]
    struct CountingEnv {
        t: usize,
        done_at: Option<usize>,
        reward: f32,
        resets: usize,
    }

    impl CountingEnv {
        fn new(done_at: Option<usize>, reward: f32) -> Self {
            CountingEnv { t: 0, done_at, reward, resets: 0 }
        }
    }

    impl Environment for CountingEnv {
        type State = [f32; 1];
        type Reward = f32;

        fn reset(&mut self) -> Result<Self::State> {
            self.t = 0;
            self.resets += 1;
            Ok([0.0])
        }

        fn step(&mut self, _action: &[f32]) -> Result<crate::environment::StepResult<Self::State, f32>> {
            self.t += 1;
            Ok(crate::environment::StepResult {
                next_state: [self.t as f32],
                reward: self.reward,
                done: self.done_at == Some(self.t),
            })
        }

        fn current_state(&self) -> Self::State {
            [self.t as f32]
        }

        fn action_dim(&self) -> usize {
            1
        }

        fn state_dim(&self) -> usize {
            1
        }
    }

    #[derive(Default)]
    struct RecordingStrategy {
        resets: usize,
    }

    impl ExplorationStrategy for RecordingStrategy {
        fn get_action(
            &mut self,
            _step: usize,
            observation: &[f32],
            policy: &dyn Policy<[f32], Vec<f32>>,
        ) -> Result<Vec<f32>> {
            policy.select_action(observation)
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn agent(env: &CountingEnv, config: DdpgConfig) -> DdpgAgent<CountingEnv, RecordingStrategy> {
        DdpgAgent::new(env, RecordingStrategy::default(), config.hidden_sizes(vec![8], vec![8]).seed(0), Device::Cpu)
            .unwrap()
    }

    /// Warm-up threshold high enough that no update ever runs.
    fn collect_only() -> DdpgConfig {
        DdpgConfig::new().replay_pool_size(1000).min_pool_size(1000)
    }

    #[test]
    fn truncated_transition_is_dropped_by_default() {
        let mut env = CountingEnv::new(None, 1.0);
        let mut agent = agent(&env, collect_only().max_path_length(3));
        let mut state = TrainingState::new(env.reset().unwrap());

        for _ in 0..3 {
            agent.env_step(&mut env, &mut state).unwrap();
        }
        assert!(state.episode.terminal);
        assert_eq!(agent.pool().size(), 2);
        assert!(agent.pool().iter().all(|t| !t.terminal));
    }

    #[test]
    fn truncated_transition_is_kept_as_terminal_when_enabled() {
        let mut env = CountingEnv::new(None, 1.0);
        let mut agent = agent(
            &env,
            collect_only().max_path_length(3).include_horizon_terminal_transitions(true),
        );
        let mut state = TrainingState::new(env.reset().unwrap());

        for _ in 0..3 {
            agent.env_step(&mut env, &mut state).unwrap();
        }
        assert_eq!(agent.pool().size(), 3);
        let last = agent.pool().iter().last().unwrap();
        assert!(last.terminal);
        assert_eq!(last.observation, vec![2.0]);
        assert_eq!(last.next_observation, vec![3.0]);
    }

    #[test]
    fn true_termination_is_always_stored() {
        let mut env = CountingEnv::new(Some(3), 1.0);
        let mut agent = agent(&env, collect_only().max_path_length(3));
        let mut state = TrainingState::new(env.reset().unwrap());

        for _ in 0..3 {
            agent.env_step(&mut env, &mut state).unwrap();
        }
        assert_eq!(agent.pool().size(), 3);
        assert!(agent.pool().iter().last().unwrap().terminal);
    }

    #[test]
    fn episode_counters_reset_after_terminal() {
        let mut env = CountingEnv::new(Some(2), 0.5);
        let mut agent = agent(&env, collect_only());
        let mut state = TrainingState::new(env.reset().unwrap());

        agent.env_step(&mut env, &mut state).unwrap();
        agent.env_step(&mut env, &mut state).unwrap();
        assert!(state.episode.terminal);
        assert_eq!(state.episode.path_length, 2);
        assert_eq!(state.episode.path_return, 1.0);

        agent.reset_if_terminal(&mut env, &mut state).unwrap();
        assert_eq!(state.episode, EpisodeState::default());
        assert_eq!(state.observation, [0.0]);
        assert_eq!(agent.exploration().resets, 1);
        assert_eq!(env.resets, 2);

        agent.env_step(&mut env, &mut state).unwrap();
        assert_eq!(state.episode.path_length, 1);
        assert_eq!(state.episode.path_return, 0.5);
        assert_eq!(state.itr, 3);
    }

    #[test]
    fn rewards_are_scaled_before_storage() {
        let mut env = CountingEnv::new(None, 1.5);
        let mut agent = agent(&env, collect_only().scale_reward(2.0));
        let mut state = TrainingState::new(env.reset().unwrap());

        for _ in 0..4 {
            agent.env_step(&mut env, &mut state).unwrap();
        }
        assert!(agent.pool().iter().all(|t| t.reward == 3.0));
        // the episode return tracks the raw reward
        assert_eq!(state.episode.path_return, 6.0);
    }

    #[test]
    fn updates_start_at_warmup_threshold() {
        let mut env = CountingEnv::new(None, 1.0);
        let config = DdpgConfig::new()
            .replay_pool_size(100)
            .min_pool_size(2)
            .batch_size(4)
            .n_updates_per_sample(3);
        let mut agent = agent(&env, config);
        let mut state = TrainingState::new(env.reset().unwrap());

        agent.env_step(&mut env, &mut state).unwrap();
        assert_eq!(agent.pending_updates(), 0);
        agent.env_step(&mut env, &mut state).unwrap();
        assert_eq!(agent.pending_updates(), 3);
    }

    #[test]
    fn terminal_targets_equal_reward() {
        let env = CountingEnv::new(None, 1.0);
        let agent = agent(&env, DdpgConfig::new().min_pool_size(0).discount(0.9));

        let rewards = column_tensor(&[2.5, -1.0], Device::Cpu);
        let terminals = column_tensor(&[1.0, 0.0], Device::Cpu);
        let next_obs = batch_tensor(&[4.0, 5.0], 2, 1, Device::Cpu);
        let ys = agent.compute_targets(&rewards, &terminals, &next_obs);

        assert_eq!(ys.size(), vec![2, 1]);
        assert_eq!(ys.double_value(&[0, 0]), 2.5);

        let next_action = agent.target_actor().forward(&batch_tensor(&[5.0], 1, 1, Device::Cpu));
        let next_q = agent
            .target_critic()
            .forward(&batch_tensor(&[5.0], 1, 1, Device::Cpu), &next_action)
            .double_value(&[0, 0]);
        assert!((ys.double_value(&[1, 0]) - (-1.0 + 0.9 * next_q)).abs() < 1e-5);
    }

    #[test]
    fn actor_step_leaves_critic_untouched() {
        let env = CountingEnv::new(None, 1.0);
        let mut agent = agent(&env, DdpgConfig::new().min_pool_size(0));
        let obs = Tensor::randn([16, 1], (Kind::Float, Device::Cpu));

        let actor_before = agent.actor().param_values().unwrap();
        let critic_before = agent.critic().param_values().unwrap();
        let surr = agent.train_policy(&obs);

        assert!(surr.is_finite());
        assert_ne!(agent.actor().param_values().unwrap(), actor_before);
        assert_eq!(agent.critic().param_values().unwrap(), critic_before);
    }

    #[test]
    fn evaluation_respects_sample_budget_and_path_cap() {
        let mut env = CountingEnv::new(None, 1.0);
        let mut agent = agent(
            &env,
            DdpgConfig::new().min_pool_size(0).max_path_length(4).eval_samples(10),
        );
        let stats = agent.evaluate(&mut env, 0).unwrap();
        assert_eq!(stats.num_samples, 10);
        // paths of 4, 4 and the 2 remaining samples
        assert_eq!(stats.num_paths, 3);
        assert_eq!(stats.max_return, 4.0);
        assert_eq!(stats.min_return, 2.0);
        assert_eq!(agent.eval_history().len(), 1);
    }
}
