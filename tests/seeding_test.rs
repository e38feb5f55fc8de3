use ddpg_rl::agent::Agent;
use ddpg_rl::algorithms::ddpg::DdpgAgent;
use ddpg_rl::config::DdpgConfig;
use ddpg_rl::environment::Environment;
use ddpg_rl::environments::pendulum::Pendulum;
use ddpg_rl::policies::OUStrategy;

fn train_with_seed(seed: u64) -> (Vec<f32>, Vec<f32>) {
    let mut env = Pendulum::new();
    let config = DdpgConfig::new()
        .n_epochs(2)
        .epoch_length(40)
        .min_pool_size(32)
        .replay_pool_size(200)
        .batch_size(8)
        .max_path_length(20)
        .eval_samples(20)
        .hidden_sizes(vec![16], vec![16])
        .seed(seed);
    let es = OUStrategy::new(env.action_dim(), env.action_bound());
    let mut agent = DdpgAgent::new(&env, es, config, tch::Device::Cpu).unwrap();
    agent.train(&mut env).unwrap();
    (
        agent.actor().param_values().unwrap(),
        agent.critic().param_values().unwrap(),
    )
}

#[test]
fn same_seed_trains_identical_networks() {
    tch::set_num_threads(1);
    let (actor_a, critic_a) = train_with_seed(7);
    let (actor_b, critic_b) = train_with_seed(7);
    assert_eq!(actor_a, actor_b);
    assert_eq!(critic_a, critic_b);

    let (actor_c, _) = train_with_seed(8);
    assert_ne!(actor_a, actor_c);
}
