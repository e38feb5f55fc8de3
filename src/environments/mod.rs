pub mod cartpole;
pub mod pendulum;
