pub mod border;
pub mod config;
pub mod db;
pub mod dqn;
pub mod food;
pub mod game;
pub mod game_input;
pub mod log;
pub mod network;
pub mod policy;
pub mod replay_buffer;
pub mod snake;
pub mod train;
pub mod utils;
