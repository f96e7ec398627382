pub mod admin;
pub mod config;

pub use admin::{clear_window, encode_window, save_window, validate_window};
pub use config::{
    default_window, load_window, parse_instant, parse_window, resolve_window, ConfigError,
    LoadedWindow, VotingWindowConfig, WindowSource, CONFIG_KEY,
};
