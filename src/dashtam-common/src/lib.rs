//! Common utilities shared across Dashtam CLI crates.

pub mod dirs;
pub mod file_safety;
pub mod http_client;

pub use dirs::{AppDirs, CONFIG_FILE_NAME, HOME_ENV_VAR, PROFILES_DIR_NAME};
pub use file_safety::{
    StagedWrite, atomic_write, atomic_write_string, is_temp_file_name, stage_write,
};
pub use http_client::{
    DEFAULT_TIMEOUT, TOKEN_TIMEOUT, USER_AGENT, create_client_with_timeout, create_default_client,
    create_token_client,
};
