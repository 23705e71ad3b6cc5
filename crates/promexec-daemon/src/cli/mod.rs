mod check;
mod commands;
mod info;
mod run;
mod utils;

pub use check::run_check;
pub use commands::{Cli, Commands};
pub use info::show_version;
pub use run::run_receiver;
pub use utils::{default_config_path, init_logging};
