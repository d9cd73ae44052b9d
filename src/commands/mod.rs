//! CLI command handlers.

mod actions;
mod config;
mod history;
mod login;
mod queue;
mod search;
mod sites;

pub use actions::{run_add_command, run_remove_command, run_retry_command};
pub use config::run_config_show_command;
pub use history::run_history_command;
pub use login::run_login_command;
pub use queue::run_queue_command;
pub use search::run_search_command;
pub use sites::run_sites_command;
