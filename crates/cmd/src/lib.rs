pub mod cli;
pub mod run;

pub use cli::Cli;
pub use run::run_command;
