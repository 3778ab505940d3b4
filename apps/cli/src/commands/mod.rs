//! 命令定义和实现

pub mod config;
pub mod run;
pub mod shell;

pub use config::ConfigCommand;
pub use run::RunCommand;
pub use shell::ShellCommand;
