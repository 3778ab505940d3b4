//! # Smart Blind CLI
//!
//! 驱动一台模拟步进电机窗帘。
//!
//! ### 脚本模式
//!
//! ```bash
//! blind-cli run calibrate.blind
//! ```
//!
//! ### REPL 模式
//!
//! ```bash
//! $ blind-cli shell
//! blind> wind 4
//! blind> set-opened
//! blind> counter-wind 4
//! blind> set-closed
//! blind> go-to 50
//! blind> quit
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod script;
mod session;

use commands::{ConfigCommand, RunCommand, ShellCommand};

/// Smart Blind CLI - 步进电机窗帘命令行工具
#[derive(Parser, Debug)]
#[command(name = "blind-cli")]
#[command(about = "Command-line interface for a stepper-motor smart blind", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 启动交互式 Shell
    Shell(ShellCommand),

    /// 执行脚本
    Run(RunCommand),
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "blind_cli=debug,blind_driver=debug,blind_control=debug"
    } else {
        "blind_cli=info,blind_driver=info,blind_control=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let explicit = cli.config.as_deref();
    match cli.command {
        Commands::Config(cmd) => cmd.execute(explicit),

        Commands::Shell(cmd) => {
            let (config, source) = commands::config::load_effective(explicit)?;
            tracing::info!("Using configuration from {}", source);
            cmd.execute(&config)
        },

        Commands::Run(cmd) => {
            let (config, source) = commands::config::load_effective(explicit)?;
            tracing::info!("Using configuration from {}", source);
            cmd.execute(&config)
        },
    }
}
