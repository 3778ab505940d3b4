//! run 命令
//!
//! 逐行执行脚本文件，遇到第一个错误即停止

use anyhow::{Context, Result};
use blind_control::BlindConfig;
use clap::Args;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::script::{BlindCommand, parse_line};
use crate::session::{Flow, Session};

/// 脚本执行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 脚本文件路径
    pub script: PathBuf,

    /// 结束时不等待窗帘静止
    #[arg(long)]
    pub no_wait: bool,
}

/// 解析整个脚本（先解析后执行，语法错误不会导致半途运动）
pub fn parse_script(content: &str) -> Result<Vec<(usize, BlindCommand)>> {
    let mut commands = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let number = index + 1;
        if let Some(command) = parse_line(line).with_context(|| format!("line {}", number))? {
            commands.push((number, command));
        }
    }
    Ok(commands)
}

impl RunCommand {
    pub fn execute(&self, config: &BlindConfig) -> Result<()> {
        let content = fs::read_to_string(&self.script)
            .with_context(|| format!("Failed to read script {}", self.script.display()))?;
        let commands = parse_script(&content)?;
        info!(
            "Running {} command(s) from {}",
            commands.len(),
            self.script.display()
        );

        let session = Session::start(config)?;
        session.install_interrupt_handler()?;

        for (number, command) in &commands {
            if session.take_interrupt() {
                println!("🛑 Script interrupted at line {}", number);
                return Ok(());
            }
            match session
                .execute(command)
                .with_context(|| format!("line {}", number))?
            {
                Flow::Continue => {},
                Flow::Quit => break,
            }
        }

        if !self.no_wait {
            session.execute(&BlindCommand::Wait)?;
        }
        Ok(())
    }
}
