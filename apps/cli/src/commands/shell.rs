//! 交互式 Shell（REPL 模式）

use anyhow::Result;
use blind_control::BlindConfig;
use clap::Args;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;

use crate::script::parse_line;
use crate::session::{Flow, Session};

/// Shell 参数
#[derive(Args, Debug)]
pub struct ShellCommand {
    /// 不读写历史记录
    #[arg(long)]
    pub no_history: bool,
}

fn history_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("smart-blind").join("history.txt"))
}

impl ShellCommand {
    pub fn execute(&self, config: &BlindConfig) -> Result<()> {
        let session = Session::start(config)?;
        session.install_interrupt_handler()?;

        let mut rl = DefaultEditor::new()
            .map_err(|e| anyhow::anyhow!("Failed to initialize readline: {}", e))?;
        let history = if self.no_history { None } else { history_file() };
        if let Some(path) = &history {
            rl.load_history(path).ok(); // 首次运行时不存在
        }

        println!("Smart blind shell v{} (simulated motor)", env!("CARGO_PKG_VERSION"));
        println!("Type 'help' for commands, 'quit' to leave");

        loop {
            match rl.readline("blind> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line);

                    let command = match parse_line(line) {
                        Ok(Some(command)) => command,
                        Ok(None) => continue,
                        Err(e) => {
                            eprintln!("❌ {}", e);
                            continue;
                        },
                    };

                    match session.execute(&command) {
                        Ok(Flow::Continue) => {},
                        Ok(Flow::Quit) => break,
                        Err(e) => eprintln!("❌ Error: {:#}", e),
                    }
                    session.take_interrupt();
                },

                Err(ReadlineError::Interrupted) => {
                    // 提示符下的 Ctrl+C：原地停止
                    println!("^C");
                    session.blind().halt();
                },

                Err(ReadlineError::Eof) => break,

                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                },
            }
        }

        if let Some(path) = &history {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            rl.save_history(path).ok();
        }
        println!("👋 Bye");
        Ok(())
    }
}
