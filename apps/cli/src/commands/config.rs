//! 配置管理命令
//!
//! 配置文件查找顺序：`--config` 指定的路径 → `<config_dir>/smart-blind/config.toml` → 内置默认值

use anyhow::{Context, Result, bail};
use blind_control::BlindConfig;
use clap::Subcommand;
use std::fmt;
use std::path::{Path, PathBuf};

/// 默认配置文件路径
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("smart-blind").join("config.toml"))
}

/// 生效配置的来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

/// 加载生效配置
///
/// 显式指定的文件必须存在；默认位置的文件不存在时使用内置默认值。
pub fn load_effective(explicit: Option<&Path>) -> Result<(BlindConfig, ConfigSource)> {
    if let Some(path) = explicit {
        let config = BlindConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        return Ok((config, ConfigSource::File(path.to_path_buf())));
    }

    match default_config_file() {
        Some(path) if path.exists() => {
            let config = BlindConfig::load_from_file(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            Ok((config, ConfigSource::File(path)))
        },
        _ => Ok((BlindConfig::default(), ConfigSource::Defaults)),
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示生效配置（TOML）
    Show,

    /// 写入默认配置文件
    Init {
        /// 覆盖已有文件
        #[arg(long)]
        force: bool,
    },

    /// 校验配置文件
    Check,
}

impl ConfigCommand {
    pub fn execute(self, explicit: Option<&Path>) -> Result<()> {
        match self {
            ConfigCommand::Show => Self::show_(explicit),
            ConfigCommand::Init { force } => Self::init_(explicit, force),
            ConfigCommand::Check => Self::check_(explicit),
        }
    }

    fn show_(explicit: Option<&Path>) -> Result<()> {
        let (config, source) = load_effective(explicit)?;
        println!("# Source: {}", source);
        print!("{}", config.to_toml_string()?);
        Ok(())
    }

    fn init_(explicit: Option<&Path>, force: bool) -> Result<()> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => default_config_file().context("Cannot determine the configuration directory")?,
        };

        if path.exists() && !force {
            bail!(
                "{} already exists (use --force to overwrite)",
                path.display()
            );
        }

        BlindConfig::default()
            .save_to_file(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("✅ Wrote default configuration to {}", path.display());
        Ok(())
    }

    fn check_(explicit: Option<&Path>) -> Result<()> {
        let (config, source) = load_effective(explicit)?;
        let calibration = config.blind.calibration();

        println!("✅ Configuration OK ({})", source);
        println!("  channel: {}", config.driver.channel);
        println!("  stepping style: {}", config.driver.stepping_style);
        println!(
            "  calibration: {}",
            if calibration.is_complete() {
                "complete"
            } else {
                "incomplete"
            }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_effective(Some(&dir.path().join("missing.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[blind]\nstep_size = 20\n").unwrap();

        let (config, source) = load_effective(Some(&path)).unwrap();
        assert_eq!(config.blind.step_size, 20);
        assert_eq!(source, ConfigSource::File(path));
    }

    #[test]
    fn test_source_display() {
        assert_eq!(ConfigSource::Defaults.to_string(), "built-in defaults");
    }
}
