//! # 窗帘配置
//!
//! TOML 配置文件，两个段落：
//!
//! ```toml
//! [driver]
//! channel = 1
//! stepping_style = "double"
//! idle_report_interval_secs = 5.0
//! motion_report_interval_secs = 0.2
//! step_delay_ms = 0
//! reversed = false
//!
//! [blind]
//! step_size = 50
//! open_is_100 = true
//! opened_position = 1200
//! closed_position = 0
//! ```
//!
//! 缺省的键取默认值。

use blind_driver::{MotionConfig, Position, StepperChannel, SteppingStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::calibration::Calibration;
use crate::error::ConfigError;

/// 窗帘配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlindConfig {
    /// 电机驱动设置
    pub driver: DriverSettings,

    /// 窗帘（校准）设置
    pub blind: BlindSettings,
}

/// 电机驱动设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    /// 步进电机通道（1 或 2）
    pub channel: u8,

    /// 步进方式
    pub stepping_style: SteppingStyle,

    /// 空闲上报周期（秒）
    pub idle_report_interval_secs: f64,

    /// 运动上报周期（秒）
    pub motion_report_interval_secs: f64,

    /// 每步延时（毫秒）
    pub step_delay_ms: u64,

    /// 逻辑方向反转
    pub reversed: bool,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            channel: 1,
            stepping_style: SteppingStyle::Double,
            idle_report_interval_secs: 5.0,
            motion_report_interval_secs: 0.2,
            step_delay_ms: 0,
            reversed: false,
        }
    }
}

impl DriverSettings {
    /// 转换为驱动层配置
    pub fn motion_config(&self) -> Result<MotionConfig, ConfigError> {
        Ok(MotionConfig {
            channel: self.channel,
            stepping_style: self.stepping_style,
            idle_report_interval: interval("idle_report_interval_secs", self.idle_report_interval_secs)?,
            motion_report_interval: interval(
                "motion_report_interval_secs",
                self.motion_report_interval_secs,
            )?,
            step_delay: Duration::from_millis(self.step_delay_ms),
            reversed: self.reversed,
        })
    }
}

fn interval(name: &str, secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::Invalid(format!(
            "{} must be a positive number of seconds, got {}",
            name, secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::Invalid(format!("{}: {}", name, e)))
}

/// 窗帘设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlindSettings {
    /// 校准时每“步”对应的电机位置单位
    pub step_size: u32,

    /// `true`: 100% = 完全打开
    pub open_is_100: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_position: Option<Position>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_position: Option<Position>,
}

impl Default for BlindSettings {
    fn default() -> Self {
        Self {
            step_size: 50,
            open_is_100: true,
            opened_position: None,
            closed_position: None,
        }
    }
}

impl BlindSettings {
    pub fn calibration(&self) -> Calibration {
        Calibration {
            opened: self.opened_position,
            closed: self.closed_position,
            open_is_100: self.open_is_100,
        }
    }
}

impl BlindConfig {
    /// 从 TOML 文本解析（不校验）
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 从文件加载并校验
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 保存到文件（自动创建父目录）
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        let io_error = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, content).map_err(io_error)
    }

    /// 校验配置值
    pub fn validate(&self) -> Result<(), ConfigError> {
        StepperChannel::try_from(self.driver.channel)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.driver.motion_config()?;

        if self.blind.step_size == 0 {
            return Err(ConfigError::Invalid("step_size must be positive".to_string()));
        }
        if let (Some(opened), Some(closed)) =
            (self.blind.opened_position, self.blind.closed_position)
        {
            if opened == closed {
                return Err(ConfigError::Invalid(format!(
                    "opened_position and closed_position are both {}",
                    opened
                )));
            }
            if opened.checked_sub(closed).is_none() || closed.checked_sub(opened).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "opened_position {} and closed_position {} are too far apart",
                    opened, closed
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_motion_config() {
        let config = BlindConfig::default();
        assert_eq!(config.driver.motion_config().unwrap(), MotionConfig::default());
        assert_eq!(config.blind.step_size, 50);
        assert!(config.blind.open_is_100);
        assert!(!config.blind.calibration().is_complete());
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let config = BlindConfig::from_toml_str(
            r#"
            [driver]
            channel = 2
            stepping_style = "microstep"

            [blind]
            opened_position = 1200
            closed_position = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.driver.channel, 2);
        assert_eq!(config.driver.stepping_style, SteppingStyle::Microstep);
        assert_eq!(config.driver.idle_report_interval_secs, 5.0);
        assert_eq!(config.blind.step_size, 50);
        assert_eq!(config.blind.calibration(), Calibration::new(1200, 0, true));
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(BlindConfig::from_toml_str("").unwrap(), BlindConfig::default());
    }

    #[test]
    fn test_serialized_form_parses_back() {
        let mut config = BlindConfig::default();
        config.driver.reversed = true;
        config.driver.step_delay_ms = 3;
        config.blind.opened_position = Some(-800);
        config.blind.closed_position = Some(0);

        let text = config.to_toml_string().unwrap();
        assert!(text.contains("[driver]"));
        assert!(text.contains("stepping_style = \"double\""));
        assert_eq!(BlindConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_uncalibrated_points_are_omitted() {
        let text = BlindConfig::default().to_toml_string().unwrap();
        assert!(!text.contains("opened_position"));
        assert!(!text.contains("closed_position"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BlindConfig::default();
        config.driver.channel = 3;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = BlindConfig::default();
        config.driver.motion_report_interval_secs = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = BlindConfig::default();
        config.driver.idle_report_interval_secs = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = BlindConfig::default();
        config.blind.step_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = BlindConfig::default();
        config.blind.opened_position = Some(5);
        config.blind.closed_position = Some(5);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = BlindConfig::default();
        config.blind.opened_position = Some(i64::MAX);
        config.blind.closed_position = Some(-1);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = BlindConfig::default();
        config.blind.opened_position = Some(i64::MAX);
        config.blind.closed_position = Some(0);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_error() {
        let result = BlindConfig::from_toml_str("[driver]\nchannel = \"one\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        let result = BlindConfig::from_toml_str("[driver]\nstepping_style = \"half\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
