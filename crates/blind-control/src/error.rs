//! 控制层错误类型定义

use blind_driver::DriverError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 校准点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalibrationPoint {
    /// 完全打开的位置
    Opened,
    /// 完全关闭的位置
    Closed,
}

impl fmt::Display for CalibrationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationPoint::Opened => f.write_str("Opened"),
            CalibrationPoint::Closed => f.write_str("Closed"),
        }
    }
}

/// 窗帘控制错误
#[derive(Error, Debug)]
pub enum BlindError {
    /// 缺少校准点
    #[error("{0} point not yet calibrated")]
    NotCalibrated(CalibrationPoint),

    /// 打开点与关闭点相同，无法换算百分比
    #[error("Opened and closed points are the same")]
    DegenerateCalibration,

    /// 百分比不在 [0, 100] 或不是有限数
    #[error("Invalid percentage {0} (expected 0..=100)")]
    InvalidPercentage(f64),

    /// 速度系数不在 [0.1, 1.0] 或不是有限数
    #[error("Invalid speed {0} (expected 0.1..=1.0)")]
    InvalidSpeed(f64),

    /// 校准步长必须大于 0
    #[error("Invalid step size {0} (must be positive)")]
    InvalidStepSize(u32),

    /// 转动距离超出位置范围
    #[error("Winding {count} steps of {step_size} exceeds the position range")]
    StepOverflow { count: u32, step_size: u32 },

    /// 打开点与关闭点相距过远，无法换算百分比
    #[error("Calibration span from {min} to {max} exceeds the position range")]
    CalibrationOutOfRange { min: i64, max: i64 },

    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 驱动层错误
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// 配置文件错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 读写配置文件失败
    #[error("Failed to access config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// TOML 解析失败
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML 序列化失败
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// 配置值无效
    #[error("Invalid config: {0}")]
    Invalid(String),
}
