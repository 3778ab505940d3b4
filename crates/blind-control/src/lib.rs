//! 窗帘控制层
//!
//! 基于 `blind-driver` 的异步步进电机控制器，提供：
//! - 校准（打开点 / 关闭点）与百分比换算
//! - 运动事件（Starting / Moving / Stopped / Idle）
//! - TOML 配置文件
//!
//! 驱动层只认识电机位置；本层只认识百分比，两者通过 [`Calibration`] 换算。

mod blind;
pub mod calibration;
pub mod config;
mod error;
pub mod event;

pub use blind::{SmartBlind, step_delay_for_speed};
pub use calibration::Calibration;
pub use config::{BlindConfig, BlindSettings, DriverSettings};
pub use error::{BlindError, CalibrationPoint, ConfigError};
pub use event::{BlindObserver, MotionEvent, MotionReport, MotionTracker};
