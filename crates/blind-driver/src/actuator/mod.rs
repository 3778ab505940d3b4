//! # 执行器抽象层
//!
//! 控制循环与电机驱动之间的唯一边界。驱动只需提供单步 `step()` 和断电 `release()`，
//! 线圈励磁等硬件细节全部留在实现内部。
//!
//! `SteppingStyle` 是本 crate 自己的枚举，由具体驱动在边界处翻译为硬件 SDK 的取值。

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::DriverError;

mod simulated;

pub use simulated::{SimulatedStepper, StepLog, StepRecord};

/// 物理转动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// 反方向
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// 步进方式（励磁模式）
///
/// 影响力矩与分辨率，不影响控制逻辑：每次增量始终是一个逻辑单位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SteppingStyle {
    Single,
    #[default]
    Double,
    Interleave,
    Microstep,
}

impl SteppingStyle {
    pub const ALL: [SteppingStyle; 4] = [
        SteppingStyle::Single,
        SteppingStyle::Double,
        SteppingStyle::Interleave,
        SteppingStyle::Microstep,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SteppingStyle::Single => "single",
            SteppingStyle::Double => "double",
            SteppingStyle::Interleave => "interleave",
            SteppingStyle::Microstep => "microstep",
        }
    }
}

impl fmt::Display for SteppingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SteppingStyle {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SteppingStyle::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DriverError::InvalidInput(format!("unknown stepping style '{}'", s)))
    }
}

/// 步进电机通道（电机扩展板上的 1 号或 2 号接口）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepperChannel {
    One,
    Two,
}

impl StepperChannel {
    pub fn number(self) -> u8 {
        match self {
            StepperChannel::One => 1,
            StepperChannel::Two => 2,
        }
    }
}

impl TryFrom<u8> for StepperChannel {
    type Error = DriverError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(StepperChannel::One),
            2 => Ok(StepperChannel::Two),
            other => Err(DriverError::InvalidChannel(other)),
        }
    }
}

impl fmt::Display for StepperChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stepper{}", self.number())
    }
}

/// 执行器错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorErrorKind {
    Unknown,
    /// 总线通信失败（I2C/SPI）
    Bus,
    /// 驱动芯片过流/过热保护
    Fault,
    /// 设备不存在
    NoDevice,
}

/// 结构化执行器错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct ActuatorError {
    pub kind: ActuatorErrorKind,
    pub message: String,
}

impl ActuatorError {
    pub fn new(kind: ActuatorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<String> for ActuatorError {
    fn from(message: String) -> Self {
        Self::new(ActuatorErrorKind::Unknown, message)
    }
}

impl From<&str> for ActuatorError {
    fn from(message: &str) -> Self {
        Self::new(ActuatorErrorKind::Unknown, message)
    }
}

/// 执行器（电机驱动）接口
///
/// - `step()` 同步完成一个物理步后返回
/// - `release()` 使线圈断电，必须幂等，可重复调用
pub trait Actuator: Send {
    fn step(&mut self, direction: Direction, style: SteppingStyle) -> Result<(), ActuatorError>;
    fn release(&mut self) -> Result<(), ActuatorError>;
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn step(&mut self, direction: Direction, style: SteppingStyle) -> Result<(), ActuatorError> {
        (**self).step(direction, style)
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        (**self).release()
    }
}
