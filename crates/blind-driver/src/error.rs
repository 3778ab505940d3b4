//! 驱动层错误类型定义

use crate::actuator::ActuatorError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 步进电机通道号无效（仅支持 1 或 2）
    #[error("Invalid stepper channel {0} (expected 1 or 2)")]
    InvalidChannel(u8),

    /// `goto` 引用了未标记的位置
    #[error("Undefined label '{0}'")]
    UndefinedLabel(String),

    /// 控制循环已在运行
    #[error("Attempt to start() when already running")]
    AlreadyRunning,

    /// 控制循环未运行
    #[error("Attempt to stop() when not running")]
    NotRunning,

    /// 位置观察者回调失败（返回错误或 panic）
    #[error("Position observer misbehaved: {0}")]
    ObserverFailure(String),

    /// 执行器（电机驱动）错误
    #[error("Actuator error: {0}")]
    Actuator(#[from] ActuatorError),

    /// 控制线程 panic，内部状态已丢失
    #[error("Motion loop thread panicked")]
    LoopPanicked,

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,

    /// 无效输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
