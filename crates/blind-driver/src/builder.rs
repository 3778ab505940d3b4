//! Builder 模式实现
//!
//! 提供链式构造 `AsyncStepper` 实例的便捷方式。

use std::time::Duration;

use crate::actuator::{Actuator, ActuatorError, StepperChannel, SteppingStyle};
use crate::error::DriverError;
use crate::pipeline::MotionConfig;
use crate::stepper::AsyncStepper;

/// AsyncStepper Builder（链式构造）
///
/// 执行器由工厂函数创建，工厂收到的是已校验的通道号，
/// 因此通道无效时不会触碰硬件。
///
/// # Example
///
/// ```
/// use blind_driver::{AsyncStepperBuilder, SteppingStyle};
/// use blind_driver::actuator::SimulatedStepper;
/// use std::time::Duration;
///
/// let stepper = AsyncStepperBuilder::new()
///     .channel(2)
///     .stepping_style(SteppingStyle::Microstep)
///     .idle_report_interval(Duration::from_secs(1))
///     .step_delay(Duration::from_millis(2))
///     .build(|channel| {
///         assert_eq!(channel.number(), 2);
///         Ok(SimulatedStepper::new())
///     })
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct AsyncStepperBuilder {
    config: MotionConfig,
}

impl AsyncStepperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 步进电机通道（1 或 2）
    pub fn channel(mut self, channel: u8) -> Self {
        self.config.channel = channel;
        self
    }

    pub fn stepping_style(mut self, style: SteppingStyle) -> Self {
        self.config.stepping_style = style;
        self
    }

    pub fn idle_report_interval(mut self, interval: Duration) -> Self {
        self.config.idle_report_interval = interval;
        self
    }

    pub fn motion_report_interval(mut self, interval: Duration) -> Self {
        self.config.motion_report_interval = interval;
        self
    }

    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.config.step_delay = delay;
        self
    }

    pub fn reversed(mut self, reversed: bool) -> Self {
        self.config.reversed = reversed;
        self
    }

    /// 整体替换配置
    pub fn config(mut self, config: MotionConfig) -> Self {
        self.config = config;
        self
    }

    /// 构建控制器（停止状态）
    ///
    /// # 错误
    /// - `DriverError::InvalidChannel`: 通道号无效（此时不调用工厂）
    /// - `DriverError::Actuator`: 工厂创建执行器失败
    pub fn build<A, F>(self, actuator_factory: F) -> Result<AsyncStepper<A>, DriverError>
    where
        A: Actuator + 'static,
        F: FnOnce(StepperChannel) -> Result<A, ActuatorError>,
    {
        let channel = StepperChannel::try_from(self.config.channel)?;
        let actuator = actuator_factory(channel)?;
        Ok(AsyncStepper::with_channel(channel, actuator, &self.config))
    }
}
