//! 步进电机驱动层
//!
//! 本 crate 提供窗帘步进电机的异步运动控制，包括：
//! - 控制线程（独占全部位置状态，按命令队列顺序执行）
//! - 空闲/运动两种上报节奏的位置上报
//! - 观察者错误边界（回调失败不会中断控制循环）
//! - 执行器抽象与模拟步进电机
//! - 状态快照（ArcSwap 无锁读取）与运行指标
//!
//! # 快速开始
//!
//! ```
//! use blind_driver::AsyncStepperBuilder;
//! use blind_driver::actuator::SimulatedStepper;
//! use std::time::Duration;
//!
//! let stepper = AsyncStepperBuilder::new()
//!     .channel(1)
//!     .motion_report_interval(Duration::from_millis(100))
//!     .build(|_channel| Ok(SimulatedStepper::new()))?;
//!
//! stepper.start()?;
//! stepper.move_by(50);
//! stepper.move_by(-20);
//! assert_eq!(stepper.wait()?, 30);
//! stepper.stop()?;
//! # Ok::<(), blind_driver::DriverError>(())
//! ```

pub mod actuator;
mod builder;
pub mod command;
mod error;
pub mod hooks;
pub mod metrics;
pub mod pipeline;
pub mod state;
mod stepper;
pub mod timer;

pub use actuator::{
    Actuator, ActuatorError, ActuatorErrorKind, Direction, StepperChannel, SteppingStyle,
};
pub use builder::AsyncStepperBuilder;
pub use command::{CommandQueue, MotorCommand};
pub use error::DriverError;
pub use hooks::{ObserverError, PositionObserver};
pub use metrics::{LoopMetrics, MetricsSnapshot};
pub use pipeline::{MotionConfig, ReportTimer};
pub use state::{MotionSnapshot, Position};
pub use stepper::AsyncStepper;
pub use timer::{CountdownTimer, Stopwatch};
