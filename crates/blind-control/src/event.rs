//! 运动事件
//!
//! 驱动层只上报 `(target, actual)` 位置；本层换算为百分比，
//! 并根据相邻两次上报推导运动事件。

use blind_driver::ObserverError;
use std::fmt;

/// 运动事件（由相邻两次百分比上报推导）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionEvent {
    /// 上次静止，本次运动
    Starting,
    /// 两次都在运动
    Moving,
    /// 上次运动，本次静止
    Stopped,
    /// 两次都静止（空闲周期上报）
    Idle,
}

impl MotionEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            MotionEvent::Starting => "starting",
            MotionEvent::Moving => "moving",
            MotionEvent::Stopped => "stopped",
            MotionEvent::Idle => "idle",
        }
    }
}

impl fmt::Display for MotionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 百分比位置上报
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionReport {
    pub target: f64,
    pub actual: f64,
    pub event: MotionEvent,
}

impl MotionReport {
    /// 取整后的 `(target, actual)` 百分比
    pub fn rounded(&self) -> (i64, i64) {
        (self.target.round() as i64, self.actual.round() as i64)
    }
}

impl fmt::Display for MotionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (target, actual) = self.rounded();
        write!(f, "target={}% actual={}% ({})", target, actual, self.event)
    }
}

/// 窗帘观察者 Trait
///
/// 闭包 `Fn(MotionReport) -> Result<(), ObserverError>` 自动实现本 Trait。
/// 在控制线程上调用，失败会被记录但不会中断上报。
pub trait BlindObserver: Send + Sync {
    fn on_motion_report(&self, report: MotionReport) -> Result<(), ObserverError>;
}

impl<F> BlindObserver for F
where
    F: Fn(MotionReport) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_motion_report(&self, report: MotionReport) -> Result<(), ObserverError> {
        self(report)
    }
}

/// 运动事件推导器
///
/// 初始状态视为静止。
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionTracker {
    was_moving: bool,
}

impl MotionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次上报并返回对应事件
    pub fn classify(&mut self, target: f64, actual: f64) -> MotionReport {
        let now_moving = target != actual;
        let event = match (self.was_moving, now_moving) {
            (false, true) => MotionEvent::Starting,
            (true, true) => MotionEvent::Moving,
            (true, false) => MotionEvent::Stopped,
            (false, false) => MotionEvent::Idle,
        };
        self.was_moving = now_moving;
        MotionReport {
            target,
            actual,
            event,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.was_moving
    }
}
