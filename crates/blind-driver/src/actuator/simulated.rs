//! 模拟步进电机
//!
//! 无硬件依赖的 `Actuator` 实现：记录每一次 `step()` / `release()` 调用，
//! 并支持故障注入。CLI 和测试都使用它。

use parking_lot::Mutex;
use std::sync::Arc;

use super::{Actuator, ActuatorError, ActuatorErrorKind, Direction, SteppingStyle};

/// 执行器调用记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRecord {
    Step {
        direction: Direction,
        style: SteppingStyle,
    },
    Release,
}

#[derive(Debug, Default)]
struct LogInner {
    records: Vec<StepRecord>,
    /// 物理位置（Forward +1，Backward -1）
    physical_position: i64,
    energized: bool,
    /// 剩余需要失败的 step 次数
    pending_failures: u32,
}

/// 共享调用日志
///
/// `SimulatedStepper` 被移入控制线程后，调用方通过克隆的 `StepLog` 观察它。
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    inner: Arc<Mutex<LogInner>>,
}

impl StepLog {
    pub fn records(&self) -> Vec<StepRecord> {
        self.inner.lock().records.clone()
    }

    pub fn last(&self) -> Option<StepRecord> {
        self.inner.lock().records.last().copied()
    }

    pub fn step_count(&self) -> usize {
        self.inner
            .lock()
            .records
            .iter()
            .filter(|r| matches!(r, StepRecord::Step { .. }))
            .count()
    }

    /// 指定物理方向的步数
    pub fn steps_in(&self, direction: Direction) -> usize {
        self.inner
            .lock()
            .records
            .iter()
            .filter(|r| matches!(r, StepRecord::Step { direction: d, .. } if *d == direction))
            .count()
    }

    pub fn release_count(&self) -> usize {
        self.inner
            .lock()
            .records
            .iter()
            .filter(|r| matches!(r, StepRecord::Release))
            .count()
    }

    pub fn physical_position(&self) -> i64 {
        self.inner.lock().physical_position
    }

    /// 线圈是否处于通电状态（最后一次调用是 step）
    pub fn is_energized(&self) -> bool {
        self.inner.lock().energized
    }

    /// 让接下来的 `count` 次 `step()` 返回错误
    pub fn inject_step_failures(&self, count: u32) {
        self.inner.lock().pending_failures = count;
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.records.clear();
    }
}

/// 模拟步进电机
#[derive(Debug, Default)]
pub struct SimulatedStepper {
    log: StepLog,
}

impl SimulatedStepper {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取共享日志句柄
    pub fn log(&self) -> StepLog {
        self.log.clone()
    }
}

impl Actuator for SimulatedStepper {
    fn step(&mut self, direction: Direction, style: SteppingStyle) -> Result<(), ActuatorError> {
        let mut inner = self.log.inner.lock();
        if inner.pending_failures > 0 {
            inner.pending_failures -= 1;
            // 故障时线圈可能已部分通电
            inner.energized = true;
            return Err(ActuatorError::new(
                ActuatorErrorKind::Fault,
                "injected step failure",
            ));
        }
        inner.records.push(StepRecord::Step { direction, style });
        inner.physical_position += match direction {
            Direction::Forward => 1,
            Direction::Backward => -1,
        };
        inner.energized = true;
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        let mut inner = self.log.inner.lock();
        inner.records.push(StepRecord::Release);
        inner.energized = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_steps_and_releases() {
        let mut stepper = SimulatedStepper::new();
        let log = stepper.log();

        stepper.step(Direction::Forward, SteppingStyle::Double).unwrap();
        stepper.step(Direction::Forward, SteppingStyle::Double).unwrap();
        stepper.step(Direction::Backward, SteppingStyle::Single).unwrap();
        assert!(log.is_energized());
        stepper.release().unwrap();

        assert_eq!(log.step_count(), 3);
        assert_eq!(log.steps_in(Direction::Forward), 2);
        assert_eq!(log.steps_in(Direction::Backward), 1);
        assert_eq!(log.release_count(), 1);
        assert_eq!(log.physical_position(), 1);
        assert!(!log.is_energized());
        assert_eq!(log.last(), Some(StepRecord::Release));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut stepper = SimulatedStepper::new();
        let log = stepper.log();
        stepper.release().unwrap();
        stepper.release().unwrap();
        assert_eq!(log.release_count(), 2);
        assert!(!log.is_energized());
    }

    #[test]
    fn test_injected_failures() {
        let mut stepper = SimulatedStepper::new();
        let log = stepper.log();
        log.inject_step_failures(2);

        assert!(stepper.step(Direction::Forward, SteppingStyle::Double).is_err());
        assert!(stepper.step(Direction::Forward, SteppingStyle::Double).is_err());
        assert!(stepper.step(Direction::Forward, SteppingStyle::Double).is_ok());

        // 失败的 step 不计入记录
        assert_eq!(log.step_count(), 1);
        assert_eq!(log.physical_position(), 1);
    }
}
