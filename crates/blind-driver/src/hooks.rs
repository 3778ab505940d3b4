//! 位置观察者（Observer）
//!
//! 控制线程在以下时机回调观察者，参数为 `(target, actual)`：
//! - 运动状态切换（Idle → Moving、Moving → Idle）
//! - 当前上报计时器到期
//! - 上报周期被修改
//!
//! 观察者运行在控制线程上，与调用方发命令的线程并发，框架不提供额外同步。
//! 回调失败（返回错误或 panic）都由 [`ObserverSlot::notify`] 吸收并记录，
//! 不会中断控制循环，也不影响后续上报。

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::error::DriverError;
use crate::state::Position;

/// 观察者回调的错误类型
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// 位置观察者 Trait
///
/// 闭包 `Fn(Position, Position) -> Result<(), ObserverError>` 自动实现本 Trait。
///
/// # 示例
///
/// ```rust
/// use blind_driver::hooks::{ObserverError, PositionObserver};
///
/// let observer = |target: i64, actual: i64| -> Result<(), ObserverError> {
///     println!("target={} actual={}", target, actual);
///     Ok(())
/// };
/// observer.on_position_update(10, 3).unwrap();
/// ```
pub trait PositionObserver: Send + Sync {
    fn on_position_update(&self, target: Position, actual: Position) -> Result<(), ObserverError>;
}

impl<F> PositionObserver for F
where
    F: Fn(Position, Position) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_position_update(&self, target: Position, actual: Position) -> Result<(), ObserverError> {
        self(target, actual)
    }
}

/// 观察者插槽（错误边界）
///
/// 由控制线程独占；`None` 表示未注册观察者。
#[derive(Clone, Default)]
pub struct ObserverSlot {
    observer: Option<Arc<dyn PositionObserver>>,
}

impl ObserverSlot {
    pub fn new(observer: Option<Arc<dyn PositionObserver>>) -> Self {
        Self { observer }
    }

    pub fn is_registered(&self) -> bool {
        self.observer.is_some()
    }

    /// 调用观察者
    ///
    /// 未注册时返回 `Ok(false)`；回调成功返回 `Ok(true)`；
    /// 回调返回错误或 panic 时返回 `DriverError::ObserverFailure`，由调用方记录。
    pub fn notify(&self, target: Position, actual: Position) -> Result<bool, DriverError> {
        let Some(observer) = self.observer.as_ref() else {
            return Ok(false);
        };

        match catch_unwind(AssertUnwindSafe(|| {
            observer.on_position_update(target, actual)
        })) {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => Err(DriverError::ObserverFailure(e.to_string())),
            Err(panic) => Err(DriverError::ObserverFailure(panic_message(&*panic))),
        }
    }
}

impl fmt::Debug for ObserverSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSlot")
            .field("registered", &self.is_registered())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_empty_slot_is_noop() {
        let slot = ObserverSlot::default();
        assert!(!slot.is_registered());
        assert!(matches!(slot.notify(1, 2), Ok(false)));
    }

    #[test]
    fn test_closure_observer_receives_reports() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let observer = move |target: Position, actual: Position| -> Result<(), ObserverError> {
            seen_clone.lock().push((target, actual));
            Ok(())
        };
        let slot = ObserverSlot::new(Some(Arc::new(observer)));

        assert!(matches!(slot.notify(10, 0), Ok(true)));
        assert!(matches!(slot.notify(10, 5), Ok(true)));
        assert_eq!(*seen.lock(), vec![(10, 0), (10, 5)]);
    }

    #[test]
    fn test_observer_error_is_contained() {
        let observer = |_: Position, _: Position| -> Result<(), ObserverError> {
            Err("sink unavailable".into())
        };
        let slot = ObserverSlot::new(Some(Arc::new(observer)));

        match slot.notify(1, 1) {
            Err(DriverError::ObserverFailure(msg)) => assert!(msg.contains("sink unavailable")),
            other => panic!("Expected ObserverFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_observer_panic_is_contained() {
        let observer = |_: Position, _: Position| -> Result<(), ObserverError> {
            panic!("observer exploded");
        };
        let slot = ObserverSlot::new(Some(Arc::new(observer)));

        match slot.notify(1, 1) {
            Err(DriverError::ObserverFailure(msg)) => assert!(msg.contains("observer exploded")),
            other => panic!("Expected ObserverFailure, got {:?}", other),
        }

        // 插槽在 panic 后仍可用
        assert!(slot.notify(2, 2).is_err());
    }
}
