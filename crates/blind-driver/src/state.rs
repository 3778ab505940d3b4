//! 共享状态
//!
//! 控制线程独占全部可变状态；其它线程只能看到这里发布的只读快照。

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::actuator::SteppingStyle;
use crate::metrics::LoopMetrics;

/// 位置（任意单位，有符号，无界）
pub type Position = i64;

/// 运动状态快照
///
/// 每轮循环结束时由控制线程发布。读到的值可能已经过时，
/// 不是对实时寄存器的同步读取。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionSnapshot {
    pub current: Position,
    pub target: Position,
    pub moving: bool,
    pub stepping_style: SteppingStyle,
    pub reversed: bool,
}

/// 控制线程与调用方共享的上下文
#[derive(Debug)]
pub struct MotionContext {
    /// 运行标志，清除后控制循环在本轮结束时退出
    running: AtomicBool,
    /// 最新快照（ArcSwap 无锁读取）
    pub snapshot: ArcSwap<MotionSnapshot>,
    pub metrics: LoopMetrics,
}

impl MotionContext {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            snapshot: ArcSwap::from_pointee(MotionSnapshot::default()),
            metrics: LoopMetrics::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// 发布快照（仅在变化时替换，避免无谓分配）
    pub(crate) fn publish(&self, snapshot: MotionSnapshot) {
        if **self.snapshot.load() != snapshot {
            self.snapshot.store(Arc::new(snapshot));
        }
    }

    pub fn load_snapshot(&self) -> MotionSnapshot {
        **self.snapshot.load()
    }
}

impl Default for MotionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_replaces_snapshot() {
        let ctx = MotionContext::new();
        assert_eq!(ctx.load_snapshot(), MotionSnapshot::default());

        let snapshot = MotionSnapshot {
            current: 3,
            target: 10,
            moving: true,
            stepping_style: SteppingStyle::Single,
            reversed: false,
        };
        ctx.publish(snapshot);
        assert_eq!(ctx.load_snapshot(), snapshot);
    }

    #[test]
    fn test_running_flag() {
        let ctx = MotionContext::new();
        assert!(!ctx.is_running());
        ctx.set_running(true);
        assert!(ctx.is_running());
        ctx.set_running(false);
        assert!(!ctx.is_running());
    }
}
