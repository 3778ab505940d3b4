//! 控制循环性能指标
//!
//! 原子计数器，控制线程写入，任意线程无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 控制循环实时指标
///
/// # 使用示例
///
/// ```rust
/// use blind_driver::LoopMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = LoopMetrics::new();
/// metrics.steps_issued.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.steps_issued, 1);
/// ```
#[derive(Debug, Default)]
pub struct LoopMetrics {
    /// 成功执行的命令数
    pub commands_executed: AtomicU64,
    /// 执行失败（已记录并吞掉）的命令数
    pub commands_failed: AtomicU64,
    /// 成功发出的物理步数
    pub steps_issued: AtomicU64,
    /// 执行器 step/release 失败次数
    pub actuator_failures: AtomicU64,
    /// 发出的位置上报次数（无论观察者是否注册）
    pub reports_emitted: AtomicU64,
    /// 观察者回调失败次数
    pub observer_failures: AtomicU64,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            steps_issued: self.steps_issued.load(Ordering::Relaxed),
            actuator_failures: self.actuator_failures.load(Ordering::Relaxed),
            reports_emitted: self.reports_emitted.load(Ordering::Relaxed),
            observer_failures: self.observer_failures.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.commands_executed.store(0, Ordering::Relaxed);
        self.commands_failed.store(0, Ordering::Relaxed);
        self.steps_issued.store(0, Ordering::Relaxed);
        self.actuator_failures.store(0, Ordering::Relaxed);
        self.reports_emitted.store(0, Ordering::Relaxed);
        self.observer_failures.store(0, Ordering::Relaxed);
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub commands_executed: u64,
    pub commands_failed: u64,
    pub steps_issued: u64,
    pub actuator_failures: u64,
    pub reports_emitted: u64,
    pub observer_failures: u64,
}

impl MetricsSnapshot {
    /// 命令失败率（百分比），没有命令时返回 0.0
    pub fn command_failure_rate(&self) -> f64 {
        let total = self.commands_executed + self.commands_failed;
        if total == 0 {
            return 0.0;
        }
        (self.commands_failed as f64 / total as f64) * 100.0
    }
}
