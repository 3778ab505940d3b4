//! 计时器模块
//!
//! 提供 `Stopwatch`（可累计的秒表）和 `CountdownTimer`（可重启、周期可变的倒计时器）。
//! 控制循环用两个 `CountdownTimer` 分别驱动空闲和运动两种上报节奏。

use std::time::{Duration, Instant};

/// 秒表
///
/// 支持暂停/继续累计，`restart()` 清零并立即开始计时。
#[derive(Debug, Clone)]
pub struct Stopwatch {
    start: Instant,
    stop: Instant,
    accumulated: Duration,
    running: bool,
}

impl Stopwatch {
    /// 创建处于停止状态、读数为零的秒表
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            stop: now,
            accumulated: Duration::ZERO,
            running: false,
        }
    }

    /// 开始（或继续）计时
    pub fn start(&mut self) {
        self.start = Instant::now();
        self.running = true;
    }

    /// 停止计时，本段时长计入累计值
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.stop = Instant::now();
        self.accumulated += self.stop.duration_since(self.start);
        self.start = self.stop;
        self.running = false;
    }

    /// 已累计的时长
    pub fn elapsed(&self) -> Duration {
        let end = if self.running { Instant::now() } else { self.stop };
        end.saturating_duration_since(self.start) + self.accumulated
    }

    /// 清零并立即开始计时
    pub fn restart(&mut self) {
        self.reset();
        self.running = true;
    }

    /// 清零并停止
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.stop = now;
        self.accumulated = Duration::ZERO;
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

/// 倒计时器
///
/// - `restart()` 清零已用时间，保留周期
/// - `has_expired()` 无副作用：已用时间 >= 周期即为过期
/// - `set_period()` 修改周期但不清零已用时间，新周期立即参与过期判断
///
/// 周期为零时计时器永远处于过期状态，这里不做校验。
///
/// # Example
///
/// ```
/// use blind_driver::timer::CountdownTimer;
/// use std::time::Duration;
///
/// let mut timer = CountdownTimer::new(Duration::from_secs(5));
/// timer.restart();
/// assert!(!timer.has_expired());
///
/// timer.set_period(Duration::ZERO);
/// assert!(timer.has_expired());
/// ```
#[derive(Debug, Clone)]
pub struct CountdownTimer {
    stopwatch: Stopwatch,
    period: Duration,
}

impl CountdownTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            stopwatch: Stopwatch::new(),
            period,
        }
    }

    pub fn start(&mut self) {
        self.stopwatch.start();
    }

    pub fn stop(&mut self) {
        self.stopwatch.stop();
    }

    /// 清零已用时间并开始计时
    pub fn restart(&mut self) {
        self.stopwatch.restart();
    }

    /// 是否已过期（已用时间 >= 周期）
    pub fn has_expired(&self) -> bool {
        self.stopwatch.elapsed() >= self.period
    }

    /// 剩余时间（不会小于零）
    pub fn remaining(&self) -> Duration {
        self.period.saturating_sub(self.stopwatch.elapsed())
    }

    /// 修改周期（不清零已用时间）
    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
