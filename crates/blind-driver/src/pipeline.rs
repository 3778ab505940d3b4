//! 运动控制循环模块
//!
//! 控制线程独占 [`MotionCore`]（位置、目标、标记、上报计时器、执行器），
//! 每轮循环：
//!
//! 1. Idle：在命令队列上阻塞（超时 = 空闲上报周期），收到命令立即执行
//! 2. Moving：非阻塞取出至多一条命令执行，然后前进一个单位
//! 3. 应用待生效的上报周期（空闲周期优先）
//! 4. 处理 Idle ↔ Moving 切换，或在当前计时器到期时上报
//!
//! 命令失败、观察者失败、执行器失败都只记录日志，循环只会因 stop 信号退出。

use crossbeam_channel::Sender;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use crate::actuator::{Actuator, ActuatorError, Direction, SteppingStyle};
use crate::command::{CommandQueue, MotorCommand};
use crate::error::DriverError;
use crate::hooks::ObserverSlot;
use crate::state::{MotionContext, MotionSnapshot, Position};
use crate::timer::CountdownTimer;

/// 执行器连续失败时两次重试之间的最小间隔
const ACTUATOR_FAILURE_BACKOFF: Duration = Duration::from_millis(10);

/// 运动控制配置
///
/// # Example
///
/// ```
/// use blind_driver::MotionConfig;
/// use std::time::Duration;
///
/// // 默认：通道 1，空闲 5s / 运动 0.2s 上报一次
/// let config = MotionConfig::default();
/// assert_eq!(config.idle_report_interval, Duration::from_secs(5));
///
/// let config = MotionConfig {
///     idle_report_interval: Duration::from_secs(1),
///     motion_report_interval: Duration::from_millis(100),
///     ..MotionConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionConfig {
    /// 步进电机通道（1 或 2）
    pub channel: u8,
    /// 初始步进方式
    pub stepping_style: SteppingStyle,
    /// 空闲时的上报周期
    pub idle_report_interval: Duration,
    /// 运动时的上报周期
    pub motion_report_interval: Duration,
    /// 每个物理步之后的延时
    pub step_delay: Duration,
    /// 逻辑方向反转
    pub reversed: bool,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            channel: 1,
            stepping_style: SteppingStyle::Double,
            idle_report_interval: Duration::from_secs(5),
            motion_report_interval: Duration::from_millis(200),
            step_delay: Duration::ZERO,
            reversed: false,
        }
    }
}

/// 当前生效的上报计时器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTimer {
    Idle,
    Motion,
}

/// 上报状态
///
/// 两个倒计时器加一个选择器，任何时刻恰好一个生效，
/// 选择器与 Idle/Moving 切换同步翻转。
#[derive(Debug, Clone)]
pub struct ReportingState {
    idle_timer: CountdownTimer,
    motion_timer: CountdownTimer,
    active: ReportTimer,
    pending_idle: Option<Duration>,
    pending_motion: Option<Duration>,
}

impl ReportingState {
    pub fn new(idle_interval: Duration, motion_interval: Duration) -> Self {
        Self {
            idle_timer: CountdownTimer::new(idle_interval),
            motion_timer: CountdownTimer::new(motion_interval),
            active: ReportTimer::Idle,
            pending_idle: None,
            pending_motion: None,
        }
    }

    pub fn active(&self) -> ReportTimer {
        self.active
    }

    pub fn idle_interval(&self) -> Duration {
        self.idle_timer.period()
    }

    pub fn motion_interval(&self) -> Duration {
        self.motion_timer.period()
    }

    pub fn has_pending_change(&self) -> bool {
        self.pending_idle.is_some() || self.pending_motion.is_some()
    }

    fn timer_mut(&mut self, which: ReportTimer) -> &mut CountdownTimer {
        match which {
            ReportTimer::Idle => &mut self.idle_timer,
            ReportTimer::Motion => &mut self.motion_timer,
        }
    }

    /// 重启指定计时器并设为生效
    pub fn activate(&mut self, which: ReportTimer) {
        self.timer_mut(which).restart();
        self.active = which;
    }

    pub fn active_expired(&self) -> bool {
        match self.active {
            ReportTimer::Idle => self.idle_timer.has_expired(),
            ReportTimer::Motion => self.motion_timer.has_expired(),
        }
    }

    pub fn restart_active(&mut self) {
        let active = self.active;
        self.timer_mut(active).restart();
    }

    fn set_pending(&mut self, which: ReportTimer, interval: Duration) {
        match which {
            ReportTimer::Idle => self.pending_idle = Some(interval),
            ReportTimer::Motion => self.pending_motion = Some(interval),
        }
    }

    /// 取出一个待生效的周期修改（空闲周期优先，另一个留到下一轮）
    fn take_pending(&mut self) -> Option<(ReportTimer, Duration)> {
        if let Some(interval) = self.pending_idle.take() {
            return Some((ReportTimer::Idle, interval));
        }
        self.pending_motion
            .take()
            .map(|interval| (ReportTimer::Motion, interval))
    }
}

/// 控制线程独占的运动状态
///
/// 外部线程从不直接修改这里的字段，只通过 [`MotorCommand`] 间接修改。
/// `stop()` 之后状态随线程返回，下次 `start()` 继续使用。
pub struct MotionCore<A: Actuator> {
    actuator: A,
    current: Position,
    target: Position,
    marks: HashMap<String, Position>,
    stepping_style: SteppingStyle,
    reversed: bool,
    step_delay: Duration,
    reporting: ReportingState,
    observer: ObserverSlot,
    rest_waiters: Vec<Sender<Position>>,
    last_steady_position: Position,
    /// 执行器线圈是否可能处于通电状态
    energized: bool,
}

impl<A: Actuator> MotionCore<A> {
    pub fn new(actuator: A, config: &MotionConfig) -> Self {
        Self {
            actuator,
            current: 0,
            target: 0,
            marks: HashMap::new(),
            stepping_style: config.stepping_style,
            reversed: config.reversed,
            step_delay: config.step_delay,
            reporting: ReportingState::new(
                config.idle_report_interval,
                config.motion_report_interval,
            ),
            observer: ObserverSlot::default(),
            rest_waiters: Vec::new(),
            last_steady_position: 0,
            energized: false,
        }
    }

    pub fn current(&self) -> Position {
        self.current
    }

    pub fn target(&self) -> Position {
        self.target
    }

    pub fn is_moving(&self) -> bool {
        self.current != self.target
    }

    pub fn marked_position(&self, label: &str) -> Option<Position> {
        self.marks.get(label).copied()
    }

    pub fn stepping_style(&self) -> SteppingStyle {
        self.stepping_style
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    pub fn reporting(&self) -> &ReportingState {
        &self.reporting
    }

    pub fn has_observer(&self) -> bool {
        self.observer.is_registered()
    }

    /// 最近一次 Moving → Idle 时的位置
    pub fn last_steady_position(&self) -> Position {
        self.last_steady_position
    }

    pub fn snapshot(&self) -> MotionSnapshot {
        MotionSnapshot {
            current: self.current,
            target: self.target,
            moving: self.is_moving(),
            stepping_style: self.stepping_style,
            reversed: self.reversed,
        }
    }

    /// 执行一条命令（仅在控制线程调用）
    pub fn execute(&mut self, command: MotorCommand) -> Result<(), DriverError> {
        match command {
            MotorCommand::MoveBy(steps) => {
                let target = self.target.checked_add(steps).ok_or_else(|| {
                    DriverError::InvalidInput(format!(
                        "moving {} steps from target {} overflows the position range",
                        steps, self.target
                    ))
                })?;
                self.retarget(target)?;
            },
            MotorCommand::MoveTo(position) => self.retarget(position)?,
            MotorCommand::Halt => self.target = self.current,
            MotorCommand::Mark(label) => {
                self.marks.insert(label, self.current);
            },
            MotorCommand::Goto(label) => {
                let position = self
                    .marks
                    .get(&label)
                    .copied()
                    .ok_or(DriverError::UndefinedLabel(label))?;
                self.retarget(position)?;
            },
            MotorCommand::SetIdleInterval(interval) => {
                self.reporting.set_pending(ReportTimer::Idle, interval)
            },
            MotorCommand::SetMotionInterval(interval) => {
                self.reporting.set_pending(ReportTimer::Motion, interval)
            },
            MotorCommand::SetSteppingStyle(style) => self.stepping_style = style,
            MotorCommand::SetReversed(reversed) => self.reversed = reversed,
            MotorCommand::SetStepDelay(delay) => self.step_delay = delay,
            MotorCommand::Observe(observer) => self.observer = ObserverSlot::new(observer),
            MotorCommand::AwaitRest(reply) => self.rest_waiters.push(reply),
        }
        Ok(())
    }

    /// 设置新目标
    ///
    /// 目标与当前位置之差必须能用 `Position` 表示，否则拒绝，`target` 保持不变。
    /// `current` 只会向 `target` 靠拢，因此之后的逐步运动不会溢出。
    fn retarget(&mut self, target: Position) -> Result<(), DriverError> {
        if target.checked_sub(self.current).is_none() {
            return Err(DriverError::InvalidInput(format!(
                "target {} is out of reach from position {}",
                target, self.current
            )));
        }
        self.target = target;
        Ok(())
    }

    /// 执行命令并吞掉错误（记录日志）
    fn execute_safely(&mut self, command: MotorCommand, ctx: &MotionContext) {
        let description = command.to_string();
        match self.execute(command) {
            Ok(()) => {
                ctx.metrics.commands_executed.fetch_add(1, Ordering::Relaxed);
                info!("Command: {} executed.", description);
            },
            Err(e) => {
                ctx.metrics.commands_failed.fetch_add(1, Ordering::Relaxed);
                error!("Error executing {}: {}", description, e);
            },
        }
    }

    /// 向目标前进一个单位
    ///
    /// 返回逻辑位移（+1/-1/0），由调用方累加到 `current`。
    /// 逻辑方向 = sign(target - current) XOR reversed。
    /// 终点步之后一定断电，即使 `step()` 失败也是如此（先断电，再传播错误）。
    pub fn perform_motion_increment(&mut self) -> Result<i64, ActuatorError> {
        let logical_change: i64 = match self.target.cmp(&self.current) {
            CmpOrdering::Equal => return Ok(0),
            CmpOrdering::Greater => 1,
            CmpOrdering::Less => -1,
        };
        let backwards = (logical_change < 0) != self.reversed;
        let direction = if backwards {
            Direction::Backward
        } else {
            Direction::Forward
        };

        self.energized = true;
        let stepped = self.actuator.step(direction, self.stepping_style);

        if self.target.abs_diff(self.current) == 1 {
            self.release_actuator();
        }

        stepped.map(|()| logical_change)
    }

    fn advance(&mut self, ctx: &MotionContext) {
        match self.perform_motion_increment() {
            Ok(0) => {},
            Ok(delta) => {
                self.current += delta;
                ctx.metrics.steps_issued.fetch_add(1, Ordering::Relaxed);
                if !self.step_delay.is_zero() {
                    spin_sleep::sleep(self.step_delay);
                }
            },
            Err(e) => {
                ctx.metrics.actuator_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    "Error performing motion increment ({} -> {}): {}",
                    self.current, self.target, e
                );
                spin_sleep::sleep(self.step_delay.max(ACTUATOR_FAILURE_BACKOFF));
            },
        }
    }

    fn release_actuator(&mut self) {
        match self.actuator.release() {
            Ok(()) => {
                self.energized = false;
                debug!("Released motor.");
            },
            Err(e) => warn!("Failed to release motor: {}", e),
        }
    }

    /// 上报 `(target, current)`，观察者失败只记录警告
    fn report(&self, ctx: &MotionContext) {
        ctx.metrics.reports_emitted.fetch_add(1, Ordering::Relaxed);
        trace!("Position update: target={} actual={}", self.target, self.current);
        if let Err(e) = self.observer.notify(self.target, self.current) {
            ctx.metrics.observer_failures.fetch_add(1, Ordering::Relaxed);
            warn!("{}", e);
        }
    }

    /// 应用一个待生效的上报周期：改周期、立即上报、重启该计时器
    fn accept_pending_interval(&mut self, ctx: &MotionContext) {
        let Some((which, interval)) = self.reporting.take_pending() else {
            return;
        };
        let timer = self.reporting.timer_mut(which);
        debug!(
            "New {:?} update interval, changed from {:?} to {:?}.",
            which,
            timer.period(),
            interval
        );
        timer.set_period(interval);
        self.report(ctx);
        self.reporting.timer_mut(which).restart();
    }

    fn on_motion_started(&mut self) {
        trace!("Motion started: {} -> {}", self.current, self.target);
        self.reporting.activate(ReportTimer::Motion);
    }

    fn on_motion_stopped(&mut self, ctx: &MotionContext) {
        self.report(ctx);
        if self.energized {
            self.release_actuator();
        }
        self.reporting.activate(ReportTimer::Idle);
        self.last_steady_position = self.current;
        trace!("Motion complete at {}", self.current);
    }

    /// 静止时应答所有等待者
    fn answer_rest_waiters(&mut self) {
        for waiter in self.rest_waiters.drain(..) {
            // 等待者可能已超时离开
            let _ = waiter.send(self.current);
        }
    }

    /// 单轮循环，返回本轮结束时是否处于运动状态
    ///
    /// `was_moving` 为上一轮的返回值。
    pub fn iterate(&mut self, queue: &CommandQueue, ctx: &MotionContext, was_moving: bool) -> bool {
        if was_moving {
            if let Some(command) = queue.try_dequeue() {
                self.execute_safely(command, ctx);
            }
            self.advance(ctx);
        } else if let Some(command) = queue.dequeue(self.reporting.idle_interval()) {
            self.execute_safely(command, ctx);
        }

        if self.reporting.has_pending_change() {
            self.accept_pending_interval(ctx);
        }

        let moving = self.is_moving();
        match (was_moving, moving) {
            (false, true) => self.on_motion_started(),
            (true, false) => self.on_motion_stopped(ctx),
            _ => {
                if self.reporting.active_expired() {
                    self.report(ctx);
                    self.reporting.restart_active();
                }
            },
        }

        // 先发布快照，等待者醒来后读到的即是静止位置
        ctx.publish(self.snapshot());

        if !moving {
            self.answer_rest_waiters();
        }
        moving
    }

    /// 控制线程退出时的清理：无条件断电，放弃未应答的等待者
    fn shutdown(&mut self) {
        self.release_actuator();
        self.rest_waiters.clear();
    }
}

/// 控制线程主循环
///
/// 运行到 `ctx` 的运行标志被清除为止，然后把状态交还给调用方。
pub fn motion_loop<A: Actuator>(
    mut core: MotionCore<A>,
    queue: CommandQueue,
    ctx: Arc<MotionContext>,
) -> MotionCore<A> {
    debug!("Starting motion loop");

    let mut moving = core.is_moving();
    core.reporting.activate(if moving {
        ReportTimer::Motion
    } else {
        ReportTimer::Idle
    });
    ctx.publish(core.snapshot());

    while ctx.is_running() {
        moving = core.iterate(&queue, &ctx, moving);
    }

    core.shutdown();
    ctx.publish(core.snapshot());
    debug!("Exiting motion loop");
    core
}
