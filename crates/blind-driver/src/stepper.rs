//! 异步步进电机控制器（对外 API）

use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::actuator::{Actuator, StepperChannel, SteppingStyle};
use crate::command::{CommandQueue, MotorCommand};
use crate::error::DriverError;
use crate::hooks::PositionObserver;
use crate::metrics::LoopMetrics;
use crate::pipeline::{MotionConfig, MotionCore, motion_loop};
use crate::state::{MotionContext, MotionSnapshot, Position};

/// `wait()` 检查控制线程存活的间隔
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 控制线程生命周期
///
/// 停止时状态留在这里；运行时状态随线程移走，`stop()` join 后取回。
enum LoopState<A: Actuator> {
    Stopped(MotionCore<A>),
    Running(JoinHandle<MotionCore<A>>),
    /// 控制线程 panic，状态已丢失
    Poisoned,
}

/// 异步步进电机控制器
///
/// 所有修改都以命令形式入队，由唯一的控制线程按顺序执行，调用方从不阻塞
/// （`stop()` / `wait()` 除外）。
///
/// # Example
///
/// ```
/// use blind_driver::{AsyncStepper, MotionConfig};
/// use blind_driver::actuator::SimulatedStepper;
///
/// let stepper = AsyncStepper::new(SimulatedStepper::new(), MotionConfig::default())?;
/// stepper.start()?;
/// stepper.move_to(10);
/// assert_eq!(stepper.wait()?, 10);
/// stepper.stop()?;
/// # Ok::<(), blind_driver::DriverError>(())
/// ```
pub struct AsyncStepper<A: Actuator + 'static = Box<dyn Actuator>> {
    channel: StepperChannel,
    queue: CommandQueue,
    ctx: Arc<MotionContext>,
    state: Mutex<LoopState<A>>,
}

impl<A: Actuator + 'static> AsyncStepper<A> {
    /// 创建控制器（停止状态，位置为 0）
    ///
    /// # 错误
    /// - `DriverError::InvalidChannel`: 通道号不是 1 或 2
    pub fn new(actuator: A, config: MotionConfig) -> Result<Self, DriverError> {
        let channel = StepperChannel::try_from(config.channel)?;
        Ok(Self::with_channel(channel, actuator, &config))
    }

    pub(crate) fn with_channel(channel: StepperChannel, actuator: A, config: &MotionConfig) -> Self {
        let core = MotionCore::new(actuator, config);
        let ctx = Arc::new(MotionContext::new());
        ctx.publish(core.snapshot());
        debug!("Stepper motor controller created on {}", channel);
        Self {
            channel,
            queue: CommandQueue::new(),
            ctx,
            state: Mutex::new(LoopState::Stopped(core)),
        }
    }

    pub fn channel(&self) -> StepperChannel {
        self.channel
    }

    fn enqueue(&self, command: MotorCommand) {
        debug!("Command: {} queued.", command);
        self.queue.enqueue(command);
    }

    /// target += steps
    ///
    /// 结果超出位置范围时只记录错误日志，目标不变。
    pub fn move_by(&self, steps: i64) {
        self.enqueue(MotorCommand::MoveBy(steps));
    }

    /// target = position
    ///
    /// 与当前位置之差不可表示时只记录错误日志，目标不变。
    pub fn move_to(&self, position: Position) {
        self.enqueue(MotorCommand::MoveTo(position));
    }

    /// 原地停止
    pub fn halt(&self) {
        self.enqueue(MotorCommand::Halt);
    }

    /// 记录当前位置
    pub fn mark(&self, label: impl Into<String>) {
        self.enqueue(MotorCommand::Mark(label.into()));
    }

    /// 移动到标记位置；未标记时只记录错误日志
    pub fn goto(&self, label: impl Into<String>) {
        self.enqueue(MotorCommand::Goto(label.into()));
    }

    /// 注册位置观察者（替换已有观察者）
    pub fn observe(&self, observer: impl PositionObserver + 'static) {
        self.enqueue(MotorCommand::Observe(Some(Arc::new(observer))));
    }

    pub fn clear_observer(&self) {
        self.enqueue(MotorCommand::Observe(None));
    }

    pub fn set_idle_interval(&self, interval: Duration) {
        self.enqueue(MotorCommand::SetIdleInterval(interval));
    }

    pub fn set_motion_interval(&self, interval: Duration) {
        self.enqueue(MotorCommand::SetMotionInterval(interval));
    }

    pub fn set_stepping_style(&self, style: SteppingStyle) {
        self.enqueue(MotorCommand::SetSteppingStyle(style));
    }

    pub fn set_reversed(&self, reversed: bool) {
        self.enqueue(MotorCommand::SetReversed(reversed));
    }

    /// 每个物理步之后的延时（越大越慢）
    pub fn set_step_delay(&self, delay: Duration) {
        self.enqueue(MotorCommand::SetStepDelay(delay));
    }

    /// 启动控制线程
    ///
    /// # 错误
    /// - `DriverError::AlreadyRunning`: 已在运行
    /// - `DriverError::LoopPanicked`: 上一次运行时控制线程 panic
    pub fn start(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, LoopState::Poisoned) {
            LoopState::Stopped(core) => {
                info!("Stepper motor controller starting...");
                self.queue.clear_interrupt();
                self.ctx.set_running(true);

                let queue = self.queue.clone();
                let ctx = self.ctx.clone();
                *state = LoopState::Running(spawn(move || motion_loop(core, queue, ctx)));

                info!("Stepper motor controller started.");
                Ok(())
            },
            running @ LoopState::Running(_) => {
                *state = running;
                Err(DriverError::AlreadyRunning)
            },
            LoopState::Poisoned => Err(DriverError::LoopPanicked),
        }
    }

    /// 停止控制线程并等待其退出
    ///
    /// 返回后执行器已断电；位置、目标、标记等状态保留，可再次 `start()`。
    ///
    /// # 错误
    /// - `DriverError::NotRunning`: 未在运行
    /// - `DriverError::LoopPanicked`: 控制线程 panic
    pub fn stop(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, LoopState::Poisoned) {
            LoopState::Running(handle) => {
                info!("Stepper motor controller stopping...");
                self.ctx.set_running(false);
                // 空闲时控制线程阻塞在队列上，需要唤醒
                self.queue.interrupt();

                match handle.join() {
                    Ok(core) => {
                        *state = LoopState::Stopped(core);
                        info!("Stepper motor controller stopped.");
                        Ok(())
                    },
                    Err(_) => {
                        error!("Motion loop thread panicked, controller state lost");
                        Err(DriverError::LoopPanicked)
                    },
                }
            },
            other => {
                *state = other;
                Err(DriverError::NotRunning)
            },
        }
    }

    /// 启动，已在运行时返回 `false`
    pub fn try_start(&self) -> bool {
        match self.start() {
            Ok(()) => true,
            Err(e) => {
                debug!("try_start: {}", e);
                false
            },
        }
    }

    /// 停止，未在运行时返回 `false`
    pub fn try_stop(&self) -> bool {
        match self.stop() {
            Ok(()) => true,
            Err(e) => {
                debug!("try_stop: {}", e);
                false
            },
        }
    }

    pub fn is_running(&self) -> bool {
        self.ctx.is_running()
    }

    /// 控制线程是否存活（运行中且没有 panic 退出）
    fn loop_alive(&self) -> bool {
        match &*self.state.lock() {
            LoopState::Running(handle) => !handle.is_finished(),
            _ => false,
        }
    }

    /// 等待静止并返回静止位置
    ///
    /// 等待的是本次调用之前已入队的全部命令执行完毕后的第一次静止，
    /// 因此返回值一定是 `current == target` 时的位置，不会是运动中的位置。
    /// 多个线程可同时等待。
    ///
    /// # 错误
    /// - `DriverError::NotRunning`: 未在运行，或等待期间被停止
    pub fn wait(&self) -> Result<Position, DriverError> {
        self.wait_until(None)
    }

    /// 带超时的 [`wait`](Self::wait)
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 超时
    /// - `DriverError::NotRunning`: 未在运行，或等待期间被停止
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Position, DriverError> {
        self.wait_until(Some(Instant::now() + timeout))
    }

    fn wait_until(&self, deadline: Option<Instant>) -> Result<Position, DriverError> {
        if !self.is_running() {
            return Err(DriverError::NotRunning);
        }

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.enqueue(MotorCommand::AwaitRest(reply_tx));

        loop {
            let slice = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Err(DriverError::Timeout);
                    }
                    left.min(WAIT_POLL_INTERVAL)
                },
                None => WAIT_POLL_INTERVAL,
            };

            match reply_rx.recv_timeout(slice) {
                Ok(position) => return Ok(position),
                // 控制线程退出时丢弃了应答端
                Err(RecvTimeoutError::Disconnected) => return Err(DriverError::NotRunning),
                Err(RecvTimeoutError::Timeout) => {
                    // 屏障可能仍在队列中而线程已停止
                    if !self.is_running() || !self.loop_alive() {
                        return Err(DriverError::NotRunning);
                    }
                },
            }
        }
    }

    /// 最近发布的运动状态（可能已过时）
    pub fn snapshot(&self) -> MotionSnapshot {
        self.ctx.load_snapshot()
    }

    pub fn metrics(&self) -> &LoopMetrics {
        &self.ctx.metrics
    }

    /// 尚未被控制线程取走的命令数
    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }
}

impl<A: Actuator + 'static> fmt::Debug for AsyncStepper<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncStepper")
            .field("channel", &self.channel)
            .field("running", &self.is_running())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl<A: Actuator + 'static> Drop for AsyncStepper<A> {
    fn drop(&mut self) {
        if self.is_running()
            && let Err(e) = self.stop()
        {
            error!("Failed to stop stepper motor controller on drop: {}", e);
        }
    }
}
