//! 命令类型与命令队列
//!
//! 外部线程对控制器的所有修改都封装为 [`MotorCommand`]，经 [`CommandQueue`]
//! 交给控制线程，按入队顺序逐条执行，绝不并发执行。

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::actuator::SteppingStyle;
use crate::hooks::PositionObserver;
use crate::state::Position;

/// 电机控制命令
///
/// 每条命令只在控制线程上执行一次。`Display` 给出可读描述，用于日志。
pub enum MotorCommand {
    /// target += steps
    MoveBy(i64),
    /// target = position
    MoveTo(Position),
    /// target = current（原地取消剩余运动）
    Halt,
    /// marks[label] = current
    Mark(String),
    /// target = marks[label]，未标记时失败
    Goto(String),
    /// 设置待生效的空闲上报周期（下一轮循环生效）
    SetIdleInterval(Duration),
    /// 设置待生效的运动上报周期（下一轮循环生效）
    SetMotionInterval(Duration),
    SetSteppingStyle(SteppingStyle),
    /// 逻辑方向反转标志（与物理方向无关）
    SetReversed(bool),
    /// 每个物理步之后的延时（速度控制）
    SetStepDelay(Duration),
    /// 注册（或用 `None` 清除）位置观察者
    Observe(Option<Arc<dyn PositionObserver>>),
    /// 静止屏障：控制器下一次处于 Idle 时，把 current 发回给等待者
    AwaitRest(Sender<Position>),
}

impl fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorCommand::MoveBy(steps) => write!(f, "move by {}", steps),
            MotorCommand::MoveTo(position) => write!(f, "move to {}", position),
            MotorCommand::Halt => write!(f, "halt"),
            MotorCommand::Mark(label) => write!(f, "mark '{}'", label),
            MotorCommand::Goto(label) => write!(f, "go to '{}'", label),
            MotorCommand::SetIdleInterval(interval) => {
                write!(f, "idle update interval {:?}", interval)
            },
            MotorCommand::SetMotionInterval(interval) => {
                write!(f, "motion update interval {:?}", interval)
            },
            MotorCommand::SetSteppingStyle(style) => write!(f, "stepping style {}", style),
            MotorCommand::SetReversed(reversed) => write!(f, "reverse motion {}", reversed),
            MotorCommand::SetStepDelay(delay) => write!(f, "motion step delay {:?}", delay),
            MotorCommand::Observe(Some(_)) => write!(f, "observe"),
            MotorCommand::Observe(None) => write!(f, "clear observer"),
            MotorCommand::AwaitRest(_) => write!(f, "await rest"),
        }
    }
}

impl fmt::Debug for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MotorCommand({})", self)
    }
}

/// 命令队列（无界、线程安全、FIFO）
///
/// - `enqueue()` 永不阻塞、永不失败
/// - `dequeue(timeout)` 队列为空时最多阻塞 `timeout`
/// - `try_dequeue()` 不阻塞
/// - `interrupt()` 唤醒正在 `dequeue()` 中阻塞的控制线程（用于 stop）
///
/// 队列同时持有收发两端，因此通道永远不会断开。
#[derive(Clone)]
pub struct CommandQueue {
    tx: Sender<MotorCommand>,
    rx: Receiver<MotorCommand>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        // 唤醒信号只需保留一个
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        Self {
            tx,
            rx,
            wake_tx,
            wake_rx,
        }
    }

    /// 入队
    pub fn enqueue(&self, command: MotorCommand) {
        // 本结构同时持有 Receiver，send 不会失败
        let _ = self.tx.send(command);
    }

    /// 出队（最多阻塞 `timeout`）
    ///
    /// 超时或被 `interrupt()` 唤醒时返回 `None`。
    pub fn dequeue(&self, timeout: Duration) -> Option<MotorCommand> {
        if let Some(command) = self.try_dequeue() {
            return Some(command);
        }

        crossbeam_channel::select! {
            recv(self.rx) -> msg => msg.ok(),
            recv(self.wake_rx) -> _ => None,
            default(timeout) => None,
        }
    }

    /// 非阻塞出队
    pub fn try_dequeue(&self) -> Option<MotorCommand> {
        match self.rx.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// 唤醒阻塞中的 `dequeue()`
    pub fn interrupt(&self) {
        let _ = self.wake_tx.try_send(());
    }

    /// 丢弃尚未消费的唤醒信号
    pub fn clear_interrupt(&self) {
        while self.wake_rx.try_recv().is_ok() {}
    }

    /// 当前排队的命令数
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.len())
            .finish()
    }
}
