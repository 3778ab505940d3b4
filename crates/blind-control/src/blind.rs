//! 智能窗帘控制器
//!
//! 在 [`AsyncStepper`] 之上提供校准与百分比控制：
//! - 校准：`wind` / `counter_wind` 手动转到端点，`set_opened_point` / `set_closed_point` 记录
//! - 控制：`open` / `close` / `move_to(percentage)` / `halt`
//! - 上报：驱动层的位置上报换算为百分比，附带运动事件，转发给 [`BlindObserver`]

use blind_driver::{
    Actuator, ActuatorError, AsyncStepper, AsyncStepperBuilder, ObserverError, Position,
    StepperChannel,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::calibration::Calibration;
use crate::config::{BlindConfig, BlindSettings};
use crate::error::BlindError;
use crate::event::{BlindObserver, MotionTracker};

/// 最慢速度（0.1）对应的每步延时
const SLOWEST_STEP_DELAY: Duration = Duration::from_millis(10);
/// 最快速度（1.0）对应的每步延时
const FASTEST_STEP_DELAY: Duration = Duration::from_millis(1);

/// 速度系数 → 每步延时（线性：0.1 → 10ms，1.0 → 1ms）
///
/// # 错误
/// - `BlindError::InvalidSpeed`: 不在 [0.1, 1.0] 或不是有限数
pub fn step_delay_for_speed(speed: f64) -> Result<Duration, BlindError> {
    if !speed.is_finite() || !(0.1..=1.0).contains(&speed) {
        return Err(BlindError::InvalidSpeed(speed));
    }
    let slowest = SLOWEST_STEP_DELAY.as_secs_f64();
    let fastest = FASTEST_STEP_DELAY.as_secs_f64();
    let fraction = (speed - 0.1) / 0.9;
    let micros = ((slowest - (slowest - fastest) * fraction) * 1e6).round();
    Ok(Duration::from_micros(micros as u64))
}

/// 控制线程与调用方共享的窗帘状态
struct BlindShared {
    calibration: Mutex<Calibration>,
    tracker: Mutex<MotionTracker>,
    observer: Mutex<Option<Arc<dyn BlindObserver>>>,
}

impl BlindShared {
    fn new(calibration: Calibration) -> Self {
        Self {
            calibration: Mutex::new(calibration),
            tracker: Mutex::new(MotionTracker::new()),
            observer: Mutex::new(None),
        }
    }

    /// 驱动层位置上报（在控制线程上调用）
    fn on_position_update(&self, target: Position, actual: Position) -> Result<(), ObserverError> {
        let calibration = *self.calibration.lock();
        if !calibration.is_complete() {
            debug!(
                "Calibration not yet complete: opened is {:?}, closed is {:?}",
                calibration.opened, calibration.closed
            );
            return Ok(());
        }

        let target = calibration.percentage_for(target)?;
        let actual = calibration.percentage_for(actual)?;
        let report = self.tracker.lock().classify(target, actual);

        // 回调期间不持锁，观察者可以重新注册自己
        let observer = self.observer.lock().clone();
        match observer {
            Some(observer) => observer.on_motion_report(report),
            None => Ok(()),
        }
    }
}

/// 智能窗帘
///
/// # Example
///
/// ```
/// use blind_control::{BlindSettings, SmartBlind};
/// use blind_driver::{AsyncStepper, MotionConfig};
/// use blind_driver::actuator::SimulatedStepper;
///
/// let stepper = AsyncStepper::new(SimulatedStepper::new(), MotionConfig::default())?;
/// let blind = SmartBlind::new(stepper, &BlindSettings::default())?;
/// blind.start()?;
///
/// blind.wind(4)?; // 4 * 50
/// blind.wait()?;
/// blind.set_opened_point();
/// blind.counter_wind(4)?;
/// blind.wait()?;
/// blind.set_closed_point();
///
/// blind.move_to(50.0)?;
/// assert_eq!(blind.wait()?, 100);
/// blind.stop()?;
/// # Ok::<(), blind_control::BlindError>(())
/// ```
pub struct SmartBlind<A: Actuator + 'static = Box<dyn Actuator>> {
    stepper: AsyncStepper<A>,
    shared: Arc<BlindShared>,
    step_size: AtomicU32,
}

impl<A: Actuator + 'static> SmartBlind<A> {
    /// 包装一个（停止状态的）控制器
    ///
    /// # 错误
    /// - `BlindError::InvalidStepSize`: 步长为 0
    pub fn new(stepper: AsyncStepper<A>, settings: &BlindSettings) -> Result<Self, BlindError> {
        if settings.step_size == 0 {
            return Err(BlindError::InvalidStepSize(settings.step_size));
        }

        let shared = Arc::new(BlindShared::new(settings.calibration()));
        let sink = shared.clone();
        stepper.observe(
            move |target: Position, actual: Position| -> Result<(), ObserverError> {
                sink.on_position_update(target, actual)
            },
        );

        Ok(Self {
            stepper,
            shared,
            step_size: AtomicU32::new(settings.step_size),
        })
    }

    /// 按配置构建（校验配置，执行器由工厂创建）
    pub fn from_config<F>(config: &BlindConfig, actuator_factory: F) -> Result<Self, BlindError>
    where
        F: FnOnce(StepperChannel) -> Result<A, ActuatorError>,
    {
        config.validate()?;
        let stepper = AsyncStepperBuilder::new()
            .config(config.driver.motion_config()?)
            .build(actuator_factory)?;
        Self::new(stepper, &config.blind)
    }

    /// 底层控制器（标记、步进方式等低层操作）
    pub fn stepper(&self) -> &AsyncStepper<A> {
        &self.stepper
    }

    /// 注册百分比观察者（替换已有观察者）
    pub fn observe(&self, observer: impl BlindObserver + 'static) {
        *self.shared.observer.lock() = Some(Arc::new(observer));
    }

    pub fn clear_observer(&self) {
        *self.shared.observer.lock() = None;
    }

    pub fn start(&self) -> Result<(), BlindError> {
        Ok(self.stepper.start()?)
    }

    pub fn stop(&self) -> Result<(), BlindError> {
        Ok(self.stepper.stop()?)
    }

    pub fn try_start(&self) -> bool {
        self.stepper.try_start()
    }

    pub fn try_stop(&self) -> bool {
        self.stepper.try_stop()
    }

    /// 等待静止，返回电机位置
    pub fn wait(&self) -> Result<Position, BlindError> {
        Ok(self.stepper.wait()?)
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Result<Position, BlindError> {
        Ok(self.stepper.wait_timeout(timeout)?)
    }

    fn steps(&self, count: u32) -> Result<i64, BlindError> {
        let step_size = self.step_size.load(Ordering::Relaxed);
        i64::from(count)
            .checked_mul(i64::from(step_size))
            .ok_or(BlindError::StepOverflow { count, step_size })
    }

    /// 正向转动 `count` 个校准步
    pub fn wind(&self, count: u32) -> Result<(), BlindError> {
        self.stepper.move_by(self.steps(count)?);
        info!("Wind by {} step{}.", count, if count == 1 { "" } else { "s" });
        Ok(())
    }

    /// 反向转动 `count` 个校准步
    pub fn counter_wind(&self, count: u32) -> Result<(), BlindError> {
        self.stepper.move_by(-self.steps(count)?);
        info!("Counter wind by {} step{}.", count, if count == 1 { "" } else { "s" });
        Ok(())
    }

    fn steady_position(&self) -> Position {
        let snapshot = self.stepper.snapshot();
        if snapshot.moving {
            warn!(
                "Calibrating while in motion, using in-flight position {}",
                snapshot.current
            );
        }
        snapshot.current
    }

    /// 以当前位置为完全打开点
    pub fn set_opened_point(&self) -> Position {
        let position = self.steady_position();
        self.shared.calibration.lock().opened = Some(position);
        debug!("Set opened position to {}.", position);
        position
    }

    /// 以当前位置为完全关闭点
    pub fn set_closed_point(&self) -> Position {
        let position = self.steady_position();
        self.shared.calibration.lock().closed = Some(position);
        debug!("Set closed position to {}.", position);
        position
    }

    /// 完全打开
    pub fn open(&self) -> Result<(), BlindError> {
        let position = self.calibration().opened()?;
        self.stepper.move_to(position);
        debug!("Opening blind (moving to position of {}).", position);
        Ok(())
    }

    /// 完全关闭
    pub fn close(&self) -> Result<(), BlindError> {
        let position = self.calibration().closed()?;
        self.stepper.move_to(position);
        debug!("Closing blind (moving to position of {}).", position);
        Ok(())
    }

    /// 移动到百分比位置
    ///
    /// # 错误
    /// - `BlindError::NotCalibrated`: 缺少任一校准点
    /// - `BlindError::DegenerateCalibration`: 两个校准点相同
    /// - `BlindError::InvalidPercentage`: 不在 [0, 100]
    pub fn move_to(&self, percentage: f64) -> Result<(), BlindError> {
        let position = self.calibration().position_for(percentage)?;
        self.stepper.move_to(position);
        info!("Moving to {}%.", percentage);
        Ok(())
    }

    pub fn halt(&self) {
        self.stepper.halt();
        info!("Halt.");
    }

    /// 设置校准步长
    pub fn set_step_size(&self, step_size: u32) -> Result<(), BlindError> {
        if step_size == 0 {
            return Err(BlindError::InvalidStepSize(step_size));
        }
        self.step_size.store(step_size, Ordering::Relaxed);
        info!("Set step size to {}.", step_size);
        Ok(())
    }

    pub fn step_size(&self) -> u32 {
        self.step_size.load(Ordering::Relaxed)
    }

    /// 100% 表示完全打开（`true`）或完全关闭（`false`）
    pub fn set_polarity(&self, open_is_100: bool) {
        self.shared.calibration.lock().open_is_100 = open_is_100;
        info!(
            "Interpret 100% as fully {}.",
            if open_is_100 { "open" } else { "closed" }
        );
    }

    /// 设置运动速度（0.1 ~ 1.0），返回对应的每步延时
    pub fn set_speed(&self, speed: f64) -> Result<Duration, BlindError> {
        let delay = step_delay_for_speed(speed)?;
        self.stepper.set_step_delay(delay);
        info!("Set speed to {} ({:?} per step).", speed, delay);
        Ok(delay)
    }

    pub fn calibration(&self) -> Calibration {
        *self.shared.calibration.lock()
    }

    /// 当前设置（可写回配置文件）
    pub fn settings(&self) -> BlindSettings {
        let calibration = self.calibration();
        BlindSettings {
            step_size: self.step_size(),
            open_is_100: calibration.open_is_100,
            opened_position: calibration.opened,
            closed_position: calibration.closed,
        }
    }

    /// 最近快照换算的 `(target, actual)` 百分比，未校准时为 `None`
    pub fn percentages(&self) -> Option<(f64, f64)> {
        let calibration = self.calibration();
        let snapshot = self.stepper.snapshot();
        let target = calibration.percentage_for(snapshot.target).ok()?;
        let actual = calibration.percentage_for(snapshot.current).ok()?;
        Some((target, actual))
    }
}
