//! 会话：一台模拟窗帘及其命令执行

use anyhow::Result;
use blind_control::{BlindConfig, MotionEvent, MotionReport, SmartBlind};
use blind_driver::actuator::{SimulatedStepper, StepLog};
use blind_driver::{ObserverError, Position};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::script::{BlindCommand, HELP};

/// `sleep` 检查中断的间隔
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// 命令执行后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// 会话
pub struct Session {
    blind: Arc<SmartBlind<SimulatedStepper>>,
    log: StepLog,
    interrupted: Arc<AtomicBool>,
}

impl Session {
    /// 创建模拟窗帘并启动控制线程
    pub fn start(config: &BlindConfig) -> Result<Self> {
        let actuator = SimulatedStepper::new();
        let log = actuator.log();
        let blind = SmartBlind::from_config(config, |channel| {
            debug!("Simulating stepper motor on {}", channel);
            Ok(actuator)
        })?;

        blind.observe(|report: MotionReport| -> Result<(), ObserverError> {
            if report.event != MotionEvent::Idle {
                println!("{}", report);
            }
            Ok(())
        });
        blind.start()?;

        Ok(Self {
            blind: Arc::new(blind),
            log,
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Ctrl+C：原地停止，并中断 `sleep`
    ///
    /// 每个进程只能安装一次。
    pub fn install_interrupt_handler(&self) -> Result<()> {
        let blind = self.blind.clone();
        let interrupted = self.interrupted.clone();
        ctrlc::set_handler(move || {
            eprintln!("\n🛑 Interrupted, halting blind");
            interrupted.store(true, Ordering::SeqCst);
            blind.halt();
        })?;
        Ok(())
    }

    /// 是否收到过 Ctrl+C（读取后清除）
    pub fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::SeqCst)
    }

    pub fn blind(&self) -> &SmartBlind<SimulatedStepper> {
        &self.blind
    }

    /// 执行一条命令
    pub fn execute(&self, command: &BlindCommand) -> Result<Flow> {
        let blind = &self.blind;
        match command {
            BlindCommand::Wind(count) => blind.wind(*count)?,
            BlindCommand::CounterWind(count) => blind.counter_wind(*count)?,
            BlindCommand::SetOpened => {
                println!("✅ Opened point set at {}", blind.set_opened_point());
            },
            BlindCommand::SetClosed => {
                println!("✅ Closed point set at {}", blind.set_closed_point());
            },
            BlindCommand::Open => blind.open()?,
            BlindCommand::Close => blind.close()?,
            BlindCommand::GoTo(percentage) => blind.move_to(*percentage)?,
            BlindCommand::Stop => blind.halt(),
            BlindCommand::StepSize(size) => blind.set_step_size(*size)?,
            BlindCommand::Polarity(open_is_100) => blind.set_polarity(*open_is_100),
            BlindCommand::Speed(speed) => {
                let delay = blind.set_speed(*speed)?;
                println!("✅ Speed {} ({:?} per step)", speed, delay);
            },
            BlindCommand::Style(style) => blind.stepper().set_stepping_style(*style),
            BlindCommand::Reverse(reversed) => blind.stepper().set_reversed(*reversed),
            BlindCommand::Mark(label) => blind.stepper().mark(label.as_str()),
            BlindCommand::Goto(label) => blind.stepper().goto(label.as_str()),
            BlindCommand::Wait => {
                let position = blind.wait()?;
                println!("at rest: position={}{}", position, self.percentage_suffix(position));
            },
            BlindCommand::Status => println!("{}", self.status()),
            BlindCommand::Sleep(duration) => self.sleep(*duration),
            BlindCommand::Help => println!("{}", HELP),
            BlindCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() || self.interrupted.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(left.min(SLEEP_SLICE));
        }
    }

    fn percentage_suffix(&self, position: Position) -> String {
        match self.blind.calibration().percentage_for(position) {
            Ok(percentage) => format!(" ({}%)", percentage.round() as i64),
            Err(_) => String::new(),
        }
    }

    /// 状态摘要
    pub fn status(&self) -> String {
        let blind = &self.blind;
        let snapshot = blind.stepper().snapshot();
        let calibration = blind.calibration();
        let metrics = blind.stepper().metrics().snapshot();

        let motion = if snapshot.moving { "moving" } else { "at rest" };
        let percentages = match blind.percentages() {
            Some((target, actual)) => format!(
                "actual={}% target={}%",
                actual.round() as i64,
                target.round() as i64
            ),
            None => "uncalibrated".to_string(),
        };
        let point = |p: Option<Position>| p.map_or_else(|| "unset".to_string(), |p| p.to_string());

        format!(
            "position={} target={} ({})\n\
             {}\n\
             calibration: opened={} closed={} 100%={}\n\
             style={} reversed={} step-size={}\n\
             steps={} energized={} commands={} failed={}",
            snapshot.current,
            snapshot.target,
            motion,
            percentages,
            point(calibration.opened),
            point(calibration.closed),
            if calibration.open_is_100 { "open" } else { "closed" },
            snapshot.stepping_style,
            if snapshot.reversed { "on" } else { "off" },
            blind.step_size(),
            self.log.step_count(),
            if self.log.is_energized() { "yes" } else { "no" },
            metrics.commands_executed,
            metrics.commands_failed,
        )
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.blind.stepper().is_running() && !self.blind.try_stop() {
            warn!("Blind controller did not stop cleanly");
        }
    }
}
