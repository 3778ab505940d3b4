//! 运动控制器集成测试
//!
//! 通过公开 API 驱动真实的控制线程，用 `SimulatedStepper` 的调用日志验证：
//! 1. 命令语义（moveBy / moveTo / halt / mark / goto）
//! 2. 上报节奏（空闲/运动切换）
//! 3. wait() 只返回静止位置
//! 4. 观察者、执行器故障不会中断控制循环

use blind_driver::actuator::{SimulatedStepper, StepLog, StepRecord};
use blind_driver::{
    Actuator, ActuatorError, ActuatorErrorKind, AsyncStepper, Direction, DriverError,
    MotionConfig, ObserverError, Position, SteppingStyle,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn fast_config() -> MotionConfig {
    MotionConfig {
        idle_report_interval: Duration::from_millis(50),
        motion_report_interval: Duration::from_millis(10),
        ..MotionConfig::default()
    }
}

/// 日志输出到测试捕获（多次调用只有第一次生效）
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn started(config: MotionConfig) -> (AsyncStepper<SimulatedStepper>, StepLog) {
    init_tracing();
    let actuator = SimulatedStepper::new();
    let log = actuator.log();
    let stepper = AsyncStepper::new(actuator, config).unwrap();
    stepper.start().unwrap();
    (stepper, log)
}

type Reports = Arc<Mutex<Vec<(Instant, Position, Position)>>>;

fn record_reports(stepper: &AsyncStepper<SimulatedStepper>) -> Reports {
    let reports: Reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    stepper.observe(move |target: Position, actual: Position| -> Result<(), ObserverError> {
        sink.lock().push((Instant::now(), target, actual));
        Ok(())
    });
    reports
}

#[test]
fn test_wait_scenario_ten_forward_steps_then_release() {
    let (stepper, log) = started(MotionConfig {
        channel: 1,
        idle_report_interval: Duration::from_secs(1),
        motion_report_interval: Duration::from_millis(100),
        ..MotionConfig::default()
    });

    stepper.move_to(10);
    assert_eq!(stepper.wait().unwrap(), 10);

    let mut expected = vec![
        StepRecord::Step {
            direction: Direction::Forward,
            style: SteppingStyle::Double,
        };
        10
    ];
    expected.push(StepRecord::Release);
    assert_eq!(log.records(), expected);

    stepper.stop().unwrap();
}

#[test]
fn test_move_by_sums() {
    let (stepper, log) = started(fast_config());
    stepper.move_by(50);
    stepper.move_by(-20);
    assert_eq!(stepper.wait().unwrap(), 30);
    assert_eq!(log.physical_position(), 30);

    let snapshot = stepper.snapshot();
    assert_eq!(snapshot.target, 30);
    assert_eq!(snapshot.current, 30);
    assert!(!snapshot.moving);
}

#[test]
fn test_move_to_round_trip() {
    let (stepper, log) = started(fast_config());
    stepper.move_to(100);
    assert_eq!(stepper.wait().unwrap(), 100);
    assert_eq!(log.steps_in(Direction::Forward), 100);
    assert_eq!(log.steps_in(Direction::Backward), 0);
    assert_eq!(log.last(), Some(StepRecord::Release));

    stepper.move_to(-25);
    assert_eq!(stepper.wait().unwrap(), -25);
    assert_eq!(log.steps_in(Direction::Backward), 125);
    assert_eq!(stepper.metrics().snapshot().steps_issued, 225);
}

#[test]
fn test_halt_mid_motion() {
    let (stepper, log) = started(MotionConfig {
        step_delay: Duration::from_millis(2),
        ..fast_config()
    });
    stepper.move_to(10_000);
    thread::sleep(Duration::from_millis(50));
    stepper.halt();

    let rest = stepper.wait().unwrap();
    assert!(rest > 0 && rest < 10_000, "halted at {}", rest);
    assert_eq!(stepper.snapshot().target, rest);
    assert!(!log.is_energized());
}

#[test]
fn test_mark_and_goto() {
    let (stepper, _log) = started(fast_config());
    stepper.move_to(40);
    stepper.wait().unwrap();
    stepper.mark("window");
    stepper.move_to(-5);
    assert_eq!(stepper.wait().unwrap(), -5);

    stepper.goto("window");
    assert_eq!(stepper.wait().unwrap(), 40);
}

#[test]
fn test_goto_undefined_label_is_logged_not_fatal() {
    let (stepper, log) = started(fast_config());
    stepper.move_to(7);
    stepper.wait().unwrap();
    let steps_before = log.step_count();

    stepper.goto("never-marked");
    assert_eq!(stepper.wait().unwrap(), 7);
    assert_eq!(stepper.snapshot().target, 7);
    assert_eq!(log.step_count(), steps_before);
    assert_eq!(stepper.metrics().snapshot().commands_failed, 1);

    // 后续命令照常执行
    stepper.move_by(1);
    assert_eq!(stepper.wait().unwrap(), 8);
}

#[test]
fn test_overflowing_move_by_is_rejected_loop_survives() {
    let (stepper, _log) = started(fast_config());
    stepper.move_by(i64::MAX);
    stepper.move_by(1);
    stepper.move_to(5);

    assert_eq!(stepper.wait_timeout(Duration::from_secs(2)).unwrap(), 5);
    assert!(stepper.is_running());
    assert_eq!(stepper.metrics().snapshot().commands_failed, 1);
    stepper.stop().unwrap();
}

#[test]
fn test_unreachable_move_to_is_rejected_loop_survives() {
    let (stepper, log) = started(fast_config());
    stepper.move_to(-1);
    assert_eq!(stepper.wait().unwrap(), -1);
    let steps_before = log.step_count();

    stepper.move_to(i64::MAX);
    assert_eq!(stepper.wait().unwrap(), -1);
    assert_eq!(stepper.snapshot().target, -1);
    assert_eq!(log.step_count(), steps_before);

    stepper.move_to(1);
    assert_eq!(stepper.wait().unwrap(), 1);
    stepper.stop().unwrap();
}

#[test]
fn test_reversed_motion_flips_physical_direction() {
    let (stepper, log) = started(fast_config());
    stepper.set_reversed(true);
    stepper.set_stepping_style(SteppingStyle::Interleave);
    stepper.move_to(10);
    assert_eq!(stepper.wait().unwrap(), 10);

    assert_eq!(log.steps_in(Direction::Backward), 10);
    assert_eq!(log.physical_position(), -10);
    assert!(log.records().iter().all(|r| match r {
        StepRecord::Step { style, .. } => *style == SteppingStyle::Interleave,
        StepRecord::Release => true,
    }));
    assert!(stepper.snapshot().reversed);
}

#[test]
fn test_motion_report_follows_motion_start_quickly() {
    let (stepper, _log) = started(MotionConfig {
        idle_report_interval: Duration::from_secs(5),
        motion_report_interval: Duration::from_millis(100),
        step_delay: Duration::from_millis(5),
        ..MotionConfig::default()
    });
    let reports = record_reports(&stepper);
    thread::sleep(Duration::from_millis(50));

    let issued = Instant::now();
    stepper.move_to(200);

    let deadline = issued + Duration::from_secs(2);
    let first_in_motion = loop {
        if let Some(&(at, target, actual)) = reports.lock().first() {
            break (at, target, actual);
        }
        assert!(Instant::now() < deadline, "no report after motion started");
        thread::sleep(Duration::from_millis(5));
    };

    let (at, target, actual) = first_in_motion;
    assert_eq!(target, 200);
    assert!(actual < 200);
    assert!(at.duration_since(issued) < Duration::from_secs(1));

    stepper.halt();
    stepper.wait().unwrap();
}

#[test]
fn test_final_report_on_rest() {
    let (stepper, _log) = started(MotionConfig {
        idle_report_interval: Duration::from_secs(5),
        motion_report_interval: Duration::from_secs(5),
        ..MotionConfig::default()
    });
    let reports = record_reports(&stepper);
    stepper.move_to(12);
    stepper.wait().unwrap();

    let reports = reports.lock();
    let &(_, target, actual) = reports.last().unwrap();
    assert_eq!((target, actual), (12, 12));
}

#[test]
fn test_interval_change_reports_immediately() {
    let (stepper, _log) = started(MotionConfig {
        idle_report_interval: Duration::from_secs(5),
        ..fast_config()
    });
    let reports = record_reports(&stepper);
    stepper.set_idle_interval(Duration::from_secs(10));

    let deadline = Instant::now() + Duration::from_secs(2);
    while reports.lock().is_empty() {
        assert!(Instant::now() < deadline, "interval change produced no report");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_observer_failure_is_contained() {
    let (stepper, _log) = started(fast_config());
    stepper.observe(|_: Position, _: Position| -> Result<(), ObserverError> {
        Err("broker offline".into())
    });

    stepper.move_to(20);
    assert_eq!(stepper.wait().unwrap(), 20);
    stepper.move_to(0);
    assert_eq!(stepper.wait().unwrap(), 0);
    assert!(stepper.metrics().snapshot().observer_failures >= 2);
    assert!(stepper.is_running());
}

#[test]
fn test_observer_panic_is_contained() {
    let (stepper, _log) = started(fast_config());
    stepper.observe(|_: Position, actual: Position| -> Result<(), ObserverError> {
        if actual > 0 {
            panic!("observer bug");
        }
        Ok(())
    });

    stepper.move_to(5);
    assert_eq!(stepper.wait().unwrap(), 5);
    stepper.clear_observer();
    stepper.move_to(9);
    assert_eq!(stepper.wait().unwrap(), 9);
    stepper.stop().unwrap();
}

#[test]
fn test_actuator_step_failures_do_not_stop_loop() {
    let (stepper, log) = started(fast_config());
    log.inject_step_failures(3);

    stepper.move_to(5);
    assert_eq!(stepper.wait().unwrap(), 5);
    assert_eq!(log.step_count(), 5);
    assert_eq!(stepper.metrics().snapshot().actuator_failures, 3);
}

/// 可注入 release 故障的执行器
struct FlakyReleaseActuator {
    fail_release: Arc<AtomicBool>,
    releases: Arc<AtomicU64>,
}

impl Actuator for FlakyReleaseActuator {
    fn step(&mut self, _: Direction, _: SteppingStyle) -> Result<(), ActuatorError> {
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        self.releases.fetch_add(1, Ordering::Relaxed);
        if self.fail_release.load(Ordering::Relaxed) {
            return Err(ActuatorError::new(ActuatorErrorKind::Bus, "i2c nack"));
        }
        Ok(())
    }
}

#[test]
fn test_release_failure_is_logged_and_retried_at_rest() {
    let fail_release = Arc::new(AtomicBool::new(true));
    let releases = Arc::new(AtomicU64::new(0));
    let actuator = FlakyReleaseActuator {
        fail_release: fail_release.clone(),
        releases: releases.clone(),
    };
    let stepper = AsyncStepper::new(actuator, fast_config()).unwrap();
    stepper.start().unwrap();

    stepper.move_to(3);
    assert_eq!(stepper.wait().unwrap(), 3);
    // 终点步断电失败后，Moving → Idle 再尝试一次
    assert_eq!(releases.load(Ordering::Relaxed), 2);

    fail_release.store(false, Ordering::Relaxed);
    stepper.stop().unwrap();
    assert_eq!(releases.load(Ordering::Relaxed), 3);
}

#[test]
fn test_multiple_waiters() {
    let (stepper, _log) = started(MotionConfig {
        step_delay: Duration::from_millis(1),
        ..fast_config()
    });
    let stepper = Arc::new(stepper);
    stepper.move_to(60);

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let stepper = stepper.clone();
            thread::spawn(move || stepper.wait())
        })
        .collect();

    for waiter in waiters {
        assert_eq!(waiter.join().unwrap().unwrap(), 60);
    }
}

#[test]
fn test_wait_never_returns_in_flight_position() {
    let (stepper, _log) = started(MotionConfig {
        step_delay: Duration::from_millis(1),
        ..fast_config()
    });
    let stepper = Arc::new(stepper);
    stepper.move_to(30);

    let waiter = {
        let stepper = stepper.clone();
        thread::spawn(move || stepper.wait())
    };
    thread::sleep(Duration::from_millis(5));
    stepper.move_to(50);

    let rest = waiter.join().unwrap().unwrap();
    assert!(rest == 30 || rest == 50, "returned in-flight position {}", rest);
    assert_eq!(stepper.wait().unwrap(), 50);
}

#[test]
fn test_wait_timeout() {
    let (stepper, _log) = started(MotionConfig {
        step_delay: Duration::from_millis(5),
        ..fast_config()
    });
    stepper.move_to(10_000);

    let begin = Instant::now();
    assert!(matches!(
        stepper.wait_timeout(Duration::from_millis(50)),
        Err(DriverError::Timeout)
    ));
    assert!(begin.elapsed() < Duration::from_secs(2));

    stepper.halt();
    let rest = stepper.wait_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(stepper.snapshot().current, rest);
}

#[test]
fn test_stop_releases_waiters_and_actuator() {
    let (stepper, log) = started(MotionConfig {
        step_delay: Duration::from_millis(5),
        ..fast_config()
    });
    let stepper = Arc::new(stepper);
    stepper.move_to(10_000);

    let waiter = {
        let stepper = stepper.clone();
        thread::spawn(move || stepper.wait())
    };
    thread::sleep(Duration::from_millis(50));
    stepper.stop().unwrap();

    assert!(matches!(waiter.join().unwrap(), Err(DriverError::NotRunning)));
    assert!(!log.is_energized());
    assert_eq!(log.last(), Some(StepRecord::Release));

    // 重启后继续未完成的运动
    stepper.set_step_delay(Duration::ZERO);
    stepper.start().unwrap();
    assert_eq!(stepper.wait().unwrap(), 10_000);
}

#[test]
fn test_drop_stops_running_controller() {
    let actuator = SimulatedStepper::new();
    let log = actuator.log();
    {
        let stepper = AsyncStepper::new(actuator, fast_config()).unwrap();
        stepper.start().unwrap();
        stepper.move_to(3);
        stepper.wait().unwrap();
    }
    // 退出时无条件断电
    assert_eq!(log.last(), Some(StepRecord::Release));
    assert!(log.release_count() >= 2);
}
