//! 校准与百分比换算
//!
//! 电机位置是任意单位的整数，客户端使用“打开点与关闭点之间的百分比”。
//! 100% 表示完全打开还是完全关闭由 `open_is_100` 决定：
//!
//! ```text
//! max = open_is_100 ? opened : closed
//! min = open_is_100 ? closed : opened
//! position   = trunc(min + (max - min) * pct / 100)
//! percentage = (position - min) / (max - min) * 100
//! ```

use blind_driver::Position;

use crate::error::{BlindError, CalibrationPoint};

/// 校准数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub opened: Option<Position>,
    pub closed: Option<Position>,
    /// `true`: 100% = 完全打开；`false`: 100% = 完全关闭
    pub open_is_100: bool,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            opened: None,
            closed: None,
            open_is_100: true,
        }
    }
}

impl Calibration {
    pub fn new(opened: Position, closed: Position, open_is_100: bool) -> Self {
        Self {
            opened: Some(opened),
            closed: Some(closed),
            open_is_100,
        }
    }

    /// 两个校准点都已设置
    pub fn is_complete(&self) -> bool {
        self.opened.is_some() && self.closed.is_some()
    }

    pub fn opened(&self) -> Result<Position, BlindError> {
        self.opened
            .ok_or(BlindError::NotCalibrated(CalibrationPoint::Opened))
    }

    pub fn closed(&self) -> Result<Position, BlindError> {
        self.closed
            .ok_or(BlindError::NotCalibrated(CalibrationPoint::Closed))
    }

    /// `(min, max)`，即 0% 与 100% 对应的位置
    fn bounds(&self) -> Result<(Position, Position), BlindError> {
        let opened = self.opened()?;
        let closed = self.closed()?;
        if opened == closed {
            return Err(BlindError::DegenerateCalibration);
        }
        let (min, max) = if self.open_is_100 {
            (closed, opened)
        } else {
            (opened, closed)
        };
        if max.checked_sub(min).is_none() {
            return Err(BlindError::CalibrationOutOfRange { min, max });
        }
        Ok((min, max))
    }

    /// 百分比 → 电机位置（向零截断）
    pub fn position_for(&self, percentage: f64) -> Result<Position, BlindError> {
        let (min, max) = self.bounds()?;
        if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
            return Err(BlindError::InvalidPercentage(percentage));
        }
        let span = (max - min) as f64;
        Ok((min as f64 + span * percentage / 100.0).trunc() as Position)
    }

    /// 电机位置 → 百分比（不截断到 [0, 100]，越界位置得到越界百分比）
    pub fn percentage_for(&self, position: Position) -> Result<f64, BlindError> {
        let (min, max) = self.bounds()?;
        let offset = i128::from(position) - i128::from(min);
        Ok(offset as f64 / (max - min) as f64 * 100.0)
    }
}
