//! 命令解析
//!
//! Shell 与脚本共用同一套命令词汇，每行一条命令，`#` 之后为注释。

use blind_driver::SteppingStyle;
use std::time::Duration;
use thiserror::Error;

/// 帮助文本
pub const HELP: &str = "\
Calibration:
  wind N            wind N steps (N * step-size)
  counter-wind N    counter-wind N steps
  set-opened        record the current position as fully opened
  set-closed        record the current position as fully closed
  step-size N       motor units per calibration step
  polarity top|bottom
                    100% means fully opened (top) or fully closed (bottom)
  speed F           motion speed factor, 0.1 (slow) to 1.0 (fast)

Control:
  open | close      move to the opened / closed point
  go-to PCT         move to a percentage between the calibration points
  stop              halt in place

Motor:
  style single|double|interleave|microstep
  reverse on|off    invert the logical direction
  mark LABEL        remember the current position
  goto LABEL        move to a remembered position

Session:
  wait              block until the blind is at rest
  status            print position and calibration
  sleep MS          pause the session
  help              show this text
  quit              leave";

/// 窗帘命令
#[derive(Debug, Clone, PartialEq)]
pub enum BlindCommand {
    Wind(u32),
    CounterWind(u32),
    SetOpened,
    SetClosed,
    Open,
    Close,
    GoTo(f64),
    Stop,
    StepSize(u32),
    /// `true`: 100% = 完全打开
    Polarity(bool),
    Speed(f64),
    Style(SteppingStyle),
    Reverse(bool),
    Mark(String),
    Goto(String),
    Wait,
    Status,
    Sleep(Duration),
    Help,
    Quit,
}

/// 命令解析错误
#[derive(Error, Debug, PartialEq)]
pub enum ScriptError {
    #[error("Unknown command '{0}' (try 'help')")]
    UnknownCommand(String),

    #[error("'{command}' expects {expected}")]
    MissingArgument {
        command: String,
        expected: &'static str,
    },

    #[error("'{command}': invalid argument '{value}' (expected {expected})")]
    InvalidArgument {
        command: String,
        value: String,
        expected: &'static str,
    },

    #[error("'{0}' takes no further arguments")]
    UnexpectedArgument(String),
}

/// 解析一行，空行与纯注释返回 `None`
pub fn parse_line(line: &str) -> Result<Option<BlindCommand>, ScriptError> {
    let line = match line.find('#') {
        Some(index) => &line[..index],
        None => line,
    };
    let mut words = line.split_whitespace();
    let Some(keyword) = words.next() else {
        return Ok(None);
    };
    let argument = words.next();
    if words.next().is_some() {
        return Err(ScriptError::UnexpectedArgument(keyword.to_string()));
    }

    let command = match keyword {
        "wind" => BlindCommand::Wind(number(keyword, argument, "a step count")?),
        "counter-wind" => BlindCommand::CounterWind(number(keyword, argument, "a step count")?),
        "set-opened" => no_argument(keyword, argument, BlindCommand::SetOpened)?,
        "set-closed" => no_argument(keyword, argument, BlindCommand::SetClosed)?,
        "open" => no_argument(keyword, argument, BlindCommand::Open)?,
        "close" => no_argument(keyword, argument, BlindCommand::Close)?,
        "go-to" => BlindCommand::GoTo(number(keyword, argument, "a percentage")?),
        "stop" => no_argument(keyword, argument, BlindCommand::Stop)?,
        "step-size" => BlindCommand::StepSize(number(keyword, argument, "a positive step size")?),
        "polarity" => match required(keyword, argument, "top or bottom")? {
            "top" => BlindCommand::Polarity(true),
            "bottom" => BlindCommand::Polarity(false),
            other => return Err(invalid(keyword, other, "top or bottom")),
        },
        "speed" => BlindCommand::Speed(number(keyword, argument, "a factor from 0.1 to 1.0")?),
        "style" => {
            const EXPECTED: &str = "single, double, interleave or microstep";
            let value = required(keyword, argument, EXPECTED)?;
            let style = value
                .parse::<SteppingStyle>()
                .map_err(|_| invalid(keyword, value, EXPECTED))?;
            BlindCommand::Style(style)
        },
        "reverse" => match required(keyword, argument, "on or off")? {
            "on" => BlindCommand::Reverse(true),
            "off" => BlindCommand::Reverse(false),
            other => return Err(invalid(keyword, other, "on or off")),
        },
        "mark" => BlindCommand::Mark(required(keyword, argument, "a label")?.to_string()),
        "goto" => BlindCommand::Goto(required(keyword, argument, "a label")?.to_string()),
        "wait" => no_argument(keyword, argument, BlindCommand::Wait)?,
        "status" => no_argument(keyword, argument, BlindCommand::Status)?,
        "sleep" => BlindCommand::Sleep(Duration::from_millis(number(
            keyword,
            argument,
            "milliseconds",
        )?)),
        "help" => no_argument(keyword, argument, BlindCommand::Help)?,
        "quit" | "exit" => no_argument(keyword, argument, BlindCommand::Quit)?,
        other => return Err(ScriptError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

fn required<'a>(
    command: &str,
    argument: Option<&'a str>,
    expected: &'static str,
) -> Result<&'a str, ScriptError> {
    argument.ok_or_else(|| ScriptError::MissingArgument {
        command: command.to_string(),
        expected,
    })
}

fn number<T: std::str::FromStr>(
    command: &str,
    argument: Option<&str>,
    expected: &'static str,
) -> Result<T, ScriptError> {
    let value = required(command, argument, expected)?;
    value.parse().map_err(|_| invalid(command, value, expected))
}

fn no_argument(
    command: &str,
    argument: Option<&str>,
    parsed: BlindCommand,
) -> Result<BlindCommand, ScriptError> {
    match argument {
        Some(_) => Err(ScriptError::UnexpectedArgument(command.to_string())),
        None => Ok(parsed),
    }
}

fn invalid(command: &str, value: &str, expected: &'static str) -> ScriptError {
    ScriptError::InvalidArgument {
        command: command.to_string(),
        value: value.to_string(),
        expected,
    }
}
