//! 规划器文本 → 命令
//!
//! 两套互不相交的词汇：观察者命令与搬运机器人命令。匹配区分大小写，
//! 只做字面前缀与相等比较。

use std::fmt;

/// 观察者层命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverCommand {
    /// `ASK Kachaka to carry to <location>`
    CarryTo(String),
    /// `CALL Kachaka to <location>`
    SummonTo(String),
    /// `ASK Kachaka to undock`
    Undock,
    /// `SPEAK at ...`
    SpeakAtGoal,
    /// 其他文本，转交搬运机器人规划器
    Delegate(String),
}

const CARRY_PREFIX: &str = "ASK Kachaka to carry to";
const SUMMON_PREFIX: &str = "CALL Kachaka to";
const UNDOCK_TEXT: &str = "ASK Kachaka to undock";
const SPEAK_PREFIX: &str = "SPEAK at";

/// 前缀之后的剩余文本里取最后一个词作地名；剩余为空时无地名
fn trailing_location(rest: &str) -> Option<String> {
    rest.split_whitespace().last().map(str::to_string)
}

impl ObserverCommand {
    /// 解析观察者提议：按字面前缀依次匹配，地名取前缀之后的最后一个词
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(location) = text.strip_prefix(CARRY_PREFIX).and_then(trailing_location) {
            return ObserverCommand::CarryTo(location);
        }
        if let Some(location) = text.strip_prefix(SUMMON_PREFIX).and_then(trailing_location) {
            return ObserverCommand::SummonTo(location);
        }
        if text == UNDOCK_TEXT {
            return ObserverCommand::Undock;
        }
        if is_speak_at_goal(text) {
            return ObserverCommand::SpeakAtGoal;
        }
        ObserverCommand::Delegate(text.to_string())
    }
}

/// 提议是否为到达播报（`SPEAK at ...`）；语音转发与完成判定共用
pub fn is_speak_at_goal(text: &str) -> bool {
    text.trim_start().starts_with(SPEAK_PREFIX)
}

/// 搬运机器人层命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CarrierCommand {
    MoveToObstacle,
    MoveObstacleToZone,
    Dock,
    Undock,
    Wait,
    /// 无法识别：不执行任何动作，视为成功
    Unrecognized(String),
}

impl CarrierCommand {
    /// 解析搬运机器人回复；去掉列表前缀 "- "
    pub fn parse(text: &str) -> Self {
        let action = normalize_carrier_text(text);
        match action {
            "MOVE to obstacle" => CarrierCommand::MoveToObstacle,
            "MOVE obstacle to zone" => CarrierCommand::MoveObstacleToZone,
            "WAIT" => CarrierCommand::Wait,
            a if a.starts_with("UNDOCK") => CarrierCommand::Undock,
            a if a.starts_with("DOCK") => CarrierCommand::Dock,
            other => CarrierCommand::Unrecognized(other.to_string()),
        }
    }
}

fn normalize_carrier_text(text: &str) -> &str {
    text.trim().trim_start_matches(['-', ' ']).trim()
}

impl fmt::Display for CarrierCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CarrierCommand::MoveToObstacle => f.write_str("MOVE to obstacle"),
            CarrierCommand::MoveObstacleToZone => f.write_str("MOVE obstacle to zone"),
            CarrierCommand::Dock => f.write_str("DOCK"),
            CarrierCommand::Undock => f.write_str("UNDOCK"),
            CarrierCommand::Wait => f.write_str("WAIT"),
            CarrierCommand::Unrecognized(text) => write!(f, "unrecognized({text})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observer_commands() {
        assert_eq!(
            ObserverCommand::parse("ASK Kachaka to carry to refrigerator_front"),
            ObserverCommand::CarryTo("refrigerator_front".into())
        );
        assert_eq!(
            ObserverCommand::parse("  CALL Kachaka to kitchen\n"),
            ObserverCommand::SummonTo("kitchen".into())
        );
        assert_eq!(
            ObserverCommand::parse("ASK Kachaka to undock"),
            ObserverCommand::Undock
        );
        assert_eq!(
            ObserverCommand::parse("SPEAK at refrigerator_front"),
            ObserverCommand::SpeakAtGoal
        );
        assert_eq!(
            ObserverCommand::parse("ASK Kachaka to carry to: refrigerator_front"),
            ObserverCommand::CarryTo("refrigerator_front".into())
        );
        assert_eq!(
            ObserverCommand::parse("CALL Kachaka to the kitchen."),
            ObserverCommand::SummonTo("kitchen.".into())
        );
        assert_eq!(
            ObserverCommand::parse("SPEAK at:refrigerator_front"),
            ObserverCommand::SpeakAtGoal
        );
        assert_eq!(ObserverCommand::parse("SPEAK at."), ObserverCommand::SpeakAtGoal);
    }

    #[test]
    fn test_speak_detection_matches_parser() {
        for text in ["SPEAK at:refrigerator_front", "SPEAK at.", "  SPEAK at kitchen"] {
            assert!(is_speak_at_goal(text));
            assert_eq!(ObserverCommand::parse(text), ObserverCommand::SpeakAtGoal);
        }
        assert!(!is_speak_at_goal("CALL Kachaka to kitchen"));
    }

    #[test]
    fn test_location_is_last_word() {
        assert_eq!(
            ObserverCommand::parse("ASK Kachaka to carry to the kitchen"),
            ObserverCommand::CarryTo("kitchen".into())
        );
    }

    #[test]
    fn test_missing_location_delegates() {
        assert_eq!(
            ObserverCommand::parse("ASK Kachaka to carry to"),
            ObserverCommand::Delegate("ASK Kachaka to carry to".into())
        );
        assert_eq!(
            ObserverCommand::parse("CALL Kachaka to"),
            ObserverCommand::Delegate("CALL Kachaka to".into())
        );
        assert_eq!(
            ObserverCommand::parse("ASK Kachaka to carry to   "),
            ObserverCommand::Delegate("ASK Kachaka to carry to".into())
        );
    }

    #[test]
    fn test_undock_is_exact() {
        assert!(matches!(
            ObserverCommand::parse("ASK Kachaka to undock now"),
            ObserverCommand::Delegate(_)
        ));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert!(matches!(
            ObserverCommand::parse("speak at kitchen"),
            ObserverCommand::Delegate(_)
        ));
        assert_eq!(CarrierCommand::parse("wait"), CarrierCommand::Unrecognized("wait".into()));
    }

    #[test]
    fn test_delegate_keeps_text() {
        let cmd = ObserverCommand::parse("Please move the obstacle away");
        assert_eq!(cmd, ObserverCommand::Delegate("Please move the obstacle away".into()));
    }

    #[test]
    fn test_carrier_commands() {
        assert_eq!(CarrierCommand::parse("MOVE to obstacle"), CarrierCommand::MoveToObstacle);
        assert_eq!(CarrierCommand::parse("MOVE obstacle to zone"), CarrierCommand::MoveObstacleToZone);
        assert_eq!(CarrierCommand::parse(" - DOCK"), CarrierCommand::Dock);
        assert_eq!(CarrierCommand::parse("DOCK with shelf"), CarrierCommand::Dock);
        assert_eq!(CarrierCommand::parse("UNDOCK"), CarrierCommand::Undock);
        assert_eq!(CarrierCommand::parse("WAIT"), CarrierCommand::Wait);
        assert_eq!(
            CarrierCommand::parse("WAIT a bit"),
            CarrierCommand::Unrecognized("WAIT a bit".into())
        );
    }

    #[test]
    fn test_vocabularies_are_disjoint() {
        for text in ["MOVE to obstacle", "DOCK", "UNDOCK", "WAIT"] {
            assert!(matches!(ObserverCommand::parse(text), ObserverCommand::Delegate(_)));
        }
        for text in [
            "ASK Kachaka to carry to kitchen",
            "CALL Kachaka to kitchen",
            "ASK Kachaka to undock",
            "SPEAK at kitchen",
        ] {
            assert!(matches!(CarrierCommand::parse(text), CarrierCommand::Unrecognized(_)));
        }
    }
}
