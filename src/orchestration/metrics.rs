//! 步骤指标：耗时与 token 用量
//!
//! Step Loop 只有一个实现，是否计量由注入的 StepMetrics 决定（默认 NoopMetrics）。

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::TaskPhase;

/// 累计用量快照：(prompt, completion, total, requests)
pub type UsageSnapshot = (u64, u64, u64, u64);

pub trait StepMetrics: Send {
    fn task_started(&mut self, _usage: UsageSnapshot) {}
    fn step_started(&mut self, _step: usize, _usage: UsageSnapshot) {}
    fn step_finished(&mut self, _step: usize, _succeeded: bool, _usage: UsageSnapshot) {}
    fn task_finished(&mut self, _phase: TaskPhase, _usage: UsageSnapshot) {}
}

/// 不计量
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl StepMetrics for NoopMetrics {}

/// 单步记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: usize,
    pub succeeded: bool,
    pub duration_ms: u128,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// 全程汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub phase: TaskPhase,
    pub duration_ms: u128,
    pub api_calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// 记录每步耗时与 token 增量，任务结束时输出汇总
#[derive(Debug, Default)]
pub struct TimingMetrics {
    task_start: Option<(Instant, UsageSnapshot)>,
    step_start: Option<(Instant, UsageSnapshot)>,
    steps: Vec<StepRecord>,
    summary: Option<RunSummary>,
}

impl TimingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }
}

fn delta(now: UsageSnapshot, before: UsageSnapshot) -> UsageSnapshot {
    (
        now.0.saturating_sub(before.0),
        now.1.saturating_sub(before.1),
        now.2.saturating_sub(before.2),
        now.3.saturating_sub(before.3),
    )
}

impl StepMetrics for TimingMetrics {
    fn task_started(&mut self, usage: UsageSnapshot) {
        self.task_start = Some((Instant::now(), usage));
    }

    fn step_started(&mut self, _step: usize, usage: UsageSnapshot) {
        self.step_start = Some((Instant::now(), usage));
    }

    fn step_finished(&mut self, step: usize, succeeded: bool, usage: UsageSnapshot) {
        let Some((started, before)) = self.step_start.take() else {
            return;
        };
        let elapsed = started.elapsed();
        let (p, c, t, _) = delta(usage, before);
        tracing::info!(
            step,
            duration_ms = elapsed.as_millis() as u64,
            prompt_tokens = p,
            completion_tokens = c,
            total_tokens = t,
            "step metrics"
        );
        self.steps.push(StepRecord {
            step,
            succeeded,
            duration_ms: elapsed.as_millis(),
            prompt_tokens: p,
            completion_tokens: c,
            total_tokens: t,
        });
    }

    fn task_finished(&mut self, phase: TaskPhase, usage: UsageSnapshot) {
        let (elapsed, before) = self
            .task_start
            .map(|(start, before)| (start.elapsed(), before))
            .unwrap_or((Duration::ZERO, (0, 0, 0, 0)));
        let (p, c, t, calls) = delta(usage, before);
        let summary = RunSummary {
            phase,
            duration_ms: elapsed.as_millis(),
            api_calls: calls,
            prompt_tokens: p,
            completion_tokens: c,
            total_tokens: t,
        };
        tracing::info!(
            phase = ?phase,
            duration_secs = format!("{:.2}", elapsed.as_secs_f64()).as_str(),
            api_calls = calls,
            prompt_tokens = p,
            completion_tokens = c,
            total_tokens = t,
            "run totals"
        );
        self.summary = Some(summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_deltas() {
        let mut m = TimingMetrics::new();
        m.task_started((10, 5, 15, 1));
        m.step_started(0, (10, 5, 15, 1));
        m.step_finished(0, true, (30, 9, 39, 3));
        m.step_started(1, (30, 9, 39, 3));
        m.step_finished(1, false, (30, 9, 39, 4));
        m.task_finished(TaskPhase::FailedMaxSteps, (30, 9, 39, 4));

        let steps = m.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!((steps[0].prompt_tokens, steps[0].completion_tokens, steps[0].total_tokens), (20, 4, 24));
        assert!(!steps[1].succeeded);
        assert_eq!(steps[1].total_tokens, 0);

        let summary = m.summary().unwrap();
        assert_eq!(summary.api_calls, 3);
        assert_eq!(summary.total_tokens, 24);
        assert_eq!(summary.phase, TaskPhase::FailedMaxSteps);
    }

    #[test]
    fn test_finish_without_start_is_ignored() {
        let mut m = TimingMetrics::new();
        m.step_finished(0, true, (1, 1, 2, 1));
        assert!(m.steps().is_empty());
    }
}
