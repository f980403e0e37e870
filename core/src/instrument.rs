//! Optional instrumentation around `Classifier::infer`.
//!
//! Timing and reporting are injected by the caller: a [`Clock`] reads a tick
//! counter (cycle counter, RTC, `Instant` on a host) and a [`ReportSink`]
//! receives one [`InferenceReport`] per sample. The engine behaves the same
//! with [`NoClock`] and [`NoSink`].

use crate::error::EngineResult;
use crate::model::Classifier;
use crate::sample::Sample;
use crate::scratch::Scratch;

/// Outcome of one instrumented inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceReport {
    pub sample_id: u32,
    pub predicted: usize,
    pub label: u8,
    pub elapsed_ticks: u64,
}

impl InferenceReport {
    /// A misclassification is a normal outcome, not an error.
    pub fn is_correct(&self) -> bool {
        self.predicted == self.label as usize
    }
}

pub trait ReportSink {
    fn report(&mut self, report: &InferenceReport);
}

impl<F: FnMut(&InferenceReport)> ReportSink for F {
    fn report(&mut self, report: &InferenceReport) {
        self(report)
    }
}

/// Sink that drops every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSink;

impl ReportSink for NoSink {
    fn report(&mut self, _report: &InferenceReport) {}
}

/// Monotonic tick source.
pub trait Clock {
    fn now(&mut self) -> u64;
}

impl<F: FnMut() -> u64> Clock for F {
    fn now(&mut self) -> u64 {
        self()
    }
}

/// Clock that always reads zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    fn now(&mut self) -> u64 {
        0
    }
}

/// Classify one sample, time it and hand the report to `sink`.
pub fn run_sample<C, K, S>(
    classifier: &C,
    sample: &Sample<'_>,
    sample_id: u32,
    scratch: &mut Scratch<'_>,
    clock: &mut K,
    sink: &mut S,
) -> EngineResult<InferenceReport>
where
    C: Classifier + ?Sized,
    K: Clock + ?Sized,
    S: ReportSink + ?Sized,
{
    let start = clock.now();
    let predicted = classifier.infer(sample.pixels, scratch)?;
    let end = clock.now();

    let report = InferenceReport {
        sample_id,
        predicted,
        label: sample.label,
        elapsed_ticks: end.wrapping_sub(start),
    };
    log::debug!(
        "sample {}: predicted {} label {} ({} ticks) {}",
        report.sample_id,
        report.predicted,
        report.label,
        report.elapsed_ticks,
        if report.is_correct() { "PASS" } else { "FAIL" }
    );
    sink.report(&report);
    Ok(report)
}

/// Running accuracy over a validation set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evaluation {
    total: u32,
    correct: u32,
    ticks: u64,
}

impl Evaluation {
    pub const fn new() -> Self {
        Self { total: 0, correct: 0, ticks: 0 }
    }

    pub fn record(&mut self, report: &InferenceReport) {
        self.total += 1;
        self.correct += report.is_correct() as u32;
        self.ticks = self.ticks.saturating_add(report.elapsed_ticks);
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn correct(&self) -> u32 {
        self.correct
    }

    /// Mean ticks per inference, 0 before the first record.
    pub fn mean_ticks(&self) -> u64 {
        if self.total == 0 { 0 } else { self.ticks / self.total as u64 }
    }

    pub fn accuracy_percent(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f32 * 100.0 / self.total as f32
    }
}

impl ReportSink for Evaluation {
    fn report(&mut self, report: &InferenceReport) {
        self.record(report);
    }
}

/// Run every sample through `classifier`, numbering them from 1.
pub fn evaluate<C, K, S>(
    classifier: &C,
    samples: &[Sample<'_>],
    scratch: &mut Scratch<'_>,
    clock: &mut K,
    sink: &mut S,
) -> EngineResult<Evaluation>
where
    C: Classifier + ?Sized,
    K: Clock + ?Sized,
    S: ReportSink + ?Sized,
{
    let mut eval = Evaluation::new();
    for (i, sample) in samples.iter().enumerate() {
        let report = run_sample(classifier, sample, i as u32 + 1, scratch, clock, sink)?;
        eval.record(&report);
    }
    Ok(eval)
}
