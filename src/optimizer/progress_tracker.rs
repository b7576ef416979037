//! # Progress Tracking Module
//!
//! Turns ffmpeg's `-progress` stream into per-file and whole-batch completion,
//! measured in seconds of source video.
//!
//! ffmpeg emits blocks of `key=value` lines; only the cumulative output time
//! (`out_time_us`, or its misnamed twin `out_time_ms`, both in microseconds)
//! is read. Anything else, including `N/A` values and garbage, is ignored.

/// Aggregates encode progress across a sequential batch
#[derive(Debug, Clone, Default)]
pub struct ProgressAggregator {
    overall_total: f64,
    finished_seconds: f64,
    current_file_seconds: f64,
    current_file_duration: f64,
}

impl ProgressAggregator {
    /// `durations` are the source durations of every file in the batch
    pub fn new<I>(durations: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        Self {
            overall_total: durations.into_iter().sum(),
            ..Self::default()
        }
    }

    /// Start tracking a new file
    pub fn begin_file(&mut self, duration: f64) {
        self.current_file_seconds = 0.0;
        self.current_file_duration = duration.max(0.0);
    }

    /// Feed one adapter output line, returning the new per-file position when
    /// the line carried a usable progress value
    pub fn consume_line(&mut self, line: &str) -> Option<f64> {
        let seconds = parse_out_time(line)?;
        let clamped = seconds.min(self.current_file_duration);
        if clamped > self.current_file_seconds {
            self.current_file_seconds = clamped;
        }
        Some(self.current_file_seconds)
    }

    /// Close the current file, whatever its outcome
    pub fn finish_file(&mut self) {
        self.finished_seconds += self.current_file_duration;
        self.current_file_seconds = 0.0;
        self.current_file_duration = 0.0;
    }

    pub fn current_file_seconds(&self) -> f64 {
        self.current_file_seconds
    }

    pub fn overall_seconds(&self) -> f64 {
        self.finished_seconds + self.current_file_seconds
    }

    pub fn overall_total(&self) -> f64 {
        self.overall_total
    }
}

/// Seconds encoded so far, from an `out_time_us=` / `out_time_ms=` line
pub fn parse_out_time(line: &str) -> Option<f64> {
    let (key, value) = line.trim().split_once('=')?;
    match key.trim() {
        "out_time_us" | "out_time_ms" => {
            let micros = value.trim().parse::<i64>().ok()?;
            (micros >= 0).then(|| micros as f64 / 1_000_000.0)
        }
        _ => None,
    }
}
