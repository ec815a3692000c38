use crate::error::ViewerError;

/// ECG trace accompanying a volume recording.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EcgSeries {
    /// Amplitude per sample
    pub samples: Vec<f32>,
    /// Seconds between samples
    pub delta_time: f64,
    /// Time of the first sample
    pub start_time: f64,
    /// Trigger marks (R-wave times)
    pub trig_times: Vec<f64>,
}

impl EcgSeries {
    /// Accept the series only if it can be drawn: non-empty and `delta_time > 0`.
    pub fn into_usable(self) -> Result<Self, ViewerError> {
        if self.samples.is_empty() {
            return Err(ViewerError::SecondaryChannelUnavailable(
                "ECG has no samples".into(),
            ));
        }
        if !(self.delta_time > 0.0) {
            return Err(ViewerError::SecondaryChannelUnavailable(format!(
                "ECG sample interval {} is not positive",
                self.delta_time
            )));
        }
        Ok(self)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Total trace duration in seconds.
    pub fn duration(&self) -> f64 {
        self.delta_time * self.samples.len() as f64
    }

    /// Smallest and largest amplitude.
    pub fn amplitude_range(&self) -> Option<(f32, f32)> {
        let first = *self.samples.first()?;
        Some(
            self.samples
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }

    /// Index of the sample covering `time`, if inside the trace.
    pub fn sample_index_at(&self, time: f64) -> Option<usize> {
        let offset = (time - self.start_time) / self.delta_time;
        if !(offset >= 0.0) {
            return None;
        }
        let index = offset.floor() as usize;
        (index < self.samples.len()).then_some(index)
    }

    /// Horizontal position of `time` as a fraction of the trace width.
    pub fn cursor_fraction(&self, time: f64) -> f64 {
        (time - self.start_time) / self.duration()
    }

    /// Polyline of the trace scaled into a `width` x `height` box, y pointing down.
    pub fn trace_points(&self, width: f32, height: f32) -> Vec<(f32, f32)> {
        let Some((lo, hi)) = self.amplitude_range() else {
            return Vec::new();
        };
        let span = if hi > lo { hi - lo } else { 1.0 };
        let pitch = width / self.samples.len() as f32;
        let offset = height * hi / span;
        let scale = -height / span;

        self.samples
            .iter()
            .enumerate()
            .map(|(i, &v)| (pitch * i as f32, offset + scale * v))
            .collect()
    }
}
