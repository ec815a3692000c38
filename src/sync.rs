//! Playback timing: frame-rate derivation, cross-stream frame matching and
//! ECG-driven frame selection.
//!
//! Streams advance on independent time bases. Secondary streams are never
//! matched to the reference stream by index; the frame whose time is nearest
//! to the reference frame time is used instead.

use log::debug;

use crate::error::RejectReason;
use crate::error::TimingIssue;
use crate::error::ViewerError;

/// Lowest and highest user-selectable playback rate.
pub const MIN_FRAME_RATE: f64 = 1.0;
pub const MAX_FRAME_RATE: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Playback {
    /// Frames are animated at `frame_rate` Hz, one loop lasting `loop_duration` seconds.
    Animated { frame_rate: f64, loop_duration: f64 },
    /// Only the first frame is displayed.
    Still,
}

/// Frame times of the reference stream and the playback derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTimeline {
    frame_count: usize,
    times: Vec<f64>,
    playback: Playback,
    issue: Option<TimingIssue>,
}

impl FrameTimeline {
    /// Build a timeline from a stream's frame count and frame-time array.
    ///
    /// Inconsistent timing never fails the load: the timeline degrades to
    /// [`Playback::Still`] and the problem is kept in [`FrameTimeline::issue`].
    pub fn new(frame_count: usize, times: Vec<f64>) -> Result<Self, ViewerError> {
        if frame_count < 1 {
            return Err(RejectReason::NoFrames.into());
        }

        let (playback, issue) = if frame_count != times.len() {
            (
                Playback::Still,
                Some(TimingIssue::CountMismatch {
                    frame_count,
                    times: times.len(),
                }),
            )
        } else if frame_count == 1 {
            (Playback::Still, None)
        } else {
            let interval = times[1] - times[0];
            if interval > 0.0 {
                (
                    Playback::Animated {
                        frame_rate: 1.0 / interval,
                        loop_duration: interval * frame_count as f64,
                    },
                    None,
                )
            } else {
                (
                    Playback::Still,
                    Some(TimingIssue::NonIncreasing {
                        first: times[0],
                        second: times[1],
                    }),
                )
            }
        };

        Ok(Self {
            frame_count,
            times,
            playback,
            issue,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn playback(&self) -> Playback {
        self.playback
    }

    pub fn issue(&self) -> Option<&TimingIssue> {
        self.issue.as_ref()
    }

    pub fn is_animated(&self) -> bool {
        matches!(self.playback, Playback::Animated { .. })
    }

    pub fn frame_rate(&self) -> Option<f64> {
        match self.playback {
            Playback::Animated { frame_rate, .. } => Some(frame_rate),
            Playback::Still => None,
        }
    }

    pub fn loop_duration(&self) -> Option<f64> {
        match self.playback {
            Playback::Animated { loop_duration, .. } => Some(loop_duration),
            Playback::Still => None,
        }
    }

    /// Number of frames playback may visit.
    pub fn usable_frames(&self) -> usize {
        if self.is_animated() { self.frame_count } else { 1 }
    }

    /// Clamp a requested position to a usable frame index.
    pub fn clamp(&self, index: usize) -> usize {
        index.min(self.usable_frames() - 1)
    }

    pub fn time_of(&self, index: usize) -> Option<f64> {
        self.times.get(index).copied()
    }

    /// Override the derived playback rate. Ignored for still timelines.
    pub fn set_frame_rate(&mut self, frame_rate: f64) -> Result<(), ViewerError> {
        if !(MIN_FRAME_RATE..=MAX_FRAME_RATE).contains(&frame_rate) {
            return Err(TimingIssue::RateOutOfRange {
                rate: frame_rate,
                min: MIN_FRAME_RATE,
                max: MAX_FRAME_RATE,
            }
            .into());
        }
        if let Playback::Animated { .. } = self.playback {
            self.playback = Playback::Animated {
                frame_rate,
                loop_duration: self.frame_count as f64 / frame_rate,
            };
        }
        Ok(())
    }
}

/// Index of the time nearest to `target`; ties go to the first occurrence.
pub fn nearest_time_index(times: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &t) in times.iter().enumerate() {
        let distance = (t - target).abs();
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((i, distance)),
        }
    }
    best.map(|(i, _)| i)
}

/// Frame index chosen for every stream at one playback position.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSelection {
    pub reference: usize,
    /// One entry per secondary stream, `None` if that stream has no frames.
    pub secondary: Vec<Option<usize>>,
}

/// Maps a playback position on the reference stream to frame indices of all
/// streams.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSynchronizer {
    reference: FrameTimeline,
    secondaries: Vec<Vec<f64>>,
}

impl FrameSynchronizer {
    pub fn new(reference: FrameTimeline) -> Self {
        Self {
            reference,
            secondaries: Vec::new(),
        }
    }

    /// Register a secondary stream by its frame times, returning its slot.
    pub fn add_secondary(&mut self, times: Vec<f64>) -> usize {
        self.secondaries.push(times);
        self.secondaries.len() - 1
    }

    pub fn reference(&self) -> &FrameTimeline {
        &self.reference
    }

    pub fn reference_mut(&mut self) -> &mut FrameTimeline {
        &mut self.reference
    }

    pub fn resolve(&self, reference_index: usize) -> FrameSelection {
        let reference = self.reference.clamp(reference_index);
        let target = self.reference.time_of(reference);

        let secondary = self
            .secondaries
            .iter()
            .map(|times| match target {
                Some(t) => nearest_time_index(times, t),
                // no reference time to match against
                None => (!times.is_empty()).then(|| reference.min(times.len() - 1)),
            })
            .collect();

        FrameSelection {
            reference,
            secondary,
        }
    }
}

/// Drives the reference frame from an ECG sample position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcgGate {
    frame_count: usize,
    sample_count: usize,
}

impl EcgGate {
    pub fn new(frame_count: usize, sample_count: usize) -> Option<Self> {
        if frame_count == 0 || sample_count == 0 {
            return None;
        }
        Some(Self {
            frame_count,
            sample_count,
        })
    }

    /// `floor(frame_count * sample / sample_count)`, with the sample clamped
    /// to the trace.
    pub fn frame_for_sample(&self, sample_index: usize) -> usize {
        let sample = sample_index.min(self.sample_count - 1);
        self.frame_count.saturating_mul(sample) / self.sample_count
    }

    /// Frame to show for `sample_index`, or `None` when it is the frame
    /// `shown` already and no redraw is needed.
    pub fn advance(&self, sample_index: usize, shown: Option<usize>) -> Option<usize> {
        let frame = self.frame_for_sample(sample_index);
        if shown == Some(frame) {
            return None;
        }
        debug!("ECG sample {sample_index} -> frame {frame}");
        Some(frame)
    }
}
