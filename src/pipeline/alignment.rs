//! Delay-compensated output alignment for file mode.
//!
//! The engine output lags its input by `delay` samples, so the enhanced copy
//! of input sample `i` appears at stream position `i + delay`. Output position
//! `p` of the frame processed at `start` is written only when
//! `delay <= start + p < total + delay`. Summed over all frames this writes
//! every input sample exactly once, in order, whatever the relation between
//! `delay` and the frame length.

/// Slice of one enhanced frame that belongs in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputWindow {
    pub offset: usize,
    pub length: usize,
}

impl OutputWindow {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.length
    }
}

/// Fixed geometry of one file-mode stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    pub frame_length: usize,
    pub total_samples: u64,
    pub delay_samples: u64,
}

impl Timeline {
    pub fn new(frame_length: usize, total_samples: u64, delay_samples: u64) -> Self {
        Self {
            frame_length,
            total_samples,
            delay_samples,
        }
    }

    /// First stream position past the last real output sample.
    pub fn end(&self) -> u64 {
        self.total_samples + self.delay_samples
    }

    /// Whether a frame starting at `start` still has to be processed.
    pub fn needs_frame(&self, start: u64) -> bool {
        start < self.end()
    }

    /// Number of frames the whole stream takes, warm-up and drain included.
    pub fn frame_count(&self) -> u64 {
        let frame = self.frame_length as u64;
        if frame == 0 {
            return 0;
        }
        self.end().div_ceil(frame)
    }

    /// Part of the frame processed at `start` to write, `None` when nothing
    /// in it is real output (warm-up, or past the end).
    pub fn window(&self, start: u64) -> Option<OutputWindow> {
        let end = start + self.frame_length as u64;
        let first = start.max(self.delay_samples);
        let last = end.min(self.end());
        if first >= last {
            return None;
        }
        Some(OutputWindow {
            offset: (first - start) as usize,
            length: (last - first) as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows(timeline: &Timeline) -> Vec<Option<OutputWindow>> {
        let mut out = Vec::new();
        let mut start = 0;
        while timeline.needs_frame(start) {
            out.push(timeline.window(start));
            start += timeline.frame_length as u64;
        }
        out
    }

    fn win(offset: usize, length: usize) -> Option<OutputWindow> {
        Some(OutputWindow { offset, length })
    }

    #[test]
    fn delay_not_multiple_of_frame() {
        let timeline = Timeline::new(512, 5 * 512 + 7, 515);
        let got = windows(&timeline);
        assert_eq!(
            got,
            vec![
                None,
                win(3, 509),
                win(0, 512),
                win(0, 512),
                win(0, 512),
                win(0, 512),
                win(0, 10),
            ]
        );
        assert_eq!(timeline.frame_count(), got.len() as u64);
        let written: usize = got.iter().flatten().map(|w| w.length).sum();
        assert_eq!(written, 2567);
    }

    #[test]
    fn zero_delay_writes_full_frames() {
        let timeline = Timeline::new(4, 10, 0);
        assert_eq!(windows(&timeline), vec![win(0, 4), win(0, 4), win(0, 2)]);
    }

    #[test]
    fn empty_input_needs_no_frames() {
        let timeline = Timeline::new(512, 0, 0);
        assert!(!timeline.needs_frame(0));
        assert_eq!(timeline.frame_count(), 0);
    }

    #[test]
    fn empty_input_with_delay_writes_nothing() {
        let timeline = Timeline::new(4, 0, 6);
        let got = windows(&timeline);
        assert_eq!(got, vec![None, None]);
    }

    #[test]
    fn short_input_inside_single_frame_trims_both_ends() {
        // start 0..8, real output lives at 3..5
        let timeline = Timeline::new(8, 2, 3);
        assert_eq!(windows(&timeline), vec![win(3, 2)]);
    }

    #[test]
    fn delay_spanning_several_frames() {
        let timeline = Timeline::new(4, 5, 9);
        assert_eq!(
            windows(&timeline),
            vec![None, None, win(1, 3), win(0, 2)]
        );
    }

    #[test]
    fn total_written_matches_input_for_all_geometries() {
        for frame_length in [1usize, 3, 16] {
            for delay in 0..=(3 * frame_length as u64) {
                for total in 0..40u64 {
                    let timeline = Timeline::new(frame_length, total, delay);
                    let written: u64 = windows(&timeline)
                        .iter()
                        .flatten()
                        .map(|w| w.length as u64)
                        .sum();
                    assert_eq!(written, total, "L={frame_length} d={delay} n={total}");
                }
            }
        }
    }
}
