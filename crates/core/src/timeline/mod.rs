/// Length of the closing fade to black.
pub const FADE_DURATION_SECONDS: f32 = 2.0;

/// Frame bookkeeping for one render: how many frames to emit and how far
/// into the closing fade each one is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTimeline {
    fps: u32,
    render_duration: f32,
    frame_count: usize,
    fade_frames: usize,
}

impl RenderTimeline {
    /// `preview_seconds` caps the render duration at the audio length.
    pub fn new(audio_duration: f32, fps: u32, preview_seconds: Option<f32>) -> Self {
        let audio_duration = audio_duration.max(0.0);
        let render_duration = match preview_seconds {
            Some(seconds) => seconds.min(audio_duration),
            None => audio_duration,
        };
        let frame_count = (render_duration as f64 * fps as f64).floor() as usize;
        let fade_frames = (FADE_DURATION_SECONDS as f64 * fps as f64) as usize;
        Self {
            fps,
            render_duration,
            frame_count,
            fade_frames,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn render_duration(&self) -> f32 {
        self.render_duration
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn fade_frames(&self) -> usize {
        self.fade_frames
    }

    pub fn middle_frame(&self) -> usize {
        self.frame_count / 2
    }

    /// Fraction of the way to black for `frame_index`, or `None` outside
    /// the closing fade.
    pub fn fade_amount(&self, frame_index: usize) -> Option<f32> {
        fade_amount(frame_index, self.frame_count, self.fade_frames)
    }
}

/// `1 - frames_remaining / fade_frames` within the last `fade_frames`
/// frames of `total_frames`.
pub fn fade_amount(frame_index: usize, total_frames: usize, fade_frames: usize) -> Option<f32> {
    if fade_frames == 0 {
        return None;
    }
    let remaining = total_frames.saturating_sub(frame_index);
    (remaining <= fade_frames).then(|| 1.0 - remaining as f32 / fade_frames as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_render_covers_audio_duration() {
        let timeline = RenderTimeline::new(10.5, 30, None);
        assert_eq!(timeline.frame_count(), 315);
        assert_eq!(timeline.fade_frames(), 60);
        assert_eq!(timeline.middle_frame(), 157);
    }

    #[test]
    fn preview_is_capped_by_audio() {
        assert_eq!(RenderTimeline::new(10.0, 15, Some(4.0)).frame_count(), 60);
        let short = RenderTimeline::new(2.0, 15, Some(30.0));
        assert_eq!(short.render_duration(), 2.0);
        assert_eq!(short.frame_count(), 30);
    }

    #[test]
    fn fade_only_touches_the_tail() {
        let timeline = RenderTimeline::new(10.0, 30, None);
        assert_eq!(timeline.fade_amount(0), None);
        assert_eq!(timeline.fade_amount(239), None);
        assert_eq!(timeline.fade_amount(240), Some(0.0));

        let mut previous = 0.0;
        for index in 241..300 {
            let amount = timeline.fade_amount(index).unwrap();
            assert!(amount > previous);
            previous = amount;
        }
        assert!((timeline.fade_amount(299).unwrap() - 59.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn zero_fade_window_never_fades() {
        assert_eq!(fade_amount(5, 6, 0), None);
    }
}
