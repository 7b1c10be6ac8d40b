//! Preprocessing between raw environment frames and the formats used by the
//! replay buffer and the Q-network.
//!
//! Raw RGB observations are warped to 84x84 grayscale and kept as `u8`;
//! storing a `f32` frame instead would be 4x more memory intensive, which
//! matters when the replay buffer holds hundreds of thousands of frames.
//! The conversion to floating point is therefore deferred until a batch is
//! actually fed to the network.
use crate::base::RgbObs;
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use image::{
    codecs::gif::{GifEncoder, Repeat},
    imageops::{resize, FilterType::Triangle},
    Delay, Frame, ImageBuffer, Rgb, RgbaImage,
};
use image::imageops::grayscale;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    path::{Path, PathBuf},
};

/// Side length of a processed frame.
pub const FRAME_SIZE: usize = 84;

/// Number of pixels in a processed frame.
pub const FRAME_LEN: usize = FRAME_SIZE * FRAME_SIZE;

/// Number of consecutive frames fed to the network.
pub const WINDOW_LENGTH: usize = 4;

/// Playback video resolution.
const VIDEO_SIZE: (u32, u32) = (640, 480);

/// Playback video frame rate.
const VIDEO_FPS: u32 = 25;

const VIDEO_FILE_NAME: &str = "atari_playback.gif";

/// An 84x84 grayscale frame with 8-bit intensities.
///
/// This is the unit stored in the replay buffer. It is never mutated after
/// creation.
#[derive(Clone, Debug)]
pub struct ProcessedFrame {
    data: Vec<u8>,
}

impl ProcessedFrame {
    fn new(data: Vec<u8>) -> Self {
        assert_eq!(data.len(), FRAME_LEN);
        Self { data }
    }

    /// The pixel intensities, row-major.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// A frame of constant intensity. Only used by tests and padding.
    pub fn constant(v: u8) -> Self {
        Self {
            data: vec![v; FRAME_LEN],
        }
    }
}

/// A rolling window of the last [`WINDOW_LENGTH`] processed frames.
///
/// The oldest frame occupies the first slot. This is what the policy
/// consumes when selecting actions.
#[derive(Clone, Debug)]
pub struct FrameStack {
    frames: Vec<u8>,
}

impl FrameStack {
    /// A stack holding the given frame in the newest slot and zero frames in
    /// the older slots, as produced right after an environment reset.
    ///
    /// The zero padding matches how sampled windows reconstruct states at
    /// episode starts, so the network sees the same states online and in
    /// replay.
    pub fn from_initial(frame: &ProcessedFrame) -> Self {
        let mut frames = vec![0u8; (WINDOW_LENGTH - 1) * FRAME_LEN];
        frames.extend_from_slice(frame.as_slice());
        Self { frames }
    }

    /// Shifts the window by one, dropping the oldest frame.
    pub fn push(&mut self, frame: &ProcessedFrame) {
        self.frames.copy_within(FRAME_LEN.., 0);
        let tail = (WINDOW_LENGTH - 1) * FRAME_LEN;
        self.frames[tail..].copy_from_slice(frame.as_slice());
    }

    /// The window as one contiguous slice, oldest frame first.
    pub fn as_slice(&self) -> &[u8] {
        &self.frames
    }
}

/// Converts a flat batch of `n` stacked windows of `u8` frames into a
/// normalized `(n, 4, 84, 84)` float tensor with values in `[0, 1]`.
///
/// Every output element equals the stored intensity divided by 255 exactly.
/// The network must not scale its input again.
pub fn state_batch_to_tensor(frames: &[u8], n: usize, device: &Device) -> Result<Tensor> {
    debug_assert_eq!(frames.len(), n * WINDOW_LENGTH * FRAME_LEN);
    let t = Tensor::from_slice(frames, (n, WINDOW_LENGTH, FRAME_SIZE, FRAME_SIZE), device)?;
    Ok((t.to_dtype(DType::F32)? / 255f64)?)
}

/// Configuration of [`FrameProcessor`].
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FrameProcessorConfig {
    /// Record a playback video of the raw frames.
    pub show: bool,

    /// Directory the video file is placed in; the working directory if none.
    pub output_dir: Option<PathBuf>,
}

impl FrameProcessorConfig {
    /// Enables or disables video recording.
    pub fn show(mut self, v: bool) -> Self {
        self.show = v;
        self
    }

    /// Sets the output directory.
    pub fn output_dir(mut self, v: Option<PathBuf>) -> Self {
        self.output_dir = v;
        self
    }
}

// The writer is created lazily by the first processed observation and closed
// exactly once; there is no transition back to `Open`.
enum VideoWriter {
    Disabled,
    Idle { path: PathBuf },
    Open(GifEncoder<File>),
    Closed,
}

/// Bridges raw environment output and the formats consumed downstream.
///
/// Invoked once per environment step. Besides the frame and reward
/// conversions it optionally appends each raw frame to a playback video,
/// opened lazily on first use. [`FrameProcessor::finish`] finalizes the
/// video; if it is never called, dropping the processor finalizes it as
/// a fallback.
pub struct FrameProcessor {
    video: VideoWriter,
}

impl FrameProcessor {
    /// Builds a processor.
    pub fn build(config: &FrameProcessorConfig) -> Self {
        let video = if config.show {
            let dir = config
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("."));
            let path = dir.join(VIDEO_FILE_NAME);
            info!("Will write playback video to {:?}", &path);
            VideoWriter::Idle { path }
        } else {
            VideoWriter::Disabled
        };

        Self { video }
    }

    /// Warps a raw observation to an 84x84 grayscale frame.
    ///
    /// The observation must be an RGB frame with explicit height, width and
    /// channel axes; anything else is a contract violation and panics.
    /// When video recording is enabled, the raw color frame is also appended
    /// to the playback video at 640x480.
    pub fn process_observation(&mut self, obs: &RgbObs) -> Result<ProcessedFrame> {
        assert_eq!(
            obs.data.len(),
            (obs.height * obs.width * 3) as usize,
            "observation must have height, width and channel axes"
        );

        let img = ImageBuffer::<Rgb<u8>, _>::from_vec(obs.width, obs.height, obs.data.clone())
            .expect("observation buffer matches its dimensions");

        let warped = resize(&img, FRAME_SIZE as u32, FRAME_SIZE as u32, Triangle);
        let gray = grayscale(&warped);
        let frame = gray.into_raw();
        assert_eq!(frame.len(), FRAME_LEN);

        if !matches!(self.video, VideoWriter::Disabled) {
            self.record_frame(&img)?;
        }

        Ok(ProcessedFrame::new(frame))
    }

    /// Clips a reward to `[-1, 1]`.
    ///
    /// Bounds the scale of the learning signal regardless of the native
    /// score magnitudes of the game.
    pub fn process_reward(&self, reward: f32) -> f32 {
        reward.clamp(-1.0, 1.0)
    }

    /// Returns if a video writer is currently open.
    pub fn is_recording(&self) -> bool {
        matches!(self.video, VideoWriter::Open(_))
    }

    /// Finalizes the playback video.
    ///
    /// Must be called once after the run; a no-op when recording is disabled
    /// or the video was already finalized.
    pub fn finish(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.video, VideoWriter::Closed) {
            VideoWriter::Disabled => {
                self.video = VideoWriter::Disabled;
            }
            VideoWriter::Idle { .. } => {
                // Enabled but no frame was ever processed; nothing on disk.
            }
            VideoWriter::Open(encoder) => {
                info!("Finalizing playback video");
                drop(encoder);
            }
            VideoWriter::Closed => {}
        }
        Ok(())
    }

    fn record_frame(&mut self, img: &ImageBuffer<Rgb<u8>, Vec<u8>>) -> Result<()> {
        if let VideoWriter::Idle { path } = &self.video {
            let file = File::create(path)?;
            let mut encoder = GifEncoder::new(file);
            encoder.set_repeat(Repeat::Infinite)?;
            self.video = VideoWriter::Open(encoder);
        }

        let (w, h) = VIDEO_SIZE;
        let frame: RgbaImage = image::DynamicImage::ImageRgb8(resize(img, w, h, Triangle)).to_rgba8();
        let delay = Delay::from_numer_denom_ms(1000, VIDEO_FPS);

        if let VideoWriter::Open(encoder) = &mut self.video {
            encoder.encode_frame(Frame::from_parts(frame, 0, 0, delay))?;
        }

        Ok(())
    }
}

impl Drop for FrameProcessor {
    fn drop(&mut self) {
        if self.is_recording() {
            warn!("Processor dropped with an open video writer; finalizing");
            let _ = self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn constant_obs(height: u32, width: u32, v: u8) -> RgbObs {
        RgbObs {
            height,
            width,
            data: vec![v; (height * width * 3) as usize],
        }
    }

    #[test]
    fn warps_to_84x84_u8() -> Result<()> {
        let mut p = FrameProcessor::build(&FrameProcessorConfig::default());
        let frame = p.process_observation(&constant_obs(210, 160, 0))?;
        assert_eq!(frame.as_slice().len(), FRAME_LEN);
        Ok(())
    }

    #[test]
    fn constant_frame_stays_approximately_constant() -> Result<()> {
        let mut p = FrameProcessor::build(&FrameProcessorConfig::default());
        let frame = p.process_observation(&constant_obs(210, 160, 128))?;
        for &v in frame.as_slice() {
            assert!((v as i32 - 128).abs() <= 2, "pixel {} too far from 128", v);
        }
        Ok(())
    }

    #[test]
    #[should_panic]
    fn rejects_malformed_observation() {
        let mut p = FrameProcessor::build(&FrameProcessorConfig::default());
        let bad = RgbObs {
            height: 210,
            width: 160,
            // grayscale data, missing the channel axis
            data: vec![0; 210 * 160],
        };
        let _ = p.process_observation(&bad);
    }

    #[test]
    fn clips_rewards() {
        let p = FrameProcessor::build(&FrameProcessorConfig::default());
        let inputs = [-5.0f32, -1.0, 0.0, 0.5, 1.0, 10.0];
        let expected = [-1.0f32, -1.0, 0.0, 0.5, 1.0, 1.0];
        for (x, want) in inputs.iter().zip(expected.iter()) {
            let got = p.process_reward(*x);
            assert_eq!(got, *want);
            // clipping is idempotent
            assert_eq!(p.process_reward(got), got);
        }
    }

    #[test]
    fn normalizes_batches_exactly() -> Result<()> {
        let frames: Vec<u8> = (0..WINDOW_LENGTH * FRAME_LEN)
            .map(|i| (i % 256) as u8)
            .collect();
        let t = state_batch_to_tensor(&frames, 1, &Device::Cpu)?;
        assert_eq!(t.dims(), &[1, WINDOW_LENGTH, FRAME_SIZE, FRAME_SIZE]);

        let values: Vec<f32> = t.flatten_all()?.to_vec1()?;
        for (v, raw) in values.iter().zip(frames.iter()) {
            assert!(*v >= 0.0 && *v <= 1.0);
            assert_eq!(*v, *raw as f32 / 255.0);
        }
        Ok(())
    }

    #[test]
    fn finish_without_show_is_a_noop() -> Result<()> {
        let mut p = FrameProcessor::build(&FrameProcessorConfig::default());
        assert!(!p.is_recording());
        p.finish()?;
        assert!(!p.is_recording());
        Ok(())
    }

    #[test]
    fn writer_is_created_lazily_and_closed_once() -> Result<()> {
        let dir = TempDir::new("playback")?;
        let config = FrameProcessorConfig::default()
            .show(true)
            .output_dir(Some(dir.path().to_path_buf()));
        let mut p = FrameProcessor::build(&config);

        // enabled but not yet open
        assert!(!p.is_recording());

        let _ = p.process_observation(&constant_obs(210, 160, 100))?;
        assert!(p.is_recording());
        let _ = p.process_observation(&constant_obs(210, 160, 200))?;
        assert!(p.is_recording());

        p.finish()?;
        assert!(!p.is_recording());
        p.finish()?; // second call must not fail

        assert!(dir.path().join(VIDEO_FILE_NAME).exists());
        Ok(())
    }

    #[test]
    fn initial_stack_is_zero_padded() {
        let stack = FrameStack::from_initial(&ProcessedFrame::constant(7));

        let s = stack.as_slice();
        assert_eq!(s.len(), WINDOW_LENGTH * FRAME_LEN);
        for w in 0..WINDOW_LENGTH - 1 {
            assert_eq!(s[w * FRAME_LEN], 0);
        }
        assert_eq!(s[(WINDOW_LENGTH - 1) * FRAME_LEN], 7);
    }

    #[test]
    fn frame_stack_shifts_window() {
        let mut stack = FrameStack::from_initial(&ProcessedFrame::constant(1));
        stack.push(&ProcessedFrame::constant(2));
        stack.push(&ProcessedFrame::constant(3));

        let s = stack.as_slice();
        assert_eq!(s.len(), WINDOW_LENGTH * FRAME_LEN);
        assert_eq!(s[0], 0);
        assert_eq!(s[FRAME_LEN], 1);
        assert_eq!(s[2 * FRAME_LEN], 2);
        assert_eq!(s[3 * FRAME_LEN], 3);
    }
}
