//! Local file frame source using FFmpeg.
//!
//! The container is opened in `open`; frames are decoded in-memory and converted
//! to RGB24. At end of input the decoder is flushed so trailing frames are not lost.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::{FileConfig, FileStats};
use crate::frame::{Frame, SourceInfo};

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    state: Option<DecodeState>,
    frame_count: u64,
}

struct DecodeState {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Self {
        Self {
            config,
            state: None,
            frame_count: 0,
        }
    }

    pub(crate) fn open(&mut self) -> Result<SourceInfo> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&self.config.path).with_context(|| {
            format!("failed to open file input '{}' with ffmpeg", self.config.path)
        })?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let fps = f64::from(input_stream.avg_frame_rate());
        let frame_count = u64::try_from(input_stream.frames()).ok().filter(|n| *n > 0);
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let info = SourceInfo {
            width: decoder.width(),
            height: decoder.height(),
            fps: if fps.is_finite() && fps > 0.0 { fps } else { 0.0 },
            frame_count,
        };

        self.state = Some(DecodeState {
            input,
            stream_index,
            decoder,
            scaler,
            eof_sent: false,
        });
        log::info!("FileSource: connected to {} (ffmpeg)", self.config.path);
        Ok(info)
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| anyhow!("ffmpeg source read before open"))?;
        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            if state.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg::frame::Video::empty();
                state
                    .scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
                self.frame_count += 1;
                return Frame::new(self.frame_count, width, height, pixels).map(Some);
            }

            if state.eof_sent {
                return Ok(None);
            }

            match next_video_packet(state) {
                Some(packet) => state
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    state.decoder.send_eof().context("flush ffmpeg decoder")?;
                    state.eof_sent = true;
                }
            }
        }
    }

    pub(crate) fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

fn next_video_packet(state: &mut DecodeState) -> Option<ffmpeg::Packet> {
    let stream_index = state.stream_index;
    state
        .input
        .packets()
        .find(|(stream, _)| stream.index() == stream_index)
        .map(|(_, packet)| packet)
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame buffer is shorter than expected")?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
