//! Video signature computation via ffmpeg-next container decoding.
//!
//! Opens the container, reads its duration, and samples `k` frames at fixed
//! fractions of that duration, dHashing each sampled frame with the same
//! 8x8 comparison grid the photo pipeline uses.

use crate::error::HashError;
use ffmpeg_next as ffmpeg;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Once;

/// Timestamps sampled as fractions of total duration, per the prescribed
/// signature format (k=5, evenly spaced over [5%, 95%]).
const SAMPLE_FRACTIONS: [f64; 5] = [0.05, 0.275, 0.5, 0.725, 0.95];

/// `{duration_sec, frame_hashes}` computed for a video file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VideoSignature {
    pub duration_sec: f64,
    pub frame_hashes: [u64; 5],
}

static FFMPEG_INIT: Once = Once::new();

fn ensure_ffmpeg_initialized() -> Result<(), HashError> {
    let mut init_err = None;
    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg::init() {
            init_err = Some(e.to_string());
        }
    });
    match init_err {
        Some(reason) => Err(HashError::ComputationFailed(format!(
            "ffmpeg initialization failed: {reason}"
        ))),
        None => Ok(()),
    }
}

/// Compute the video signature for a file.
pub fn video_signature(path: &Path) -> Result<VideoSignature, HashError> {
    ensure_ffmpeg_initialized()?;

    let mut input = ffmpeg::format::input(path).map_err(|e| HashError::DecodeFailed {
        path: path.to_path_buf(),
        reason: format!("failed to open container: {e}"),
    })?;

    let stream = input
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| HashError::UnsupportedFormat {
            format: "no video stream".to_string(),
        })?;
    let video_stream_index = stream.index();
    let time_base = stream.time_base();

    let duration_us = input.duration();
    if duration_us <= 0 {
        return Err(HashError::EmptyMedia {
            path: path.to_path_buf(),
        });
    }
    let duration_sec = duration_us as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE);

    let context_decoder = ffmpeg::codec::Context::from_parameters(stream.parameters())
        .map_err(|e| HashError::DecodeFailed {
            path: path.to_path_buf(),
            reason: format!("no decoder for stream: {e}"),
        })?;
    let mut decoder = context_decoder
        .decoder()
        .video()
        .map_err(|e| HashError::DecodeFailed {
            path: path.to_path_buf(),
            reason: format!("not a video codec: {e}"),
        })?;

    let mut scaler = ffmpeg::software::scaling::context::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg::format::Pixel::GRAY8,
        9,
        8,
        ffmpeg::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| HashError::ComputationFailed(format!("failed to build scaler: {e}")))?;

    let targets: Vec<f64> = SAMPLE_FRACTIONS
        .iter()
        .map(|frac| frac * duration_sec)
        .collect();
    let mut best: Vec<Option<(f64, u64)>> = vec![None; targets.len()];

    let mut process_frame = |frame: &ffmpeg::frame::Video| -> Result<(), HashError> {
        let Some(pts) = frame.timestamp() else {
            return Ok(());
        };
        let secs = pts as f64 * f64::from(time_base);

        let mut gray = ffmpeg::frame::Video::empty();
        scaler
            .run(frame, &mut gray)
            .map_err(|e| HashError::ComputationFailed(format!("scale failed: {e}")))?;

        let hash = hash_gray_frame(&gray);

        for (i, target) in targets.iter().enumerate() {
            let delta = (secs - target).abs();
            match best[i] {
                Some((best_delta, _)) if best_delta <= delta => {}
                _ => best[i] = Some((delta, hash)),
            }
        }

        Ok(())
    };

    for (stream, packet) in input.packets() {
        if stream.index() != video_stream_index {
            continue;
        }
        decoder
            .send_packet(&packet)
            .map_err(|e| HashError::DecodeFailed {
                path: path.to_path_buf(),
                reason: format!("decode error: {e}"),
            })?;

        let mut frame = ffmpeg::frame::Video::empty();
        while decoder.receive_frame(&mut frame).is_ok() {
            process_frame(&frame)?;
        }
    }

    let _ = decoder.send_eof();
    let mut frame = ffmpeg::frame::Video::empty();
    while decoder.receive_frame(&mut frame).is_ok() {
        process_frame(&frame)?;
    }

    let mut frame_hashes = [0u64; 5];
    for (i, slot) in best.iter().enumerate() {
        match slot {
            Some((_, hash)) => frame_hashes[i] = *hash,
            None => {
                return Err(HashError::ComputationFailed(
                    "failed to sample a frame at every target timestamp".to_string(),
                ))
            }
        }
    }

    Ok(VideoSignature {
        duration_sec,
        frame_hashes,
    })
}

/// Pack a GRAY8 9x8 scaled frame into a dHash the same way photo frames are
/// hashed, without going through the `image` crate's `DynamicImage`.
fn hash_gray_frame(frame: &ffmpeg::frame::Video) -> u64 {
    let stride = frame.stride(0);
    let data = frame.data(0);

    let pixel = |x: usize, y: usize| -> u8 { data[y * stride + x] };

    let mut hash: u64 = 0;
    let mut bit = 63;
    for y in 0..8usize {
        for x in 0..8usize {
            if pixel(x, y) > pixel(x + 1, y) {
                hash |= 1 << bit;
            }
            bit -= 1;
        }
    }
    hash
}
