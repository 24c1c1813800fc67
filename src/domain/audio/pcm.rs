//! 16-bit PCM helpers: decoding segments, format canonicalization and WAV encoding.

use super::error::AssemblyError;
use crate::domain::tts::{AudioCodec, AudioSegment};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::f64::consts::PI;
use std::io::Cursor;
use std::time::Duration;

/// Pitch of the tone marking a failed chunk
pub const GAP_MARKER_TONE_HZ: f64 = 880.0;

/// Peak amplitude of the marker tone relative to full scale
const GAP_MARKER_AMPLITUDE: f64 = 0.3;

/// Interleaved signed 16-bit samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl PcmBuffer {
    pub fn empty(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            samples: Vec::new(),
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }
}

/// Decode a synthesized segment into PCM samples
pub fn decode_segment(segment: &AudioSegment) -> Result<PcmBuffer, AssemblyError> {
    let decode_error = |message: String| AssemblyError::Decode {
        index: segment.chunk_index,
        message,
    };

    match segment.codec {
        AudioCodec::Lpcm => {
            if segment.channel_count == 0 || segment.sample_rate == 0 {
                return Err(decode_error("segment declares no channels or sample rate".to_string()));
            }
            if segment.payload.len() % 2 != 0 {
                return Err(decode_error(format!(
                    "odd LPCM payload length {}",
                    segment.payload.len()
                )));
            }
            let samples = segment
                .payload
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            Ok(PcmBuffer {
                sample_rate: segment.sample_rate,
                channels: segment.channel_count,
                samples,
            })
        }
        AudioCodec::Wav => decode_wav(&segment.payload).map_err(decode_error),
    }
}

fn decode_wav(payload: &[u8]) -> Result<PcmBuffer, String> {
    let mut reader =
        WavReader::new(Cursor::new(payload)).map_err(|e| format!("Failed to parse WAV: {}", e))?;
    let spec = reader.spec();

    let samples: Result<Vec<i16>, hound::Error> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (f64::from(v).clamp(-1.0, 1.0) * f64::from(i16::MAX)) as i16))
            .collect(),
        (SampleFormat::Int, bits) if bits <= 16 => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v << (16 - bits)))
            .collect(),
        (SampleFormat::Int, bits) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| (v >> (bits - 16)) as i16))
            .collect(),
    };

    Ok(PcmBuffer {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples: samples.map_err(|e| format!("Failed to read WAV samples: {}", e))?,
    })
}

/// Bring a buffer to the given channel count and sample rate
pub fn convert(buffer: PcmBuffer, sample_rate: u32, channels: u16) -> PcmBuffer {
    let remixed = if buffer.channels == channels {
        buffer.samples
    } else {
        remix(&buffer.samples, buffer.channels, channels)
    };
    let samples = resample(&remixed, channels, buffer.sample_rate, sample_rate);
    PcmBuffer {
        sample_rate,
        channels,
        samples,
    }
}

/// Change channel count: downmix by averaging, upmix by duplicating the mono signal
pub fn remix(samples: &[i16], from_channels: u16, to_channels: u16) -> Vec<i16> {
    let from = usize::from(from_channels.max(1));
    let to = usize::from(to_channels.max(1));
    if from == to {
        return samples.to_vec();
    }

    samples
        .chunks_exact(from)
        .flat_map(|frame| {
            let sum: i32 = frame.iter().map(|s| i32::from(*s)).sum();
            let mono = (sum / from as i32) as i16;
            std::iter::repeat(mono).take(to)
        })
        .collect()
}

/// Linear interpolation resampling of interleaved frames
pub fn resample(samples: &[i16], channels: u16, from_rate: u32, to_rate: u32) -> Vec<i16> {
    let channels = usize::from(channels.max(1));
    let frames = samples.len() / channels;
    if from_rate == to_rate || frames == 0 || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_frames = (frames as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_frames * channels);

    for i in 0..output_frames {
        let source_pos = i as f64 * ratio;
        let source_idx = (source_pos.floor() as usize).min(frames - 1);
        let next_idx = (source_idx + 1).min(frames - 1);
        let fraction = source_pos - source_idx as f64;

        for channel in 0..channels {
            let left = f64::from(samples[source_idx * channels + channel]);
            let right = f64::from(samples[next_idx * channels + channel]);
            output.push((left + (right - left) * fraction).round() as i16);
        }
    }

    output
}

/// Silence, an 880 Hz tone, silence; `duration` long in total
pub fn gap_marker(sample_rate: u32, channels: u16, duration: Duration) -> Vec<i16> {
    let total_frames = (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;
    let lead = total_frames / 4;
    let tone = total_frames / 2;
    let tail = total_frames - lead - tone;
    let channels = usize::from(channels.max(1));

    let mut samples = Vec::with_capacity(total_frames * channels);
    samples.resize(lead * channels, 0);
    for frame in 0..tone {
        let t = frame as f64 / f64::from(sample_rate);
        let value = (2.0 * PI * GAP_MARKER_TONE_HZ * t).sin() * GAP_MARKER_AMPLITUDE;
        let sample = (value * f64::from(i16::MAX)) as i16;
        samples.extend(std::iter::repeat(sample).take(channels));
    }
    samples.resize(samples.len() + tail * channels, 0);
    samples
}

/// Encode as a 16-bit PCM WAV file
pub fn encode_wav(buffer: &PcmBuffer) -> Result<Vec<u8>, AssemblyError> {
    let spec = WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            WavWriter::new(&mut cursor, spec).map_err(|e| AssemblyError::Encode(e.to_string()))?;
        for &sample in &buffer.samples {
            writer
                .write_sample(sample)
                .map_err(|e| AssemblyError::Encode(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| AssemblyError::Encode(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}
