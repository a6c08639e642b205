//! WAV helpers backed by hound.

use std::io::Cursor;
use storyreel_error::{
    CompositionError, CompositionErrorKind, GenerationError, GenerationErrorKind, StoryreelResult,
};

/// Sample rate used for generated silence.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Measure a WAV clip in milliseconds (rounded down).
///
/// # Errors
///
/// `MalformedResponse` if the bytes are not a readable WAV file.
///
/// # Examples
///
/// ```
/// use storyreel_media::{silent_wav, wav_duration_ms};
///
/// let wav = silent_wav(1500, 16_000).unwrap();
/// assert_eq!(wav_duration_ms(&wav).unwrap(), 1500);
/// ```
pub fn wav_duration_ms(bytes: &[u8]) -> StoryreelResult<u64> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| {
        GenerationError::new(GenerationErrorKind::MalformedResponse(format!(
            "Failed to parse WAV audio: {}",
            e
        )))
    })?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(GenerationError::new(GenerationErrorKind::MalformedResponse(
            "WAV audio declares a zero sample rate".to_string(),
        ))
        .into());
    }
    // `duration()` counts frames, i.e. samples per channel.
    Ok(u64::from(reader.duration()) * 1000 / u64::from(spec.sample_rate))
}

/// Encode `duration_ms` of 16-bit mono silence.
///
/// # Errors
///
/// `Muxer` if encoding fails.
pub fn silent_wav(duration_ms: u64, sample_rate: u32) -> StoryreelResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let encode_error = |e: hound::Error| {
        CompositionError::new(CompositionErrorKind::Muxer(format!(
            "Failed to encode silence: {}",
            e
        )))
    };

    let frames = duration_ms * u64::from(sample_rate) / 1000;
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(encode_error)?;
        for _ in 0..frames {
            writer.write_sample(0i16).map_err(encode_error)?;
        }
        writer.finalize().map_err(encode_error)?;
    }
    Ok(cursor.into_inner())
}
