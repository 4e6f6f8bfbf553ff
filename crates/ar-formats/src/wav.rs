//! WAV encoding for 16-bit stereo PCM.

use ar_engine::Frame;
use std::io::Write;

pub fn write_wav(w: &mut impl Write, frames: &[Frame], sample_rate: u32) -> std::io::Result<()> {
    let num_channels: u16 = 2;
    let bits_per_sample: u16 = 16;
    let block_align = num_channels * (bits_per_sample / 8);
    let data_size = frames.len() as u32 * block_align as u32;

    write_riff_header(w, data_size)?;
    write_fmt_chunk(w, num_channels, sample_rate, block_align, bits_per_sample)?;
    write_data_chunk(w, frames, data_size)
}

pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    write_wav(&mut buf, frames, sample_rate).expect("Vec<u8> write cannot fail");
    buf
}

fn write_riff_header(w: &mut impl Write, data_size: u32) -> std::io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")
}

fn write_fmt_chunk(
    w: &mut impl Write,
    num_channels: u16,
    sample_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
) -> std::io::Result<()> {
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?;
    w.write_all(&num_channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * block_align as u32).to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&bits_per_sample.to_le_bytes())
}

fn write_data_chunk(w: &mut impl Write, frames: &[Frame], data_size: u32) -> std::io::Result<()> {
    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    for frame in frames {
        w.write_all(&to_pcm(frame.left).to_le_bytes())?;
        w.write_all(&to_pcm(frame.right).to_le_bytes())?;
    }
    Ok(())
}

/// Clamp a float sample into 16-bit range.
fn to_pcm(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_canonical() {
        let frames = [Frame::mono(0.0); 4];
        let bytes = frames_to_wav(&frames, 44100);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(&bytes[36..40], b"data");
        // 4 stereo 16-bit frames: 16 data bytes, 44-byte header.
        assert_eq!(bytes.len(), 44 + 16);
        assert_eq!(u32::from_le_bytes(bytes[40..44].try_into().unwrap()), 16);
    }

    #[test]
    fn samples_scale_and_clamp() {
        let frames = [Frame { left: 1.0, right: -2.0 }];
        let bytes = frames_to_wav(&frames, 44100);
        let left = i16::from_le_bytes(bytes[44..46].try_into().unwrap());
        let right = i16::from_le_bytes(bytes[46..48].try_into().unwrap());
        assert_eq!(left, 32767);
        assert_eq!(right, -32767);
    }

    #[test]
    fn sample_rate_lands_in_fmt_chunk() {
        let bytes = frames_to_wav(&[], 48000);
        assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 48000);
    }
}
