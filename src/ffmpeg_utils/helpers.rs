//! Safe wrappers around FFmpeg FFI calls.
//!
//! Every public function in this module is **safe** to call; each `unsafe`
//! block carries its safety argument.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;

// ── Codec context accessors ─────────────────────────────────────────────────

/// Set `pkt_timebase` on a codec context before it is opened as a decoder.
///
/// `ffmpeg-next` does not expose this field through a safe setter.
pub fn codec_context_set_packet_time_base(
    context: &mut ffmpeg::codec::Context,
    time_base: ffmpeg::Rational,
) {
    // SAFETY: `context.as_mut_ptr()` is valid for the lifetime of `context`.
    // `pkt_timebase` is a plain AVRational field with no ownership semantics.
    unsafe {
        (*context.as_mut_ptr()).pkt_timebase = time_base.into();
    }
}

/// Allocate a fresh `AVCodecParameters`, copy the encoder context into it,
/// and return it as a safe `ffmpeg::codec::Parameters`.
///
/// Used to describe the encoded stream to the muxer.
pub fn encoder_codec_parameters(
    encoder: &ffmpeg::codec::encoder::Audio,
) -> ffmpeg::codec::Parameters {
    use std::ops::Deref;
    use std::rc::Rc;
    let ctx: &ffmpeg::codec::Context = encoder.deref();
    // SAFETY: `avcodec_parameters_from_context` copies fields from a valid,
    // open encoder context, which `encoder` is for as long as it is alive.
    // Allocation only fails under OOM, which is unrecoverable anyway.
    unsafe {
        let params = ffmpeg::ffi::avcodec_parameters_alloc();
        ffmpeg::ffi::avcodec_parameters_from_context(params, ctx.as_ptr());
        ffmpeg::codec::Parameters::wrap(params, None::<Rc<dyn std::any::Any>>)
    }
}

/// Zero out `codec_tag` on the `AVCodecParameters` attached to an output
/// stream, so the muxer picks the correct tag for the target container.
///
/// Must be called after `out_stream.set_parameters(...)` and before
/// `write_header`.
pub fn stream_reset_codec_tag(out_stream: &mut ffmpeg::format::stream::StreamMut) {
    // SAFETY: `out_stream.as_mut_ptr()` is valid for the lifetime of the
    // stream. `codecpar` is set by `set_parameters` and is non-null.
    unsafe {
        (*(*out_stream.as_mut_ptr()).codecpar).codec_tag = 0;
    }
}

// ── Output format lookup ────────────────────────────────────────────────────

/// Returns `true` if FFmpeg can guess a container format from the file name.
pub fn output_format_known(path: &std::path::Path) -> bool {
    let Ok(name) = std::ffi::CString::new(path.to_string_lossy().as_bytes()) else {
        return false;
    };
    // SAFETY: `av_guess_format` only reads the NUL-terminated name and
    // returns a pointer into FFmpeg's static muxer registry, which we only
    // null-check.
    let format =
        unsafe { ffmpeg::ffi::av_guess_format(std::ptr::null(), name.as_ptr(), std::ptr::null()) };
    !format.is_null()
}

// ── Channel layouts ─────────────────────────────────────────────────────────

/// Default layout for an output channel count.
pub fn default_channel_layout(channels: u16) -> ChannelLayout {
    match channels {
        1 => ChannelLayout::MONO,
        _ => ChannelLayout::STEREO,
    }
}

/// The layout to hand to the resampler for a decoder.
///
/// Some demuxers (raw PCM, WAV with an unusual header) leave the layout
/// unspecified; fall back to the default layout for the channel count.
pub fn resolve_channel_layout(layout: ChannelLayout, channels: u16) -> ChannelLayout {
    if layout.bits() == 0 {
        default_channel_layout(channels)
    } else {
        layout
    }
}

// ── Audio plane access ──────────────────────────────────────────────────────

/// Number of data planes of an audio frame: one per channel when planar,
/// a single interleaved one when packed.
fn audio_plane_count(frame: &ffmpeg::util::frame::Audio) -> usize {
    if frame.format().is_planar() {
        frame.channels() as usize
    } else {
        1
    }
}

/// Raw plane pointers of an audio frame, in the form `swr_convert` expects.
pub fn audio_plane_ptrs(frame: &ffmpeg::util::frame::Audio) -> Vec<*const u8> {
    let planes = audio_plane_count(frame);
    // SAFETY: `extended_data` holds at least `planes` valid pointers for an
    // allocated frame; we only copy the pointer values, never dereference.
    unsafe {
        let ptrs = (*frame.as_ptr()).extended_data;
        if ptrs.is_null() {
            return Vec::new();
        }
        (0..planes).map(|i| *ptrs.add(i) as *const u8).collect()
    }
}

/// Writable bytes of plane `index` of an audio frame; empty if the frame has
/// no such plane.
///
/// `ffmpeg-next`'s `Audio::data_mut(index)` trusts `linesize[index]`, but
/// FFmpeg only sets `linesize[0]` for audio, and that value is the size of
/// every plane.
pub fn audio_plane_data_mut(frame: &mut ffmpeg::util::frame::Audio, index: usize) -> &mut [u8] {
    if index >= audio_plane_count(frame) {
        return &mut [];
    }
    // SAFETY: `index` is below the frame's plane count, so
    // `extended_data[index]` is either null or a buffer of `linesize[0]`
    // bytes owned by the frame. The slice borrows `frame` mutably, so the
    // buffer outlives it and nobody else touches it meanwhile.
    unsafe {
        let f = frame.as_mut_ptr();
        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &mut [];
        }
        let plane = *ptrs.add(index);
        let size = (*f).linesize[0];
        if plane.is_null() || size <= 0 {
            return &mut [];
        }
        std::slice::from_raw_parts_mut(plane, size as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg::util::format::sample::{Sample, Type};

    #[test]
    fn test_default_channel_layout() {
        assert_eq!(default_channel_layout(1), ChannelLayout::MONO);
        assert_eq!(default_channel_layout(2), ChannelLayout::STEREO);
    }

    #[test]
    fn test_resolve_keeps_known_layout() {
        assert_eq!(
            resolve_channel_layout(ChannelLayout::MONO, 2),
            ChannelLayout::MONO
        );
    }

    #[test]
    fn test_output_format_known() {
        crate::ffmpeg_utils::init().unwrap();
        assert!(output_format_known(std::path::Path::new("out.m4a")));
        assert!(output_format_known(std::path::Path::new("out.mp3")));
        assert!(!output_format_known(std::path::Path::new("out.notaformat")));
    }

    #[test]
    fn test_planar_frame_planes() {
        let mut frame =
            ffmpeg::util::frame::Audio::new(Sample::F32(Type::Planar), 256, ChannelLayout::STEREO);
        assert_eq!(audio_plane_ptrs(&frame).len(), 2);
        assert!(audio_plane_data_mut(&mut frame, 1).len() >= 256 * 4);
        assert!(audio_plane_data_mut(&mut frame, 2).is_empty());

        audio_plane_data_mut(&mut frame, 1)[0] = 7;
        let second = audio_plane_ptrs(&frame)[1];
        // SAFETY: the frame is alive and its second plane is non-empty.
        assert_eq!(unsafe { *second }, 7);
    }

    #[test]
    fn test_packed_frame_planes() {
        let mut frame =
            ffmpeg::util::frame::Audio::new(Sample::I16(Type::Packed), 100, ChannelLayout::STEREO);
        assert_eq!(audio_plane_ptrs(&frame).len(), 1);
        assert!(audio_plane_data_mut(&mut frame, 0).len() >= 100 * 4);
        assert!(audio_plane_data_mut(&mut frame, 1).is_empty());
    }
}
