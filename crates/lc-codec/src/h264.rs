use bytes::Bytes;
use ffmpeg_next as ffmpeg;

use ffmpeg::codec;
use ffmpeg::codec::encoder;
use ffmpeg::codec::packet::flag::Flags as PacketFlags;
use ffmpeg::util::error::EAGAIN;
use ffmpeg::Rational;
use tracing::{debug, info};

use crate::{
    CodecError, ConvertedFrame, DrainOutcome, EncodedPacket, EncoderConfig, Result, StreamParams,
    TimeBase, VideoEncoder,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Encoding,
    Flushing,
    Finished,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Encoding => "encoding",
            State::Flushing => "flushing",
            State::Finished => "finished",
        }
    }
}

/// libx264 session behind the `VideoEncoder` protocol.
///
/// B-frame reordering means the codec holds a short internal queue:
/// submissions early in the stream produce no packets, and the tail of the
/// queue only comes out during the flush.
pub struct H264Encoder {
    encoder: encoder::Video,
    time_base: TimeBase,
    width: u32,
    height: u32,
    state: State,
    frames_in: u64,
    packets_out: u64,
}

impl H264Encoder {
    pub fn open(config: &EncoderConfig) -> Result<Self> {
        let codec = encoder::find(codec::Id::H264).ok_or(CodecError::EncoderNotFound)?;

        let mut builder = codec::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(CodecError::Open)?;

        let time_base = config.time_base();
        builder.set_width(config.width);
        builder.set_height(config.height);
        builder.set_format(config.pixel_format);
        builder.set_time_base(Rational::from(time_base));
        builder.set_frame_rate(Some(Rational(config.frame_rate as i32, 1)));
        builder.set_bit_rate(config.bit_rate);
        builder.set_gop(config.gop_size);
        builder.set_max_b_frames(config.max_b_frames);
        if config.global_header {
            builder.set_flags(codec::flag::Flags::GLOBAL_HEADER);
        }

        let encoder = builder.open_as(codec).map_err(CodecError::Open)?;

        info!(
            "H.264 encoder open: {}x{} @ {} fps, {} bps, gop {}, {} b-frames",
            config.width,
            config.height,
            config.frame_rate,
            config.bit_rate,
            config.gop_size,
            config.max_b_frames
        );

        Ok(Self {
            encoder,
            time_base,
            width: config.width,
            height: config.height,
            state: State::Encoding,
            frames_in: 0,
            packets_out: 0,
        })
    }

    fn to_packet(&self, packet: &ffmpeg::Packet) -> EncodedPacket {
        EncodedPacket {
            data: Bytes::copy_from_slice(packet.data().unwrap_or_default()),
            pts: packet.pts(),
            dts: packet.dts(),
            duration: packet.duration(),
            stream_index: 0,
            keyframe: packet.flags().contains(PacketFlags::KEY),
            time_base: self.time_base,
        }
    }
}

impl VideoEncoder for H264Encoder {
    fn stream_params(&self) -> StreamParams {
        StreamParams {
            parameters: codec::Parameters::from(&self.encoder),
            time_base: self.time_base,
            width: self.width,
            height: self.height,
        }
    }

    fn submit(&mut self, frame: &ConvertedFrame) -> Result<()> {
        if self.state != State::Encoding {
            return Err(CodecError::InvalidState(self.state.name()));
        }

        self.encoder
            .send_frame(frame.frame())
            .map_err(CodecError::Submit)?;
        self.frames_in += 1;
        Ok(())
    }

    fn drain(&mut self) -> Result<DrainOutcome> {
        let mut packet = ffmpeg::Packet::empty();
        match self.encoder.receive_packet(&mut packet) {
            Ok(()) => {
                self.packets_out += 1;
                Ok(DrainOutcome::Packet(self.to_packet(&packet)))
            }
            Err(ffmpeg::Error::Other { errno }) if errno == EAGAIN => Ok(DrainOutcome::Pending),
            Err(ffmpeg::Error::Eof) if self.state == State::Flushing => {
                self.state = State::Finished;
                debug!(
                    "encoder drained: {} frames in, {} packets out",
                    self.frames_in, self.packets_out
                );
                Ok(DrainOutcome::Finished)
            }
            Err(e) => Err(CodecError::Drain(e)),
        }
    }

    fn begin_flush(&mut self) -> Result<()> {
        if self.state != State::Encoding {
            return Err(CodecError::InvalidState(self.state.name()));
        }

        self.encoder.send_eof().map_err(CodecError::Submit)?;
        self.state = State::Flushing;
        debug!("flush requested after {} frames", self.frames_in);
        Ok(())
    }
}
