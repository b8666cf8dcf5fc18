use crate::codec::{self, Codec, DecodedAudio};
use crate::error::Result;
use crate::station::{Station, StationError};

/// Seam between the decoding station and the codec.
pub trait FrameDecoder: Send + 'static {
    fn decode(&mut self, bytes: &[u8]) -> Result<DecodedAudio>;
}

/// [`FrameDecoder`] backed by the codec module.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecDecoder {
    pub codec: Codec,
}

impl CodecDecoder {
    pub fn new(codec: Codec) -> Self {
        Self { codec }
    }
}

impl FrameDecoder for CodecDecoder {
    fn decode(&mut self, bytes: &[u8]) -> Result<DecodedAudio> {
        codec::decode(bytes, self.codec)
    }
}

#[derive(Debug)]
pub struct DecodeJob {
    pub sequence: u64,
    pub bytes: Vec<u8>,
}

/// Outcome of one decode, failures included, so the pipeline always learns
/// that the job finished.
#[derive(Debug)]
pub struct DecodeCompletion {
    pub sequence: u64,
    pub result: Result<DecodedAudio>,
}

pub struct DecoderStation<D: FrameDecoder> {
    decoder: D,
}

impl<D: FrameDecoder> DecoderStation<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder }
    }
}

impl<D: FrameDecoder> Station for DecoderStation<D> {
    type Input = DecodeJob;
    type Output = DecodeCompletion;

    fn process(&mut self, job: DecodeJob) -> std::result::Result<Option<DecodeCompletion>, StationError> {
        Ok(Some(DecodeCompletion {
            sequence: job.sequence,
            result: self.decoder.decode(&job.bytes),
        }))
    }

    fn name(&self) -> &'static str {
        "decoder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::LossyQuality;

    #[test]
    fn test_completion_carries_decoded_audio() {
        let bytes = codec::encode(&[0.5, -0.5], 8000, 2, Codec::CompressedLossless, LossyQuality::Standard).unwrap();
        let mut station = DecoderStation::new(CodecDecoder::new(Codec::CompressedLossless));

        let completion = station
            .process(DecodeJob { sequence: 4, bytes })
            .unwrap()
            .unwrap();
        assert_eq!(completion.sequence, 4);
        let audio = completion.result.unwrap();
        assert_eq!(audio.samples, vec![0.5, -0.5]);
        assert_eq!(audio.channels, 2);
    }

    #[test]
    fn test_completion_carries_failure() {
        let mut station = DecoderStation::new(CodecDecoder::new(Codec::Lossless));

        let completion = station
            .process(DecodeJob {
                sequence: 1,
                bytes: vec![1, 2, 3],
            })
            .unwrap()
            .unwrap();
        assert!(completion.result.is_err());
    }
}
