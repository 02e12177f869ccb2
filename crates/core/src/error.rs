//! Error types for the RTP extraction pipeline.

use thiserror::Error;

use crate::rtp::RtpParseError;

/// Errors that can occur in the core extraction pipeline.
///
/// Variants are grouped below by the pipeline stage that raises them:
///
/// - **Configuration**: [`CodecConfig`](Self::CodecConfig),
///   [`CodecAlreadyConfigured`](Self::CodecAlreadyConfigured).
/// - **Parse**: [`RtpParse`](Self::RtpParse).
/// - **Dissector**: [`NotIp`](Self::NotIp), [`NotUdp`](Self::NotUdp),
///   [`LikelyRtcp`](Self::LikelyRtcp).
/// - **Codec**: [`OutOfSequence`](Self::OutOfSequence),
///   [`MultiFrameUnsupported`](Self::MultiFrameUnsupported), and others.
/// - **I/O**: [`Io`](Self::Io), [`KeyFile`](Self::KeyFile).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key file error: {0}")]
    KeyFile(String),

    #[error("no key registered for SPI {0:#010x}")]
    NoKeyForSpi(u32),

    #[error("unsupported ESP algorithm: {0}")]
    UnsupportedEspAlgorithm(String),

    #[error("ESP ciphertext misaligned: {0} bytes is not a multiple of the block size")]
    EspCiphertextMisaligned(usize),

    #[error("ESP decryption failed")]
    EspDecryptFailed,

    #[error("decrypted ESP payload did not parse as IPv4 or IPv6")]
    EspInnerNotIp,

    #[error("RTP parse error: {0}")]
    RtpParse(#[from] RtpParseError),

    #[error("frame has no IPv4 or IPv6 layer")]
    NotIp,

    #[error("not a UDP packet")]
    NotUdp,

    #[error("likely RTCP (odd port)")]
    LikelyRtcp,

    #[error("UDP port excluded by capture filter")]
    FilteredPort,

    #[error("codec configuration error: {0}")]
    CodecConfig(String),

    #[error("codec already configured")]
    CodecAlreadyConfigured,

    #[error("codec not configured")]
    CodecNotConfigured,

    #[error("codec '{0}' not found in registry")]
    UnknownCodec(String),

    #[error("packet out of sequence")]
    OutOfSequence,

    #[error("multiple frames per payload unsupported")]
    MultiFrameUnsupported,

    #[error("aggregation packets (STAP-A/B, MTAP) not supported")]
    AggregationUnsupported,

    #[error("forbidden_zero_bit set")]
    ForbiddenBitSet,

    #[error("unsupported NAL type: {0}")]
    UnsupportedNalType(u8),

    #[error("short payload: need at least {need} bytes, have {have}")]
    ShortPayload { need: usize, have: usize },

    #[error("capture error: {0}")]
    Capture(String),

    #[error("recursion depth exceeded while re-entering dissector")]
    RecursionDepthExceeded,
}

/// Convenience alias for `Result<T, CoreError>`.
pub type Result<T> = std::result::Result<T, CoreError>;
