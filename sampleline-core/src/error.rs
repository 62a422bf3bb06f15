use thiserror::Error;

/// All errors produced by sampleline-core.
///
/// Variants that can surface on the realtime path (`CorruptIndex`) carry only
/// plain integers so constructing them never allocates.
#[derive(Debug, Error)]
pub enum SamplelineError {
    #[error("shared region of {byte_len} bytes is too small (need at least {min_byte_len})")]
    InvalidRegionSize { byte_len: usize, min_byte_len: usize },

    #[error("shared region of {byte_len} bytes exceeds the {max_byte_len}-byte limit")]
    RegionTooLarge { byte_len: usize, max_byte_len: usize },

    #[error("ring index out of range: read={read} write={write} capacity={capacity}")]
    CorruptIndex {
        read: u32,
        write: u32,
        capacity: u32,
    },

    #[error("shared region already has a bound consumer")]
    ConsumerAlreadyBound,

    #[error("shared region already has a bound producer")]
    ProducerAlreadyBound,

    #[error("processor '{0}' is already registered")]
    DuplicateProcessor(String),

    #[error("no processor registered under '{0}'")]
    UnknownProcessor(String),

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default output device found")]
    NoDefaultOutputDevice,

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("WAV encode error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SamplelineError>;
