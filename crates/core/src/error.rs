/// Result alias that carries the custom [`VisualizerError`] type.
pub type Result<T> = std::result::Result<T, VisualizerError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VisualizerError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Audio could not be decoded. Always fatal for a render.
    #[error("audio decode failed: {0}")]
    Decoder(String),
    /// Image decode/encode failure from the `image` crate.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    /// The FFT backend rejected a buffer; indicates a sizing bug.
    #[error("fft error: {0}")]
    Fft(#[from] realfft::FftError),
    /// Configuration rejected at validation time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The video encoder could not start, accept a frame, or finish.
    #[error("video encoder failed: {0}")]
    Encoder(String),
    /// Merging audio into the silent video failed. The silent video is kept.
    #[error("audio mux failed: {0}")]
    Mux(String),
    /// Another render currently holds the render slot.
    #[error("a render is already in progress")]
    Busy,
    /// The render was cancelled between two frames.
    #[error("render cancelled")]
    Cancelled,
}

impl VisualizerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Shorthand for [`VisualizerError::InvalidConfig`].
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Shorthand for [`VisualizerError::Decoder`].
    pub fn decoder<T: Into<String>>(msg: T) -> Self {
        Self::Decoder(msg.into())
    }
}

impl From<&str> for VisualizerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VisualizerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<hound::Error> for VisualizerError {
    fn from(value: hound::Error) -> Self {
        Self::Decoder(value.to_string())
    }
}
