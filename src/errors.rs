use std::fmt;

#[derive(Debug)]
pub enum StreamError {
    ConfigurationError(String),
    CaptureError(String),
    AudioError(String),
    SessionError(String),
    SinkError(String),
    TeardownError(String),
    #[cfg(feature = "encoder")]
    EncodingError(String),
    #[cfg(feature = "encoder")]
    MuxingError(String),
    #[cfg(feature = "encoder")]
    IoError(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StreamError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            StreamError::CaptureError(msg) => write!(f, "Capture error: {}", msg),
            StreamError::AudioError(msg) => write!(f, "Audio error: {}", msg),
            StreamError::SessionError(msg) => write!(f, "Session error: {}", msg),
            StreamError::SinkError(msg) => write!(f, "Sink error: {}", msg),
            StreamError::TeardownError(msg) => write!(f, "Teardown error: {}", msg),
            #[cfg(feature = "encoder")]
            StreamError::EncodingError(msg) => write!(f, "Encoding error: {}", msg),
            #[cfg(feature = "encoder")]
            StreamError::MuxingError(msg) => write!(f, "Muxing error: {}", msg),
            #[cfg(feature = "encoder")]
            StreamError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for StreamError {}
