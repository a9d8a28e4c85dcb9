/// Result alias that carries the custom [`WhitneyError`] type.
pub type Result<T> = std::result::Result<T, WhitneyError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum WhitneyError {
    /// Free-form message for collaborator failures that have no dedicated
    /// variant.
    #[error("{0}")]
    Message(String),
    /// None of the encoding profiles in the fallback chain is accepted by the
    /// host encoder.
    #[error("no supported capture configuration (tried {})", .tried.join(", "))]
    UnsupportedCapture { tried: Vec<String> },
    /// The capture stream or encoder failed while a run was in progress.
    #[error("capture failed: {0}")]
    Capture(String),
    /// The draw callback reported a failure.
    #[error("render failed: {0}")]
    Render(String),
    /// A configuration value is outside its valid range.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The host holds the control panel, so the export controls could not be
    /// locked.
    #[error("control panel is busy")]
    ControlsBusy,
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration or frame log (de)serialisation failure.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl WhitneyError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn capture<T: Into<String>>(msg: T) -> Self {
        Self::Capture(msg.into())
    }
}

impl From<&str> for WhitneyError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for WhitneyError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_capture_lists_every_candidate() {
        let err = WhitneyError::UnsupportedCapture {
            tried: vec!["video/webm;codecs=vp9".into(), "video/webm".into()],
        };
        let text = err.to_string();
        assert!(text.contains("video/webm;codecs=vp9"));
        assert!(text.ends_with("video/webm)"));
    }
}
