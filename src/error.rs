/// Errors that can occur when interacting with the tracking core.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("unknown tool uid '{0}'")]
    UnknownTool(String),

    #[error("notification channel disconnected")]
    ChannelDisconnected,

    #[error("timeout waiting for notification")]
    Timeout,

    #[error("failed to spawn poller thread: {0}")]
    Thread(String),
}
