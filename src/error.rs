use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GearTrainError {
    #[error("invalid chain configuration: {0}")]
    InvalidChain(String),
    #[error("failed to read font '{}': {source}", path.display())]
    FontRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{}' is not a usable font", path.display())]
    FontParse { path: PathBuf },
    #[error("no usable font found among {searched} candidate paths")]
    NoFont { searched: usize },
    #[error("failed to start event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("failed to create pixel surface: {0}")]
    Surface(#[from] pixels::Error),
}
