use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("render error")]
    RenderError(#[from] anyhow::Error),
    #[error("no suitable adapter found")]
    CreateAdapterError,
    #[error("cannot create device: {0}")]
    RequestDeviceError(#[from] wgpu::RequestDeviceError),
    #[error("framebuffer incomplete: {0}")]
    FramebufferIncomplete(String),
}

pub type Result<T> = std::result::Result<T, self::Error>;
