//! Screen capture collaborators.
//!
//! A backend turns a screen [`Region`] into an image. Backends are `Send` but not
//! `Sync`: every execution context that captures (the sampling loop, a manual
//! "test" action) builds its own instance through [`default_backend`].

pub mod region;
#[cfg(feature = "screen")]
mod screen;

use image::DynamicImage;
use thiserror::Error;

pub use region::{to_local, Region};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture region {region} has no area")]
    InvalidRegion { region: Region },
    #[error("{backend} capture failed: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
    #[error("screen capture unavailable: {0}")]
    Unavailable(String),
}

impl CaptureError {
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }
}

pub trait CaptureBackend: Send {
    fn name(&self) -> &'static str;

    /// Grabs the pixels of a region already known to have positive size.
    fn grab(&mut self, region: &Region) -> Result<DynamicImage, CaptureError>;

    /// Bounds of the whole capturable screen, when the backend knows them.
    fn screen_bounds(&mut self) -> Option<Region> {
        None
    }

    /// Captures `region`. A region without area short-circuits to
    /// [`CaptureError::InvalidRegion`] and the backend is never touched.
    fn capture(&mut self, region: &Region) -> Result<DynamicImage, CaptureError> {
        if region.is_degenerate() {
            return Err(CaptureError::InvalidRegion { region: *region });
        }
        self.grab(region)
    }
}

impl<B: CaptureBackend + ?Sized> CaptureBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn grab(&mut self, region: &Region) -> Result<DynamicImage, CaptureError> {
        (**self).grab(region)
    }

    fn screen_bounds(&mut self) -> Option<Region> {
        (**self).screen_bounds()
    }
}

/// Tries `primary` first and falls back to `fallback` for this capture only.
pub struct FallbackCapture<P, F> {
    primary: P,
    fallback: F,
}

impl<P: CaptureBackend, F: CaptureBackend> FallbackCapture<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: CaptureBackend, F: CaptureBackend> CaptureBackend for FallbackCapture<P, F> {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    fn grab(&mut self, region: &Region) -> Result<DynamicImage, CaptureError> {
        match self.primary.grab(region) {
            Ok(image) => Ok(image),
            Err(err) => {
                log_warn!(
                    "{err}; falling back to {} for this capture",
                    self.fallback.name()
                );
                self.fallback.grab(region)
            }
        }
    }

    fn screen_bounds(&mut self) -> Option<Region> {
        self.primary
            .screen_bounds()
            .or_else(|| self.fallback.screen_bounds())
    }
}

/// Backend used when the crate is built without screen capture support.
#[derive(Debug, Default)]
pub struct UnavailableCapture;

impl CaptureBackend for UnavailableCapture {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn grab(&mut self, _region: &Region) -> Result<DynamicImage, CaptureError> {
        Err(CaptureError::Unavailable(
            "goldwatch was built without the `screen` feature".into(),
        ))
    }
}

/// Builds a fresh capture backend for the calling execution context.
#[cfg(feature = "screen")]
pub fn default_backend() -> Box<dyn CaptureBackend> {
    Box::new(FallbackCapture::new(
        screen::XcapCapture::primary_monitor(),
        screen::XcapCapture::monitor_at_origin(),
    ))
}

#[cfg(not(feature = "screen"))]
pub fn default_backend() -> Box<dyn CaptureBackend> {
    Box::new(UnavailableCapture)
}
