use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use image::DynamicImage;
use thiserror::Error;

use crate::capture::{to_local, CaptureBackend, CaptureError, Region};
use crate::metrics::Sample;
use crate::ocr::{RecognitionError, Recognizer};

/// Which screen area(s) to read for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePlan {
    /// Capture the OCR region directly.
    Direct(Region),
    /// Capture `parent`, then crop to `sub` (absolute screen coordinates).
    TwoStep { parent: Region, sub: Region },
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("OCR region {sub} falls outside capture region {parent}")]
    Region { parent: Region, sub: Region },
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    #[error("no number found in recognized text {text:?}")]
    NoNumberFound { text: String },
    #[error("capture and recognition did not finish within {0:?}")]
    Timeout(Duration),
    #[error("sampling worker failed: {0}")]
    Worker(String),
}

impl SampleError {
    pub fn kind(&self) -> &'static str {
        match self {
            SampleError::Capture(_) => "capture",
            SampleError::Region { .. } => "region",
            SampleError::Recognition(_) => "recognition",
            SampleError::NoNumberFound { .. } => "no_number",
            SampleError::Timeout(_) => "timeout",
            SampleError::Worker(_) => "worker",
        }
    }
}

/// A successful sample together with what the recognizer saw.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub sample: Sample,
    pub text: String,
    pub numbers: Vec<f64>,
}

/// One synchronous capture + recognition attempt. No retries, no sleeping.
///
/// Each execution context owns its own `Sampler`, and with it its own capture
/// backend handle.
pub struct Sampler {
    capture: Box<dyn CaptureBackend>,
    recognizer: Arc<dyn Recognizer>,
    clock: fn() -> DateTime<Utc>,
}

impl Sampler {
    pub fn new(capture: Box<dyn CaptureBackend>, recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            capture,
            recognizer,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn screen_bounds(&mut self) -> Option<Region> {
        self.capture.screen_bounds()
    }

    /// Captures the image the recognizer would see for `plan`.
    pub fn capture_image(&mut self, plan: &CapturePlan) -> Result<DynamicImage, SampleError> {
        match *plan {
            CapturePlan::Direct(region) => Ok(self.capture.capture(&region)?),
            CapturePlan::TwoStep { parent, sub } => {
                let image = self.capture.capture(&parent)?;
                let local = to_local(&parent, &sub);
                if local.is_degenerate() {
                    return Err(SampleError::Region { parent, sub });
                }
                local.crop(&image).ok_or(SampleError::Region { parent, sub })
            }
        }
    }

    pub fn sample(&mut self, plan: &CapturePlan) -> Result<Reading, SampleError> {
        let image = self.capture_image(plan)?;
        let recognition = self.recognizer.recognize(&image)?;

        let Some(value) = recognition.first_number() else {
            return Err(SampleError::NoNumberFound {
                text: recognition.text,
            });
        };

        Ok(Reading {
            sample: Sample::new((self.clock)(), value),
            text: recognition.text,
            numbers: recognition.numbers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::Recognition;
    use chrono::TimeZone;
    use image::RgbaImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SizedCapture {
        calls: Arc<AtomicUsize>,
    }

    impl CaptureBackend for SizedCapture {
        fn name(&self) -> &'static str {
            "sized"
        }

        fn grab(&mut self, region: &Region) -> Result<DynamicImage, CaptureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(DynamicImage::ImageRgba8(RgbaImage::new(
                region.width() as u32,
                region.height() as u32,
            )))
        }
    }

    /// Reports the size of the image it was given.
    struct EchoSize;

    impl Recognizer for EchoSize {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn recognize(&self, image: &DynamicImage) -> Result<Recognition, RecognitionError> {
            Ok(Recognition::from_text(format!(
                "{}x{}",
                image.width(),
                image.height()
            )))
        }
    }

    struct BrokenEngine;

    impl Recognizer for BrokenEngine {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn recognize(&self, _image: &DynamicImage) -> Result<Recognition, RecognitionError> {
            Err(RecognitionError::EngineUnavailable("not installed".into()))
        }
    }

    struct Blank;

    impl Recognizer for Blank {
        fn name(&self) -> &'static str {
            "blank"
        }

        fn recognize(&self, _image: &DynamicImage) -> Result<Recognition, RecognitionError> {
            Ok(Recognition::from_text("Gold"))
        }
    }

    fn fixed_clock() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn sampler(recognizer: Arc<dyn Recognizer>) -> (Sampler, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let capture = SizedCapture {
            calls: Arc::clone(&calls),
        };
        (
            Sampler::new(Box::new(capture), recognizer).with_clock(fixed_clock),
            calls,
        )
    }

    #[test]
    fn direct_plan_takes_first_number() {
        let (mut sampler, _) = sampler(Arc::new(EchoSize));

        let reading = sampler
            .sample(&CapturePlan::Direct(Region::new(0, 0, 120, 40)))
            .unwrap();

        assert_eq!(reading.sample.value, 120.0);
        assert_eq!(reading.numbers, vec![120.0, 40.0]);
        assert_eq!(reading.sample.timestamp, fixed_clock());
    }

    #[test]
    fn two_step_crops_to_sub_region() {
        let (mut sampler, calls) = sampler(Arc::new(EchoSize));
        let plan = CapturePlan::TwoStep {
            parent: Region::new(100, 100, 900, 700),
            sub: Region::new(150, 120, 250, 150),
        };

        let reading = sampler.sample(&plan).unwrap();

        assert_eq!(reading.text, "100x30");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sub_outside_parent_is_a_region_error() {
        let (mut sampler, _) = sampler(Arc::new(EchoSize));
        let plan = CapturePlan::TwoStep {
            parent: Region::new(0, 0, 800, 600),
            sub: Region::new(900, 700, 1000, 760),
        };

        let err = sampler.sample(&plan).unwrap_err();
        assert!(matches!(err, SampleError::Region { .. }));
        assert_eq!(err.kind(), "region");
    }

    #[test]
    fn degenerate_direct_region_is_a_capture_error() {
        let (mut sampler, calls) = sampler(Arc::new(EchoSize));

        let err = sampler
            .sample(&CapturePlan::Direct(Region::new(10, 10, 5, 50)))
            .unwrap_err();

        assert!(matches!(
            err,
            SampleError::Capture(CaptureError::InvalidRegion { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn text_without_numbers_is_reported_with_the_text() {
        let (mut sampler, _) = sampler(Arc::new(Blank));

        let err = sampler
            .sample(&CapturePlan::Direct(Region::new(0, 0, 10, 10)))
            .unwrap_err();

        match err {
            SampleError::NoNumberFound { text } => assert_eq!(text, "Gold"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn engine_failure_is_a_recognition_error() {
        let (mut sampler, _) = sampler(Arc::new(BrokenEngine));

        let err = sampler
            .sample(&CapturePlan::Direct(Region::new(0, 0, 10, 10)))
            .unwrap_err();
        assert_eq!(err.kind(), "recognition");
    }
}
