//! Text recognition collaborators.

mod numbers;
mod preprocess;
mod tesseract;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use numbers::extract_numbers;
pub use preprocess::{binarize, otsu_threshold};
pub use tesseract::TesseractRecognizer;

/// Characters the recognizer is asked to restrict itself to.
pub const CHAR_WHITELIST: &str =
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz+-%$,.:";

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("{engine} failed: {message}")]
    Engine {
        engine: &'static str,
        message: String,
    },
    #[error("failed to encode image for OCR: {0}")]
    Encode(#[from] image::ImageError),
}

impl RecognitionError {
    pub fn engine(engine: &'static str, message: impl Into<String>) -> Self {
        Self::Engine {
            engine,
            message: message.into(),
        }
    }
}

/// Recognized text and the numbers parsed out of it, in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub text: String,
    pub numbers: Vec<f64>,
}

impl Recognition {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let numbers = extract_numbers(&text);
        Self { text, numbers }
    }

    /// The tracked value: by convention the first number on screen.
    pub fn first_number(&self) -> Option<f64> {
        self.numbers.first().copied()
    }
}

/// Common interface for OCR engines.
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn recognize(&self, image: &DynamicImage) -> Result<Recognition, RecognitionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognition_keeps_text_and_numbers() {
        let recognition = Recognition::from_text("Gold: 1300 +25/s");

        assert_eq!(recognition.text, "Gold: 1300 +25/s");
        assert_eq!(recognition.numbers, vec![1300.0, 25.0]);
        assert_eq!(recognition.first_number(), Some(1300.0));
    }

    #[test]
    fn no_numbers_means_no_tracked_value() {
        assert_eq!(Recognition::from_text("GOLD").first_number(), None);
    }
}
