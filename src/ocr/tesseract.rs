use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::{DynamicImage, ImageFormat};

use super::preprocess::binarize;
use super::{Recognition, RecognitionError, Recognizer, CHAR_WHITELIST};

/// Runs the Tesseract CLI, piping a PNG through stdin and reading text from stdout.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
    preprocess: bool,
}

impl TesseractRecognizer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            preprocess: true,
        }
    }

    pub fn without_preprocessing(mut self) -> Self {
        self.preprocess = false;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, RecognitionError> {
        let mut png = Vec::new();
        if self.preprocess {
            DynamicImage::ImageLuma8(binarize(image))
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        } else {
            image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        }
        Ok(png)
    }
}

impl Recognizer for TesseractRecognizer {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<Recognition, RecognitionError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Recognition::from_text(String::new()));
        }

        let png = self.encode(image)?;

        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "--oem", "3", "--psm", "6", "-c"])
            .arg(format!("tessedit_char_whitelist={CHAR_WHITELIST}"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => RecognitionError::EngineUnavailable(format!(
                    "tesseract not found at {}",
                    self.binary.display()
                )),
                _ => RecognitionError::engine(self.name(), format!("failed to start: {err}")),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&png)
                .map_err(|e| RecognitionError::engine(self.name(), format!("failed to write image: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| RecognitionError::engine(self.name(), format!("failed to read output: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::engine(
                self.name(),
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Recognition::from_text(text))
    }
}
