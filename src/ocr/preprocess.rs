use image::{DynamicImage, GrayImage, Luma};

/// Otsu's threshold over the image's luma histogram.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for Luma([value]) in gray.pixels() {
        histogram[*value as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 127;
    }

    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, count)| level as f64 * *count as f64)
        .sum();

    let mut background_weight = 0u64;
    let mut background_sum = 0.0;
    let mut best_variance = -1.0;
    let mut best_level = 0u8;

    for (level, count) in histogram.iter().enumerate() {
        background_weight += count;
        if background_weight == 0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0 {
            break;
        }

        background_sum += level as f64 * *count as f64;
        let background_mean = background_sum / background_weight as f64;
        let foreground_mean = (weighted_total - background_sum) / foreground_weight as f64;
        let variance = background_weight as f64
            * foreground_weight as f64
            * (background_mean - foreground_mean).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best_level = level as u8;
        }
    }

    best_level
}

/// Grayscale + Otsu binarization, normalized to dark text on a light background.
///
/// Game counters are often light text on a dark panel; the minority color is
/// treated as text so Tesseract always sees black glyphs on white.
pub fn binarize(image: &DynamicImage) -> GrayImage {
    let mut gray = image.to_luma8();
    let threshold = otsu_threshold(&gray);

    let mut light = 0u64;
    for pixel in gray.pixels_mut() {
        let value = if pixel.0[0] > threshold { 255 } else { 0 };
        if value == 255 {
            light += 1;
        }
        pixel.0[0] = value;
    }

    let total = u64::from(gray.width()) * u64::from(gray.height());
    if light * 2 < total {
        for pixel in gray.pixels_mut() {
            pixel.0[0] = 255 - pixel.0[0];
        }
    }

    gray
}
