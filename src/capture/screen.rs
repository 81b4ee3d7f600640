use image::DynamicImage;
use xcap::Monitor;

use super::{to_local, CaptureBackend, CaptureError, Region};

#[derive(Debug, Clone, Copy)]
enum MonitorChoice {
    Primary,
    ContainingOrigin,
}

/// Captures a monitor with xcap and crops the requested region out of it.
pub struct XcapCapture {
    choice: MonitorChoice,
}

impl XcapCapture {
    pub fn primary_monitor() -> Self {
        Self {
            choice: MonitorChoice::Primary,
        }
    }

    /// Picks whichever monitor contains the region's top-left corner.
    pub fn monitor_at_origin() -> Self {
        Self {
            choice: MonitorChoice::ContainingOrigin,
        }
    }

    fn find_monitor(&self, region: &Region) -> Result<Monitor, CaptureError> {
        let monitors = Monitor::all().map_err(|e| {
            CaptureError::backend(self.name(), format!("failed to enumerate monitors: {e}"))
        })?;

        let found = match self.choice {
            MonitorChoice::Primary => monitors
                .into_iter()
                .find(|m| m.is_primary().unwrap_or(false)),
            MonitorChoice::ContainingOrigin => monitors.into_iter().find(|m| {
                monitor_bounds(m)
                    .map(|bounds| bounds.contains_point(region.x1, region.y1))
                    .unwrap_or(false)
            }),
        };

        found.ok_or_else(|| CaptureError::backend(self.name(), "no matching monitor found"))
    }
}

fn monitor_bounds(monitor: &Monitor) -> Option<Region> {
    let x = monitor.x().ok()?;
    let y = monitor.y().ok()?;
    let width = i32::try_from(monitor.width().ok()?).ok()?;
    let height = i32::try_from(monitor.height().ok()?).ok()?;
    Some(Region::new(x, y, x + width, y + height))
}

impl CaptureBackend for XcapCapture {
    fn name(&self) -> &'static str {
        match self.choice {
            MonitorChoice::Primary => "xcap-primary",
            MonitorChoice::ContainingOrigin => "xcap-containing",
        }
    }

    fn grab(&mut self, region: &Region) -> Result<DynamicImage, CaptureError> {
        let monitor = self.find_monitor(region)?;
        let bounds = monitor_bounds(&monitor)
            .ok_or_else(|| CaptureError::backend(self.name(), "monitor geometry unavailable"))?;

        let local = to_local(&bounds, region);
        if local.is_degenerate() {
            return Err(CaptureError::backend(
                self.name(),
                format!("region {region} lies outside monitor {bounds}"),
            ));
        }

        let buffer = monitor
            .capture_image()
            .map_err(|e| CaptureError::backend(self.name(), format!("failed to capture screen: {e}")))?;

        local
            .crop(&DynamicImage::ImageRgba8(buffer))
            .ok_or_else(|| CaptureError::backend(self.name(), "captured frame smaller than monitor"))
    }

    fn screen_bounds(&mut self) -> Option<Region> {
        let monitors = Monitor::all().ok()?;
        let primary = monitors
            .into_iter()
            .find(|m| m.is_primary().unwrap_or(false))?;
        monitor_bounds(&primary)
    }
}
