//! Two-step region selection: pick a parent area (a window, the full screen,
//! or a manual rectangle), then the OCR area inside it.
//!
//! The flow is a plain state machine; whoever drives it (the terminal dashboard
//! here) feeds it [`SelectionInput`]s and reads the finished `(parent, sub)`
//! pair back out with [`RegionSelection::outcome`].

use thiserror::Error;

use crate::capture::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Parent is the bounds of an application window.
    Window,
    /// Parent is the whole screen.
    FullScreen,
    /// Parent is a rectangle dragged on screen.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStage {
    ChoosingMode,
    PickingParent { mode: SelectionMode },
    PickingSubArea { parent: Region },
    Done { parent: Region, sub: Region },
    Cancelled,
}

impl SelectionStage {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Cancelled)
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            Self::ChoosingMode => "step 1: choose `mode window`, `mode full` or `mode manual`",
            Self::PickingParent {
                mode: SelectionMode::Window,
            } => "step 1: `pick` the window bounds",
            Self::PickingParent { .. } => "step 1: `pick` the capture area",
            Self::PickingSubArea { .. } => {
                "step 2: `pick` the OCR area inside the parent, or `entire` to use all of it"
            }
            Self::Done { .. } => "selection complete",
            Self::Cancelled => "selection cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionInput {
    ChooseMode(SelectionMode),
    /// A rectangle in absolute screen coordinates.
    Pick(Region),
    UseEntireParent,
    Cancel,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("{input} is not expected while {stage}")]
    UnexpectedInput {
        input: &'static str,
        stage: &'static str,
    },
    #[error("selected area {0} has no area")]
    EmptyArea(Region),
    #[error("OCR area {sub} lies outside the parent {parent}")]
    OutsideParent { parent: Region, sub: Region },
    #[error("screen bounds are unknown; pick the area manually instead")]
    ScreenUnknown,
}

#[derive(Debug, Clone)]
pub struct RegionSelection {
    stage: SelectionStage,
    screen: Option<Region>,
}

impl RegionSelection {
    /// `screen` is used by [`SelectionMode::FullScreen`].
    pub fn new(screen: Option<Region>) -> Self {
        Self {
            stage: SelectionStage::ChoosingMode,
            screen,
        }
    }

    pub fn stage(&self) -> SelectionStage {
        self.stage
    }

    pub fn outcome(&self) -> Option<(Region, Region)> {
        match self.stage {
            SelectionStage::Done { parent, sub } => Some((parent, sub)),
            _ => None,
        }
    }

    /// Feeds one input. On error the stage is left unchanged.
    pub fn advance(&mut self, input: SelectionInput) -> Result<SelectionStage, SelectionError> {
        let next = match (self.stage, input) {
            (stage, SelectionInput::Cancel) if !stage.is_finished() => SelectionStage::Cancelled,

            (SelectionStage::ChoosingMode, SelectionInput::ChooseMode(SelectionMode::FullScreen)) => {
                let parent = self.screen.ok_or(SelectionError::ScreenUnknown)?;
                SelectionStage::PickingSubArea { parent }
            }
            (SelectionStage::ChoosingMode, SelectionInput::ChooseMode(mode)) => {
                SelectionStage::PickingParent { mode }
            }

            (SelectionStage::PickingParent { .. }, SelectionInput::Pick(area)) => {
                let parent = normalized(area)?;
                SelectionStage::PickingSubArea { parent }
            }

            (SelectionStage::PickingSubArea { parent }, SelectionInput::Pick(area)) => {
                let sub = normalized(area)?;
                if !within(&parent, &sub) {
                    return Err(SelectionError::OutsideParent { parent, sub });
                }
                SelectionStage::Done { parent, sub }
            }
            (SelectionStage::PickingSubArea { parent }, SelectionInput::UseEntireParent) => {
                SelectionStage::Done {
                    parent,
                    sub: parent,
                }
            }

            (stage, input) => {
                return Err(SelectionError::UnexpectedInput {
                    input: input_name(input),
                    stage: stage_name(stage),
                })
            }
        };

        self.stage = next;
        Ok(next)
    }
}

/// Maps drags on a scaled-down preview of the parent back to screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewScale {
    parent: Region,
    scale: f64,
}

impl PreviewScale {
    pub fn new(parent: Region, scale: f64) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        Self { parent, scale }
    }

    /// Shrinks the preview until it fits in `max_width` x `max_height`.
    /// Parents that already fit are shown at full size.
    pub fn fit(parent: Region, max_width: u32, max_height: u32) -> Self {
        let (width, height) = (parent.width() as f64, parent.height() as f64);
        if width <= 0.0 || height <= 0.0 {
            return Self::new(parent, 1.0);
        }
        let scale = (max_width as f64 / width)
            .min(max_height as f64 / height)
            .min(1.0);
        Self::new(parent, scale)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Preview size in pixels.
    pub fn preview_size(&self) -> (u32, u32) {
        let w = (self.parent.width() as f64 * self.scale) as u32;
        let h = (self.parent.height() as f64 * self.scale) as u32;
        (w, h)
    }

    /// Converts a drag between two preview points into absolute screen coordinates.
    pub fn to_screen(&self, start: (i32, i32), end: (i32, i32)) -> Region {
        let drag = Region::from_corners(start, end);
        let map = |value: i32, origin: i32| (value as f64 / self.scale).floor() as i32 + origin;
        Region::new(
            map(drag.x1, self.parent.x1),
            map(drag.y1, self.parent.y1),
            map(drag.x2, self.parent.x1),
            map(drag.y2, self.parent.y1),
        )
    }
}

fn normalized(area: Region) -> Result<Region, SelectionError> {
    let area = Region::from_corners((area.x1, area.y1), (area.x2, area.y2));
    if area.is_degenerate() {
        return Err(SelectionError::EmptyArea(area));
    }
    Ok(area)
}

fn within(parent: &Region, sub: &Region) -> bool {
    sub.x1 >= parent.x1 && sub.y1 >= parent.y1 && sub.x2 <= parent.x2 && sub.y2 <= parent.y2
}

fn input_name(input: SelectionInput) -> &'static str {
    match input {
        SelectionInput::ChooseMode(_) => "choosing a mode",
        SelectionInput::Pick(_) => "picking an area",
        SelectionInput::UseEntireParent => "using the entire parent",
        SelectionInput::Cancel => "cancelling",
    }
}

fn stage_name(stage: SelectionStage) -> &'static str {
    match stage {
        SelectionStage::ChoosingMode => "choosing a mode",
        SelectionStage::PickingParent { .. } => "picking the parent area",
        SelectionStage::PickingSubArea { .. } => "picking the OCR area",
        SelectionStage::Done { .. } => "finished",
        SelectionStage::Cancelled => "cancelled",
    }
}
