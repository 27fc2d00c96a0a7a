use std::path::Path;

use anyhow::Context as _;
use kurbo::{CubicBez, PathEl, Point};

use crate::foundation::error::{PipelineError, PipelineResult};

/// Tolerance used when approximating cubic segments with quadratics.
const CUBIC_TO_QUAD_ACCURACY: f64 = 0.1;

/// One outline command in target bitmap coordinates.
///
/// Each variant carries exactly the coordinates it needs.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PathCommand {
    /// Start a new sub-path at `(x, y)`.
    MoveTo {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
    },
    /// Straight edge to `(x, y)`.
    LineTo {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
    },
    /// Quadratic Bezier edge to `(x, y)` through the control point.
    QuadTo {
        /// End point X.
        x: f64,
        /// End point Y.
        y: f64,
        /// Control point X.
        control_x: f64,
        /// Control point Y.
        control_y: f64,
    },
    /// Edge back to the most recent `MoveTo` point.
    ClosePath,
}

impl PathCommand {
    fn is_finite(&self) -> bool {
        match *self {
            PathCommand::MoveTo { x, y } | PathCommand::LineTo { x, y } => {
                x.is_finite() && y.is_finite()
            }
            PathCommand::QuadTo {
                x,
                y,
                control_x,
                control_y,
            } => x.is_finite() && y.is_finite() && control_x.is_finite() && control_y.is_finite(),
            PathCommand::ClosePath => true,
        }
    }
}

/// Ordered commands filled as one sub-shape.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PathGroup {
    commands: Vec<PathCommand>,
}

impl PathGroup {
    /// Wrap a command list. Validation happens at rasterization time.
    pub fn new(commands: Vec<PathCommand>) -> Self {
        Self { commands }
    }

    /// Axis-aligned closed rectangle.
    pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(vec![
            PathCommand::MoveTo { x: x0, y: y0 },
            PathCommand::LineTo { x: x1, y: y0 },
            PathCommand::LineTo { x: x1, y: y1 },
            PathCommand::LineTo { x: x0, y: y1 },
            PathCommand::ClosePath,
        ])
    }

    /// Parse SVG path data.
    ///
    /// All sub-paths stay in one group so holes (e.g. in glyph outlines) resolve under the
    /// rasterizer's fill rule. Cubic segments are approximated with quadratics.
    pub fn from_svg(d: &str) -> PipelineResult<Self> {
        let bp = kurbo::BezPath::from_svg(d.trim())
            .map_err(|e| PipelineError::malformed_path(format!("invalid svg path data: {e}")))?;

        let mut commands = Vec::new();
        let mut current = Point::ZERO;
        let mut subpath_start = Point::ZERO;
        for el in bp.elements() {
            match *el {
                PathEl::MoveTo(p) => {
                    commands.push(PathCommand::MoveTo { x: p.x, y: p.y });
                    current = p;
                    subpath_start = p;
                }
                PathEl::LineTo(p) => {
                    commands.push(PathCommand::LineTo { x: p.x, y: p.y });
                    current = p;
                }
                PathEl::QuadTo(c, p) => {
                    commands.push(quad(c, p));
                    current = p;
                }
                PathEl::CurveTo(c1, c2, p) => {
                    let cubic = CubicBez::new(current, c1, c2, p);
                    for (_, _, q) in cubic.to_quads(CUBIC_TO_QUAD_ACCURACY) {
                        commands.push(quad(q.p1, q.p2));
                    }
                    current = p;
                }
                PathEl::ClosePath => {
                    commands.push(PathCommand::ClosePath);
                    current = subpath_start;
                }
            }
        }
        Ok(Self { commands })
    }

    /// Borrow the commands.
    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    /// Return `true` when the group has no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Check the group is a replayable outline.
    ///
    /// The first command must be `MoveTo`, which also guarantees every `ClosePath` has a sub-path
    /// start to return to. Coordinates must be finite.
    pub fn validate(&self) -> PipelineResult<()> {
        let Some(first) = self.commands.first() else {
            return Err(PipelineError::malformed_path("path group is empty"));
        };
        if !matches!(first, PathCommand::MoveTo { .. }) {
            return Err(PipelineError::malformed_path(format!(
                "path group must start with move_to, got {first:?}"
            )));
        }
        if let Some(i) = self.commands.iter().position(|c| !c.is_finite()) {
            return Err(PipelineError::malformed_path(format!(
                "command {i} has a non-finite coordinate"
            )));
        }
        Ok(())
    }
}

fn quad(control: Point, end: Point) -> PathCommand {
    PathCommand::QuadTo {
        x: end.x,
        y: end.y,
        control_x: control.x,
        control_y: control.y,
    }
}

/// Everything painted for one output frame. An empty descriptor is a background-only frame.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct FrameDescriptor {
    groups: Vec<PathGroup>,
}

impl FrameDescriptor {
    /// Wrap a group list.
    pub fn new(groups: Vec<PathGroup>) -> Self {
        Self { groups }
    }

    /// Background-only frame.
    pub fn blank() -> Self {
        Self::default()
    }

    /// Borrow the groups in paint order.
    pub fn groups(&self) -> &[PathGroup] {
        &self.groups
    }
}

/// Ordered frame descriptors; index order is presentation order.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameScript {
    /// Frames in presentation order.
    pub frames: Vec<FrameDescriptor>,
}

impl FrameScript {
    /// Wrap a frame list.
    pub fn new(frames: Vec<FrameDescriptor>) -> Self {
        Self { frames }
    }

    /// Build a cumulative reveal: frame `i` paints the first `(i + 1) * groups_per_frame` groups.
    ///
    /// The last frame always paints every group. An empty `groups` list yields an empty script.
    pub fn progressive(groups: &[PathGroup], groups_per_frame: usize) -> PipelineResult<Self> {
        if groups_per_frame == 0 {
            return Err(PipelineError::validation(
                "progressive reveal needs groups_per_frame > 0",
            ));
        }
        let frames = (0..groups.len().div_ceil(groups_per_frame))
            .map(|i| {
                let end = ((i + 1) * groups_per_frame).min(groups.len());
                FrameDescriptor::new(groups[..end].to_vec())
            })
            .collect();
        Ok(Self { frames })
    }

    /// Parse a script from JSON.
    pub fn from_json_str(s: &str) -> PipelineResult<Self> {
        serde_json::from_str(s).map_err(|e| PipelineError::serde(e.to_string()))
    }

    /// Load a script from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read frame script '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    /// Number of output frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Return `true` when the script has no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Validate every group up front.
    ///
    /// Sessions do not require this; a malformed group aborts the session when it is reached.
    pub fn validate(&self) -> PipelineResult<()> {
        for (fi, frame) in self.frames.iter().enumerate() {
            for (gi, group) in frame.groups().iter().enumerate() {
                group.validate().map_err(|e| match e {
                    PipelineError::MalformedPath(msg) => PipelineError::malformed_path(format!(
                        "frame {fi} group {gi}: {msg}"
                    )),
                    other => other,
                })?;
            }
        }
        Ok(())
    }
}

impl From<Vec<FrameDescriptor>> for FrameScript {
    fn from(frames: Vec<FrameDescriptor>) -> Self {
        Self { frames }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/script/path.rs"]
mod tests;
