use std::cmp::Ordering;

use crate::foundation::error::{PipelineError, PipelineResult};

pub use kurbo::{BezPath, Point};

/// Absolute 0-based frame index in presentation order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32, // must be > 0
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> PipelineResult<Self> {
        if den == 0 {
            return Err(PipelineError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(PipelineError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Integer frame rate, `n/1`.
    pub fn integer(n: u32) -> PipelineResult<Self> {
        Self::new(n, 1)
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Exact presentation time of `frame` at this rate.
    pub fn presentation_time(self, frame: FrameIndex) -> PresentationTime {
        PresentationTime::for_frame(frame, self)
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self { num: 30, den: 1 }
    }
}

/// Exact rational timestamp `value / timescale` seconds.
///
/// Frame `i` at `num/den` fps is `i * den / num`, so consecutive frames of one session share a
/// timescale and never accumulate rounding error. Comparison is by cross-multiplication, so
/// `1/10` and `2/20` are equal.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct PresentationTime {
    /// Numerator in `1/timescale` second units.
    pub value: u64,
    /// Units per second, non-zero.
    pub timescale: u32,
}

impl PresentationTime {
    /// Time zero.
    pub const ZERO: Self = Self {
        value: 0,
        timescale: 1,
    };

    /// Create a validated timestamp.
    pub fn new(value: u64, timescale: u32) -> PipelineResult<Self> {
        if timescale == 0 {
            return Err(PipelineError::validation(
                "PresentationTime timescale must be > 0",
            ));
        }
        Ok(Self { value, timescale })
    }

    /// Presentation time of `frame` at `fps`: `frame * den / num`.
    pub fn for_frame(frame: FrameIndex, fps: Fps) -> Self {
        Self {
            value: frame.0.saturating_mul(u64::from(fps.den)),
            timescale: fps.num.max(1),
        }
    }

    /// Lossy seconds, for display and logging only.
    pub fn as_secs_f64(self) -> f64 {
        self.value as f64 / f64::from(self.timescale.max(1))
    }

    fn cross(self, other: Self) -> (u128, u128) {
        (
            u128::from(self.value) * u128::from(other.timescale),
            u128::from(other.value) * u128::from(self.timescale),
        )
    }
}

impl PartialEq for PresentationTime {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = self.cross(*other);
        a == b
    }
}

impl Eq for PresentationTime {}

impl PartialOrd for PresentationTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PresentationTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = self.cross(*other);
        a.cmp(&b)
    }
}

impl std::fmt::Display for PresentationTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}s", self.value, self.timescale)
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Dimensions as the `u16` pair `vello_cpu` surfaces require.
    pub fn to_u16(self) -> PipelineResult<(u16, u16)> {
        let w: u16 = self
            .width
            .try_into()
            .map_err(|_| PipelineError::validation("canvas width exceeds u16"))?;
        let h: u16 = self
            .height
            .try_into()
            .map_err(|_| PipelineError::validation("canvas height exceeds u16"))?;
        Ok((w, h))
    }
}

/// Fixed bitmap layout of pooled render targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 32-bit RGBA, premultiplied alpha, row-major, tightly packed.
    #[default]
    Rgba8Premul,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8Premul => 4,
        }
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Premultiply a straight `[r, g, b, a]` array.
    pub fn from_straight(rgba: [u8; 4]) -> Self {
        let [r, g, b, a] = rgba;
        Self::from_straight_rgba(r, g, b, a)
    }

    /// Bytes in pixel memory order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
