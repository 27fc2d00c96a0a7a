use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{PipelineError, PipelineResult};
use crate::foundation::math::premul_over_in_place;
use crate::script::path::{PathCommand, PathGroup};

/// Fill rule applied to every path group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillRule {
    /// Non-zero winding.
    #[default]
    NonZero,
    /// Even-odd parity.
    EvenOdd,
}

impl FillRule {
    fn to_cpu(self) -> vello_cpu::peniko::Fill {
        match self {
            FillRule::NonZero => vello_cpu::peniko::Fill::NonZero,
            FillRule::EvenOdd => vello_cpu::peniko::Fill::EvenOdd,
        }
    }
}

/// Paints frames onto a locked target bitmap.
///
/// Colors are straight-alpha RGBA8; targets hold premultiplied RGBA8.
pub trait Rasterizer: Send {
    /// Overwrite every pixel of `target` with `rgba`.
    fn clear(&mut self, target: &mut vello_cpu::Pixmap, rgba: [u8; 4]);

    /// Trace `group` and fill it with `rgba` over the current content of `target`.
    ///
    /// Fails with `MalformedPath` before touching `target` when the group is not replayable.
    fn fill(
        &mut self,
        target: &mut vello_cpu::Pixmap,
        group: &PathGroup,
        rgba: [u8; 4],
    ) -> PipelineResult<()>;
}

/// Options for [`CpuRasterizer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuRasterizerOpts {
    /// Fill rule for every group.
    pub fill_rule: FillRule,
}

/// Rasterizer powered by `vello_cpu`.
///
/// `vello_cpu` renders into a fresh buffer, so each group is rendered into a scratch surface and
/// then composited source-over onto the target.
#[derive(Default)]
pub struct CpuRasterizer {
    opts: CpuRasterizerOpts,
    ctx: Option<vello_cpu::RenderContext>,
    scratch: Option<vello_cpu::Pixmap>,
}

impl CpuRasterizer {
    /// Create a rasterizer; context and scratch surface are allocated lazily.
    pub fn new(opts: CpuRasterizerOpts) -> Self {
        Self {
            opts,
            ctx: None,
            scratch: None,
        }
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut vello_cpu::RenderContext, &mut vello_cpu::Pixmap) -> PipelineResult<R>,
    ) -> PipelineResult<R> {
        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            _ => vello_cpu::RenderContext::new(width, height),
        };
        let mut scratch = match self.scratch.take() {
            Some(p) if p.width() == width && p.height() == height => p,
            _ => vello_cpu::Pixmap::new(width, height),
        };
        ctx.reset();
        let out = f(&mut ctx, &mut scratch);
        self.ctx = Some(ctx);
        self.scratch = Some(scratch);
        out
    }
}

impl Rasterizer for CpuRasterizer {
    fn clear(&mut self, target: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
        let px = Rgba8Premul::from_straight(rgba).to_array();
        for dst in target.data_as_u8_slice_mut().chunks_exact_mut(4) {
            dst.copy_from_slice(&px);
        }
    }

    fn fill(
        &mut self,
        target: &mut vello_cpu::Pixmap,
        group: &PathGroup,
        rgba: [u8; 4],
    ) -> PipelineResult<()> {
        group.validate()?;
        let path = group_to_cpu_path(group);
        let fill_rule = self.opts.fill_rule.to_cpu();
        let (width, height) = (target.width(), target.height());

        self.with_ctx_mut(width, height, |ctx, scratch| {
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_fill_rule(fill_rule);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                rgba[0], rgba[1], rgba[2], rgba[3],
            ));
            ctx.fill_path(&path);
            ctx.flush();

            scratch.data_as_u8_slice_mut().fill(0);
            ctx.render_to_pixmap(scratch);

            if !premul_over_in_place(target.data_as_u8_slice_mut(), scratch.data_as_u8_slice()) {
                return Err(PipelineError::rasterization(
                    "scratch surface does not match target size",
                ));
            }
            Ok(())
        })
    }
}

/// Replay validated commands into a `vello_cpu` path.
fn group_to_cpu_path(group: &PathGroup) -> vello_cpu::kurbo::BezPath {
    use vello_cpu::kurbo::Point;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for cmd in group.commands() {
        match *cmd {
            PathCommand::MoveTo { x, y } => out.move_to(Point::new(x, y)),
            PathCommand::LineTo { x, y } => out.line_to(Point::new(x, y)),
            PathCommand::QuadTo {
                x,
                y,
                control_x,
                control_y,
            } => out.quad_to(Point::new(control_x, control_y), Point::new(x, y)),
            PathCommand::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/raster.rs"]
mod tests;
