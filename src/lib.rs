//! Tick-driven animation widgets for small embedded displays.
//!
//! Each widget owns its layout parameters and a few counters, and is polled
//! with `tick()` from the integrator's main loop. Drawing goes through the
//! [`Surface`] trait, so any display stack that can fill rectangles, blit a
//! 1bpp bitmap and print text can host these widgets.

#![cfg_attr(not(test), no_std)]

use embedded_graphics_core::geometry::{Point, Size};
use embedded_graphics_core::pixelcolor::{Rgb565, RgbColor};
use embedded_graphics_core::primitives::Rectangle;

#[cfg(feature = "draw-target")]
use embedded_graphics::{
    mono_font::{MonoFont, MonoTextStyleBuilder},
    text::{Baseline, Text},
};
#[cfg(feature = "draw-target")]
use embedded_graphics_core::{draw_target::DrawTarget, Drawable};

/// Color used for every erase and background fill.
pub const BACKGROUND: Rgb565 = Rgb565::BLACK;

// Height of the text strip under a percent bar, in pixels.
const LABEL_STRIP: u32 = 10;
// Fixed inset of the percentage text from the bar midpoint. The percent
// string never grows wider than this allows.
const PERCENT_TEXT_INSET: i32 = 15;
// Degrees the idle spinner advances per animation step.
const ANGLE_STEP: f32 = 4.0;

/// Offset of a point on a circle of `radius` at `angle_degrees`, truncated
/// toward zero like the integer screen coordinates it feeds.
pub fn polar_offset(radius: u32, angle_degrees: f32) -> (i32, i32) {
    let rad = angle_degrees.to_radians();
    let r = radius as f32;
    ((r * libm::cosf(rad)) as i32, (r * libm::sinf(rad)) as i32)
}

/// Advances an angle accumulator by `step`, wrapping so the result stays
/// below 360.
pub fn advance_angle(angle: f32, step: f32) -> f32 {
    let next = angle + step;
    if next >= 360.0 { next - 360.0 } else { next }
}

// Formats a ratio as an integer percentage, e.g. "42% ". The trailing space
// overwrites stale glyphs left behind by a previously wider value.
fn format_percent(buf: &mut [u8; 8], percent: f32) -> &str {
    let pct = (libm::roundf(percent * 100.0) as u32).min(999);
    let mut len = 0;
    if pct >= 100 {
        buf[len] = b'0' + (pct / 100) as u8;
        len += 1;
    }
    if pct >= 10 {
        buf[len] = b'0' + ((pct / 10) % 10) as u8;
        len += 1;
    }
    buf[len] = b'0' + (pct % 10) as u8;
    buf[len + 1] = b'%';
    buf[len + 2] = b' ';
    core::str::from_utf8(&buf[..len + 3]).unwrap_or("?")
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "Surface",),
    async(feature = "async", keep_self)
)]
/// Draw-call boundary between the widgets and the display stack.
///
/// Implementations are expected to complete one call before the next begins;
/// the widgets assume exclusive, non-overlapping screen regions and issue no
/// clipping of their own.
pub trait Surface {
    type Error;

    /// Fill a rectangular area with a color.
    async fn fill_rect(&mut self, area: Rectangle, color: Rgb565) -> Result<(), Self::Error>;

    /// Draw a one-pixel rectangle outline.
    async fn stroke_rect(&mut self, area: Rectangle, color: Rgb565) -> Result<(), Self::Error>;

    /// Transfer a 1bpp bitmap into `area`, expanding set bits to `fg` and
    /// clear bits to `bg`. `bits` is a linear MSB-first stream, eight pixels
    /// per byte with no row padding.
    async fn blit_1bpp(
        &mut self,
        area: Rectangle,
        bits: &[u8],
        fg: Rgb565,
        bg: Rgb565,
    ) -> Result<(), Self::Error>;

    /// Print `s` with the surface's font, `origin` at the top-left of the
    /// first glyph box.
    async fn text(
        &mut self,
        origin: Point,
        s: &str,
        fg: Rgb565,
        bg: Rgb565,
    ) -> Result<(), Self::Error>;

    /// Rendered width of `s` in pixels.
    fn text_width(&self, s: &str) -> u32;
}

/// Layout of a [`PercentBarHorizontal`].
#[derive(Clone, Copy)]
pub struct PercentBarConfig<'a> {
    pub origin: Point,
    pub width: u32,
    pub height: u32,
    pub outline: Rgb565,
    pub bar: Rgb565,
    pub font: Rgb565,
    /// Label drawn under the left end of the bar by `draw_end_labels`.
    pub left_label: &'a str,
    /// Label drawn right-aligned under the right end of the bar.
    pub right_label: &'a str,
    /// Redraw the percentage text under the bar on every tick.
    pub show_percentage: bool,
}

impl Default for PercentBarConfig<'_> {
    fn default() -> Self {
        Self {
            origin: Point::zero(),
            width: 64,
            height: 8,
            outline: Rgb565::WHITE,
            bar: Rgb565::GREEN,
            font: Rgb565::WHITE,
            left_label: "",
            right_label: "",
            show_percentage: true,
        }
    }
}

/// Horizontal progress bar with optional percentage text and end labels.
///
/// The bar region is only repainted when the percent value changed since the
/// last tick; the percentage text, when enabled, is repainted every tick.
pub struct PercentBarHorizontal<'a> {
    config: PercentBarConfig<'a>,
    percent: f32,
    last_percent: Option<f32>,
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "PercentBarHorizontal",),
    async(feature = "async", keep_self)
)]
impl<'a> PercentBarHorizontal<'a> {
    pub fn new(config: PercentBarConfig<'a>) -> Self {
        Self {
            config,
            percent: 0.0,
            last_percent: None,
        }
    }

    /// Last percent value passed to `tick`.
    pub fn percent(&self) -> f32 {
        self.percent
    }

    /// Updates the stored percent and repaints.
    ///
    /// The outline and inner bar are redrawn only when `percent` differs from
    /// the previous tick. A partial fill paints the filled width and then
    /// background-clears the remainder instead of repainting the whole
    /// region. Values at or below zero clear the bar, values at or above one
    /// fill it.
    pub async fn tick<S: Surface>(
        &mut self,
        surface: &mut S,
        percent: f32,
    ) -> Result<(), S::Error> {
        let c = self.config;
        self.percent = percent;

        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);

            surface
                .stroke_rect(
                    Rectangle::new(c.origin, Size::new(c.width, c.height)),
                    c.outline,
                )
                .await?;

            let inner = c.width as i32 - 2;
            let fill = libm::roundf(inner as f32 * percent) as i32;
            let inner_origin = c.origin + Point::new(1, 1);
            let inner_size = Size::new(c.width - 2, c.height - 2);

            if fill > 0 && percent < 1.0 {
                surface
                    .fill_rect(
                        Rectangle::new(inner_origin, Size::new(fill as u32, c.height - 2)),
                        c.bar,
                    )
                    .await?;
                let rest = inner - fill;
                if rest > 0 {
                    surface
                        .fill_rect(
                            Rectangle::new(
                                inner_origin + Point::new(fill, 0),
                                Size::new(rest as u32, c.height - 2),
                            ),
                            BACKGROUND,
                        )
                        .await?;
                }
            } else if fill <= 0 {
                surface
                    .fill_rect(Rectangle::new(inner_origin, inner_size), BACKGROUND)
                    .await?;
            } else {
                surface
                    .fill_rect(Rectangle::new(inner_origin, inner_size), c.bar)
                    .await?;
            }
        }

        // Text is repainted unconditionally while the bar above is gated on
        // the changed check.
        if c.show_percentage && percent >= 0.0 {
            let mut buf = [0u8; 8];
            let s = format_percent(&mut buf, percent);
            surface
                .text(
                    Point::new(
                        c.origin.x + (c.width / 2) as i32 - PERCENT_TEXT_INSET,
                        c.origin.y + c.height as i32 + 1,
                    ),
                    s,
                    c.font,
                    BACKGROUND,
                )
                .await?;
        }
        Ok(())
    }

    /// One-time draw of the fixed labels under the bar ends.
    pub async fn draw_end_labels<S: Surface>(&self, surface: &mut S) -> Result<(), S::Error> {
        let c = self.config;
        let base_y = c.origin.y + c.height as i32;
        surface
            .text(
                Point::new(c.origin.x, base_y),
                c.left_label,
                c.font,
                BACKGROUND,
            )
            .await?;
        let right_x = c.origin.x + c.width as i32 - surface.text_width(c.right_label) as i32;
        surface
            .text(Point::new(right_x, base_y), c.right_label, c.font, BACKGROUND)
            .await?;
        Ok(())
    }

    /// Clears the bar and the text strip under it.
    pub async fn erase<S: Surface>(&self, surface: &mut S) -> Result<(), S::Error> {
        let c = self.config;
        surface
            .fill_rect(
                Rectangle::new(c.origin, Size::new(c.width, c.height + LABEL_STRIP)),
                BACKGROUND,
            )
            .await
    }
}

/// Layout of an [`IdleCircle`].
#[derive(Clone, Copy)]
pub struct IdleCircleConfig {
    pub center: Point,
    pub radius: u32,
    /// Side length of the square dots.
    pub thickness: u32,
    pub trail: Rgb565,
    pub head: Rgb565,
    /// Ticks per animation step. With 4, the spinner advances on every
    /// fourth call to `tick`.
    pub cadence: u32,
}

impl Default for IdleCircleConfig {
    fn default() -> Self {
        Self {
            center: Point::zero(),
            radius: 10,
            thickness: 3,
            trail: Rgb565::new(15, 31, 15),
            head: Rgb565::WHITE,
            cadence: 4,
        }
    }
}

/// Rotating three-dot idle spinner.
///
/// Each step erases the oldest of three dots and repaints the other two, so
/// a fading trail costs three rectangle fills instead of an arc repaint.
pub struct IdleCircle {
    config: IdleCircleConfig,
    ticks: u32,
    angle: f32,
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "IdleCircle",),
    async(feature = "async", keep_self)
)]
impl IdleCircle {
    pub fn new(config: IdleCircleConfig) -> Self {
        Self {
            config,
            ticks: 0,
            angle: 0.0,
        }
    }

    /// Current angle accumulator in degrees, always in `[0, 360)`.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Counts the tick and, on every `cadence`-th call, advances the spinner
    /// by one step.
    pub async fn tick<S: Surface>(&mut self, surface: &mut S) -> Result<(), S::Error> {
        self.ticks += 1;
        if self.ticks < self.config.cadence {
            return Ok(());
        }
        self.ticks = 0;

        let c = self.config;
        let dots = [
            (self.angle - 2.0 * ANGLE_STEP, BACKGROUND),
            (self.angle - ANGLE_STEP, c.trail),
            (self.angle, c.head),
        ];
        for (angle, color) in dots {
            let (dx, dy) = polar_offset(c.radius, angle);
            let corner = Point::new(
                c.center.x + dx - (c.thickness as i32) / 2,
                c.center.y + dy - (c.thickness as i32) / 2,
            );
            surface
                .fill_rect(
                    Rectangle::new(corner, Size::new(c.thickness, c.thickness)),
                    color,
                )
                .await?;
        }

        self.angle = advance_angle(self.angle, ANGLE_STEP);
        Ok(())
    }

    /// Clears the bounding square of the circle plus the dot overhang, a
    /// square of side `2 * radius + thickness + 1` around the center.
    pub async fn erase<S: Surface>(&self, surface: &mut S) -> Result<(), S::Error> {
        let c = self.config;
        let margin = (c.thickness / 2) as i32;
        let corner = Point::new(
            c.center.x - c.radius as i32 - margin,
            c.center.y - c.radius as i32 - margin,
        );
        let side = 2 * c.radius + c.thickness + 1;
        surface
            .fill_rect(Rectangle::new(corner, Size::new(side, side)), BACKGROUND)
            .await
    }
}

/// Layout of a [`FallDownSprite`].
#[derive(Clone, Copy)]
pub struct FallDownSpriteConfig<'a> {
    pub origin: Point,
    /// Pixel size of one sprite frame.
    pub size: Size,
    /// 1bpp sprite bitmap in the `blit_1bpp` packing. Borrowed for the
    /// lifetime of the widget; the caller keeps ownership.
    pub bitmap: &'a [u8],
    /// Frames per falling cycle.
    pub frame_count: u32,
    /// Horizontal wobble applied on odd frames.
    pub x_spacing: i32,
    /// Vertical distance travelled per frame.
    pub y_spacing: i32,
    /// Ticks per frame advance.
    pub speed: u32,
    pub color: Rgb565,
}

impl Default for FallDownSpriteConfig<'_> {
    fn default() -> Self {
        Self {
            origin: Point::zero(),
            size: Size::new(5, 8),
            bitmap: &[],
            frame_count: 8,
            x_spacing: 5,
            y_spacing: 2,
            speed: 110,
            color: Rgb565::WHITE,
        }
    }
}

/// Sprite that steps down the screen, wobbling sideways, then signals the
/// end of the cycle and rewinds.
pub struct FallDownSprite<'a> {
    config: FallDownSpriteConfig<'a>,
    ticks: u32,
    frame: u32,
    pos: Point,
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "FallDownSprite",),
    async(feature = "async", keep_self)
)]
impl<'a> FallDownSprite<'a> {
    pub fn new(config: FallDownSpriteConfig<'a>) -> Self {
        Self {
            config,
            ticks: 0,
            frame: 0,
            pos: config.origin,
        }
    }

    /// Counts the tick and, on every `speed`-th call, advances the sprite by
    /// one frame.
    ///
    /// Returns `true` once per cycle, on the advance that reaches
    /// `frame_count`; counters and position rewind to their initial values so
    /// the next tick starts a fresh cycle. The caller uses the signal to
    /// re-trigger or retire the animation.
    pub async fn tick<S: Surface>(&mut self, surface: &mut S) -> Result<bool, S::Error> {
        self.ticks += 1;
        if self.ticks < self.config.speed {
            return Ok(false);
        }
        self.ticks = 0;
        self.frame += 1;

        let c = self.config;
        surface
            .fill_rect(Rectangle::new(self.pos, c.size), BACKGROUND)
            .await?;

        // Odd frames sit x_spacing to the right, even frames at the origin
        // column. Every frame drops by y_spacing.
        self.pos = Point::new(
            c.origin.x + (self.frame % 2) as i32 * c.x_spacing,
            c.origin.y + self.frame as i32 * c.y_spacing,
        );

        if self.frame == c.frame_count {
            self.frame = 0;
            self.pos = c.origin;
            return Ok(true);
        }

        surface
            .blit_1bpp(
                Rectangle::new(self.pos, c.size),
                c.bitmap,
                c.color,
                BACKGROUND,
            )
            .await?;
        Ok(false)
    }

    /// Clears the full travel envelope of the sprite at its origin.
    pub async fn erase<S: Surface>(&self, surface: &mut S) -> Result<(), S::Error> {
        let c = self.config;
        let envelope = Size::new(
            (c.size.width as i32 + c.x_spacing).unsigned_abs(),
            (c.size.height as i32 + c.frame_count as i32 * c.y_spacing).unsigned_abs(),
        );
        surface
            .fill_rect(Rectangle::new(c.origin, envelope), BACKGROUND)
            .await
    }
}

/// [`Surface`] implementation for any [`DrawTarget`] with `Rgb565` color,
/// using a monospace font for the text primitives.
#[cfg(feature = "draw-target")]
pub struct EgSurface<D> {
    target: D,
    font: &'static MonoFont<'static>,
}

#[cfg(feature = "draw-target")]
impl<D: DrawTarget<Color = Rgb565>> EgSurface<D> {
    pub fn new(target: D, font: &'static MonoFont<'static>) -> Self {
        Self { target, font }
    }

    /// Gives the wrapped draw target back.
    pub fn release(self) -> D {
        self.target
    }

    fn fill_clipped(&mut self, area: Rectangle, color: Rgb565) -> Result<(), D::Error> {
        let clipped = area.intersection(&self.target.bounding_box());
        if clipped.is_zero_sized() {
            return Ok(());
        }
        self.target.fill_solid(&clipped, color)
    }
}

#[cfg(feature = "draw-target")]
#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<D: DrawTarget<Color = Rgb565>> Surface for EgSurface<D> {
    type Error = D::Error;

    async fn fill_rect(&mut self, area: Rectangle, color: Rgb565) -> Result<(), Self::Error> {
        self.fill_clipped(area, color)
    }

    async fn stroke_rect(&mut self, area: Rectangle, color: Rgb565) -> Result<(), Self::Error> {
        let Size { width, height } = area.size;
        if width == 0 || height == 0 {
            return Ok(());
        }
        let Point { x, y } = area.top_left;
        self.fill_clipped(Rectangle::new(area.top_left, Size::new(width, 1)), color)?;
        if height > 1 {
            self.fill_clipped(
                Rectangle::new(Point::new(x, y + height as i32 - 1), Size::new(width, 1)),
                color,
            )?;
        }
        if height > 2 {
            let side = Size::new(1, height - 2);
            self.fill_clipped(Rectangle::new(Point::new(x, y + 1), side), color)?;
            self.fill_clipped(
                Rectangle::new(Point::new(x + width as i32 - 1, y + 1), side),
                color,
            )?;
        }
        Ok(())
    }

    async fn blit_1bpp(
        &mut self,
        area: Rectangle,
        bits: &[u8],
        fg: Rgb565,
        bg: Rgb565,
    ) -> Result<(), Self::Error> {
        let pixels = area.size.width * area.size.height;
        let colors = (0..pixels).map(|i| {
            let byte = bits.get((i / 8) as usize).copied().unwrap_or(0);
            if byte & (0x80 >> (i % 8)) != 0 { fg } else { bg }
        });
        self.target.fill_contiguous(&area, colors)
    }

    async fn text(
        &mut self,
        origin: Point,
        s: &str,
        fg: Rgb565,
        bg: Rgb565,
    ) -> Result<(), Self::Error> {
        let style = MonoTextStyleBuilder::new()
            .font(self.font)
            .text_color(fg)
            .background_color(bg)
            .build();
        Text::with_baseline(s, origin, style, Baseline::Top).draw(&mut self.target)?;
        Ok(())
    }

    fn text_width(&self, s: &str) -> u32 {
        let advance = self.font.character_size.width + self.font.character_spacing;
        s.chars().count() as u32 * advance
    }
}
