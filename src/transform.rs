//! Transform Pipeline - ordered on-load operations
//!
//! Each operation is first planned into a `TransformStep` from the current
//! image size (pure geometry), then applied to pixels. The output of one
//! step is the input of the next.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::Serialize;

use crate::asset::{AppliedOperation, RawAsset, TransformedAsset};
use crate::error::{BuildError, Result};
use crate::license::License;
use crate::logging::{PhaseLogger, Severity};
use crate::operation::{Amount, Operation, OperationKind};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TransformStep {
    /// Half-open box `[left, right) x [top, bottom)`; may extend past the
    /// image, the overhang is transparent.
    Crop { left: i64, top: i64, right: i64, bottom: i64 },
    Resize { width: u32, height: u32 },
    Tile { width: u32, height: u32 },
    /// Counter-clockwise, about the centre, canvas size unchanged.
    Rotate { degrees: f64 },
}

impl TransformStep {
    pub fn output_size(&self, current: (u32, u32)) -> (u32, u32) {
        match *self {
            TransformStep::Crop { left, top, right, bottom } => {
                crop_extent(left, top, right, bottom).unwrap_or((0, 0))
            }
            TransformStep::Resize { width, height } | TransformStep::Tile { width, height } => {
                (width, height)
            }
            TransformStep::Rotate { .. } => current,
        }
    }
}

/// Work out what `operation` does to an image of size `current`.
///
/// Resolution-mode rotation is logged at SEVERE, which aborts the run.
pub fn plan_step(
    asset: &str,
    operation: &Operation,
    current: (u32, u32),
    logger: &PhaseLogger,
) -> Result<TransformStep> {
    let (width, height) = current;
    match (operation.kind, &operation.amount) {
        (OperationKind::Crop, Amount::Resolution(res)) => {
            let (cx, cy) = (i64::from(width / 2), i64::from(height / 2));
            let half_w = res.x.map_or(0, |x| i64::from(x / 2));
            let half_h = res.y.map_or(0, |y| i64::from(y / 2));

            let (left, right) = if half_w != 0 { (cx - half_w, cx + half_w) } else { (0, i64::from(width)) };
            let (top, bottom) = if half_h != 0 { (cy - half_h, cy + half_h) } else { (0, i64::from(height)) };
            Ok(TransformStep::Crop { left, top, right, bottom })
        }
        (OperationKind::Crop, Amount::PixelBox(pb)) => {
            if pb.right <= pb.left || pb.bottom <= pb.top {
                return Err(BuildError::malformed(
                    asset,
                    format!("crop box {:?} is empty", pb.as_tuple()),
                ));
            }
            if crop_extent(pb.left, pb.top, pb.right, pb.bottom).is_none() {
                return Err(BuildError::malformed(
                    asset,
                    format!("crop box {:?} is too large", pb.as_tuple()),
                ));
            }
            Ok(TransformStep::Crop {
                left: pb.left,
                top: pb.top,
                right: pb.right,
                bottom: pb.bottom,
            })
        }
        (OperationKind::Scale, Amount::Resolution(res)) => {
            let (width, height) = res.or_size(current);
            Ok(TransformStep::Resize { width, height })
        }
        (OperationKind::Scale, Amount::PixelBox(pb)) => {
            let (width, height) = multiplied(asset, current, pb.right, pb.bottom)?;
            Ok(TransformStep::Resize { width, height })
        }
        (OperationKind::Tile, Amount::Resolution(res)) => {
            let (width, height) = res.or_size(current);
            Ok(TransformStep::Tile { width, height })
        }
        (OperationKind::Tile, Amount::PixelBox(pb)) => {
            let (width, height) = multiplied(asset, current, pb.right, pb.bottom)?;
            Ok(TransformStep::Tile { width, height })
        }
        (OperationKind::Rotate, Amount::PixelBox(pb)) => Ok(TransformStep::Rotate {
            degrees: pb.left as f64,
        }),
        (OperationKind::Rotate, Amount::Resolution(_)) => {
            let message = format!("Attempted a rotation of {} by resolution.", asset);
            logger.log(Severity::Severe, message.clone())?;
            Err(BuildError::UnrecoverableState { severity: Severity::Severe, message })
        }
        (OperationKind::Translate, _) => Err(BuildError::UnrecognisedOperation {
            asset: asset.to_string(),
            operation: operation.kind.to_string(),
        }),
    }
}

/// `None` when a side is negative or does not fit in a `u32`.
fn crop_extent(left: i64, top: i64, right: i64, bottom: i64) -> Option<(u32, u32)> {
    let width = u32::try_from(right.checked_sub(left)?).ok()?;
    let height = u32::try_from(bottom.checked_sub(top)?).ok()?;
    Some((width, height))
}

/// In pixel-box mode SCALE and TILE read `right`/`bottom` as multipliers.
fn multiplied(asset: &str, current: (u32, u32), mx: i64, my: i64) -> Result<(u32, u32)> {
    let scale = |size: u32, factor: i64| -> Option<u32> {
        let product = i64::from(size).checked_mul(factor)?;
        u32::try_from(product).ok().filter(|v| *v > 0)
    };
    match (scale(current.0, mx), scale(current.1, my)) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(BuildError::malformed(
            asset,
            format!("multipliers ({}, {}) on {:?} give no usable size", mx, my, current),
        )),
    }
}

pub fn apply_step(image: &RgbaImage, step: &TransformStep) -> RgbaImage {
    match *step {
        TransformStep::Crop { left, top, .. } => {
            let (width, height) = step.output_size(image.dimensions());
            let mut canvas = RgbaImage::from_pixel(width, height, TRANSPARENT);
            imageops::replace(&mut canvas, image, left.saturating_neg(), top.saturating_neg());
            canvas
        }
        TransformStep::Resize { width, height } => {
            imageops::resize(image, width, height, FilterType::CatmullRom)
        }
        TransformStep::Tile { width, height } => {
            let mut canvas = RgbaImage::from_pixel(width, height, TRANSPARENT);
            let (tile_w, tile_h) = image.dimensions();
            if tile_w == 0 || tile_h == 0 {
                return canvas;
            }
            for x in (0..width).step_by(tile_w as usize) {
                for y in (0..height).step_by(tile_h as usize) {
                    imageops::replace(&mut canvas, image, i64::from(x), i64::from(y));
                }
            }
            canvas
        }
        TransformStep::Rotate { degrees } => rotate_about_centre(image, degrees),
    }
}

/// Nearest-neighbour inverse mapping; pixels that map outside the source
/// are transparent.
fn rotate_about_centre(image: &RgbaImage, degrees: f64) -> RgbaImage {
    let (width, height) = image.dimensions();
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (cx, cy) = (f64::from(width) / 2.0, f64::from(height) / 2.0);

    RgbaImage::from_fn(width, height, |x, y| {
        let dx = f64::from(x) + 0.5 - cx;
        let dy = f64::from(y) + 0.5 - cy;
        let sx = (cos * dx - sin * dy + cx).floor();
        let sy = (sin * dx + cos * dy + cy).floor();
        if sx < 0.0 || sy < 0.0 || sx >= f64::from(width) || sy >= f64::from(height) {
            TRANSPARENT
        } else {
            *image.get_pixel(sx as u32, sy as u32)
        }
    })
}

pub struct TransformPipeline {
    logger: PhaseLogger,
}

impl TransformPipeline {
    pub fn new(logger: PhaseLogger) -> Self {
        Self { logger }
    }

    /// Run `raw` through its operations and resolve its license.
    pub fn run<P, V>(&self, raw: &RawAsset, mod_context: &[(P, V)]) -> Result<TransformedAsset>
    where
        P: AsRef<str>,
        V: AsRef<str>,
    {
        let license = License::new(raw.license_spec(), mod_context)?;
        let source = raw.image()?;

        let mut current: Option<RgbaImage> = None;
        let mut applied = Vec::with_capacity(raw.operations().len());

        for operation in raw.operations() {
            let input = current.as_ref().unwrap_or(source);
            let step = plan_step(raw.nickname(), operation, input.dimensions(), &self.logger)?;
            let output = apply_step(input, &step);

            self.logger.low(format!(
                "Applied {} (order {}) to {}: {:?} -> {:?}",
                operation.kind,
                operation.order,
                raw.nickname(),
                input.dimensions(),
                output.dimensions()
            ));
            applied.push(AppliedOperation {
                order: operation.order,
                kind: operation.kind,
                step,
                size: output.dimensions(),
            });
            current = Some(output);
        }

        let image = current.unwrap_or_else(|| source.clone());
        Ok(TransformedAsset::new(raw, license, Arc::new(image), applied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogPhase, LogTrail};
    use crate::operation::{EffectResolution, PixelBox};

    fn op(kind: OperationKind, amount: Amount) -> Operation {
        Operation { order: 0, kind, amount }
    }

    fn res(x: Option<u32>, y: Option<u32>) -> Amount {
        Amount::Resolution(EffectResolution { x, y })
    }

    fn boxed(values: &[i64]) -> Amount {
        Amount::PixelBox(PixelBox::from_values(values).unwrap())
    }

    fn logger() -> PhaseLogger {
        LogTrail::new().logger(LogPhase::Modify)
    }

    #[test]
    fn test_crop_by_resolution_is_centred() {
        let step = plan_step("bg", &op(OperationKind::Crop, res(Some(32), Some(16))), (100, 50), &logger()).unwrap();
        assert_eq!(step, TransformStep::Crop { left: 34, top: 17, right: 66, bottom: 33 });
        assert_eq!(step.output_size((100, 50)), (32, 16));
    }

    #[test]
    fn test_crop_unset_axis_keeps_full_extent() {
        let step = plan_step("bg", &op(OperationKind::Crop, res(None, Some(10))), (40, 40), &logger()).unwrap();
        assert_eq!(step, TransformStep::Crop { left: 0, top: 15, right: 40, bottom: 25 });
    }

    #[test]
    fn test_crop_by_box_is_verbatim() {
        let step = plan_step("bg", &op(OperationKind::Crop, boxed(&[1, 2, 3, 4])), (10, 10), &logger()).unwrap();
        assert_eq!(step, TransformStep::Crop { left: 1, top: 2, right: 3, bottom: 4 });

        let empty = plan_step("bg", &op(OperationKind::Crop, boxed(&[5])), (10, 10), &logger());
        assert!(matches!(empty, Err(BuildError::MalformedOperation { .. })));
    }

    #[test]
    fn test_crop_box_wider_than_u32_is_rejected() {
        let wide = plan_step("bg", &op(OperationKind::Crop, boxed(&[0, 0, 4_294_967_298, 2])), (4, 4), &logger());
        assert!(matches!(wide, Err(BuildError::MalformedOperation { ref reason, .. }) if reason.contains("too large")));

        let overflow = plan_step("bg", &op(OperationKind::Crop, boxed(&[0, i64::MIN, 2, i64::MAX])), (4, 4), &logger());
        assert!(matches!(overflow, Err(BuildError::MalformedOperation { .. })));

        let step = TransformStep::Crop { left: 0, top: 0, right: 4_294_967_298, bottom: 2 };
        assert_eq!(step.output_size((4, 4)), (0, 0));
    }

    #[test]
    fn test_scale_modes() {
        let by_res = plan_step("bg", &op(OperationKind::Scale, res(None, Some(8))), (20, 30), &logger()).unwrap();
        assert_eq!(by_res, TransformStep::Resize { width: 20, height: 8 });

        let by_box = plan_step("bg", &op(OperationKind::Scale, boxed(&[2, 3])), (20, 30), &logger()).unwrap();
        assert_eq!(by_box, TransformStep::Resize { width: 40, height: 90 });

        let zero = plan_step("bg", &op(OperationKind::Scale, boxed(&[0, 3])), (20, 30), &logger());
        assert!(zero.is_err());
    }

    #[test]
    fn test_tile_by_box_multiplies() {
        let step = plan_step("bg", &op(OperationKind::Tile, boxed(&[3, 2])), (4, 5), &logger()).unwrap();
        assert_eq!(step, TransformStep::Tile { width: 12, height: 10 });
    }

    #[test]
    fn test_rotate_by_resolution_escalates() {
        let trail = LogTrail::new();
        let result = plan_step(
            "bg",
            &op(OperationKind::Rotate, res(Some(4), Some(4))),
            (4, 4),
            &trail.logger(LogPhase::Modify),
        );
        assert!(matches!(result, Err(BuildError::UnrecoverableState { severity: Severity::Severe, .. })));
        assert_eq!(trail.count_at_least(Severity::Severe), 1);
    }

    #[test]
    fn test_translate_is_unrecognised() {
        let result = plan_step("bg", &op(OperationKind::Translate, boxed(&[1, 1])), (4, 4), &logger());
        assert!(matches!(result, Err(BuildError::UnrecognisedOperation { .. })));
    }

    #[test]
    fn test_tile_repeats_source() {
        let mut src = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        src.put_pixel(0, 0, Rgba([255, 0, 0, 255]));

        let tiled = apply_step(&src, &TransformStep::Tile { width: 5, height: 2 });
        assert_eq!(tiled.dimensions(), (5, 2));
        for y in 0..2 {
            assert_eq!(tiled.get_pixel(0, y), &Rgba([255, 0, 0, 255]));
            assert_eq!(tiled.get_pixel(2, y), &Rgba([255, 0, 0, 255]));
            assert_eq!(tiled.get_pixel(4, y), &Rgba([255, 0, 0, 255]));
            assert_eq!(tiled.get_pixel(3, y), &Rgba([0, 0, 0, 255]));
        }
    }

    #[test]
    fn test_crop_overhang_is_transparent() {
        let src = RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255]));
        let out = apply_step(&src, &TransformStep::Crop { left: -1, top: 0, right: 2, bottom: 2 });
        assert_eq!(out.dimensions(), (3, 2));
        assert_eq!(out.get_pixel(0, 0), &TRANSPARENT);
        assert_eq!(out.get_pixel(1, 0), &Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn test_rotate_half_turn_mirrors() {
        let mut src = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 255, 255]));
        src.put_pixel(0, 0, Rgba([255, 0, 0, 255]));

        let out = apply_step(&src, &TransformStep::Rotate { degrees: 180.0 });
        assert_eq!(out.get_pixel(1, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));

        let same = apply_step(&src, &TransformStep::Rotate { degrees: 0.0 });
        assert_eq!(same, src);
    }
}
