//! Straight-alpha RGBA8 compositing for build jobs.

use image::{Rgba, RgbaImage};

pub type StraightRgba8 = [u8; 4];

/// `src` over `dst`, both non-premultiplied.
pub fn over(dst: StraightRgba8, src: StraightRgba8) -> StraightRgba8 {
    if src[3] == 255 {
        return src;
    }
    if src[3] == 0 {
        return dst;
    }

    let sa = f32::from(src[3]) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }

    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = (f32::from(src[i]) * sa + f32::from(dst[i]) * da * (1.0 - sa)) / out_a;
        out[i] = to_u8(c);
    }
    out[3] = to_u8(out_a * 255.0);
    out
}

/// Per-channel `a * m + b * (1 - m)` with `m` the mask alpha.
pub fn masked(a: StraightRgba8, b: StraightRgba8, mask_alpha: u8) -> StraightRgba8 {
    let m = u16::from(mask_alpha);
    let inv = 255 - m;
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = mul_div255(u16::from(a[i]), m).saturating_add(mul_div255(u16::from(b[i]), inv));
    }
    out
}

/// Base over target. Sizes must already match.
pub fn alpha_composite(base: &RgbaImage, target: &RgbaImage) -> RgbaImage {
    debug_assert_eq!(base.dimensions(), target.dimensions());
    RgbaImage::from_fn(base.width(), base.height(), |x, y| {
        Rgba(over(target.get_pixel(x, y).0, base.get_pixel(x, y).0))
    })
}

/// Base where the mask is opaque, target where it is clear.
pub fn mask_composite(base: &RgbaImage, target: &RgbaImage, mask: &RgbaImage) -> RgbaImage {
    debug_assert_eq!(base.dimensions(), target.dimensions());
    debug_assert_eq!(base.dimensions(), mask.dimensions());
    RgbaImage::from_fn(base.width(), base.height(), |x, y| {
        Rgba(masked(
            base.get_pixel(x, y).0,
            target.get_pixel(x, y).0,
            mask.get_pixel(x, y).0[3],
        ))
    })
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_over_opaque_src_replaces_dst() {
        assert_eq!(over([1, 2, 3, 255], [200, 0, 0, 255]), [200, 0, 0, 255]);
    }

    #[test]
    fn test_over_clear_src_is_noop() {
        assert_eq!(over([10, 20, 30, 40], [255, 255, 255, 0]), [10, 20, 30, 40]);
    }

    #[test]
    fn test_over_clear_dst_keeps_src() {
        assert_eq!(over([0, 0, 0, 0], [100, 110, 120, 200]), [100, 110, 120, 200]);
    }

    #[test]
    fn test_over_half_alpha_on_opaque() {
        assert_eq!(over([0, 0, 0, 255], [255, 255, 255, 128]), [128, 128, 128, 255]);
    }

    #[test]
    fn test_masked_extremes() {
        let a = [10, 20, 30, 40];
        let b = [200, 210, 220, 230];
        assert_eq!(masked(a, b, 255), a);
        assert_eq!(masked(a, b, 0), b);
    }

    #[test]
    fn test_composite_images() {
        let base = RgbaImage::from_pixel(2, 1, Rgba([255, 0, 0, 255]));
        let target = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 255, 255]));
        let mut mask = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        mask.put_pixel(0, 0, Rgba([0, 0, 0, 255]));

        let masked = mask_composite(&base, &target, &mask);
        assert_eq!(masked.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(masked.get_pixel(1, 0), &Rgba([0, 0, 255, 255]));

        let straight = alpha_composite(&base, &target);
        assert_eq!(straight.get_pixel(1, 0), &Rgba([255, 0, 0, 255]));
    }
}
