//! CPU box blur
//!
//! Multi-pass separable box blur approximating a gaussian. Operates on
//! premultiplied RGBA, so averaging all four channels keeps every pixel valid.
//! Pixels outside the surface count as transparent.

use tiny_skia::Pixmap;

/// Passes used to approximate a gaussian
pub const PASSES: usize = 3;

/// Box radius producing roughly the look of a `radius_px` filter blur
pub fn box_radius(radius_px: f32) -> usize {
    if radius_px < 0.5 {
        0
    } else {
        (radius_px / 2.0).round().max(1.0) as usize
    }
}

/// Blurred copy of `pixmap`
pub fn blurred(pixmap: &Pixmap, radius_px: f32) -> Pixmap {
    let mut copy = pixmap.clone();
    box_blur(&mut copy, box_radius(radius_px), PASSES);
    copy
}

/// Blur `pixmap` in place
pub fn box_blur(pixmap: &mut Pixmap, radius: usize, passes: usize) {
    if radius == 0 || passes == 0 {
        return;
    }
    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let data = pixmap.data_mut();
    let mut scratch = vec![0u8; data.len()];

    for _ in 0..passes {
        // Horizontal: data -> scratch
        for y in 0..height {
            let row = y * width;
            blur_line(data, &mut scratch, width, radius, |i| (row + i) * 4);
        }
        // Vertical: scratch -> data
        for x in 0..width {
            blur_line(&scratch, data, height, radius, |i| (i * width + x) * 4);
        }
    }
}

/// Sliding-window average over one row or column
fn blur_line(
    src: &[u8],
    dst: &mut [u8],
    len: usize,
    radius: usize,
    index: impl Fn(usize) -> usize,
) {
    let div = (radius * 2 + 1) as u32;
    let mut sums = [0u32; 4];

    // Window initially covers [-radius, radius]
    for i in 0..=radius.min(len.saturating_sub(1)) {
        let p = index(i);
        for c in 0..4 {
            sums[c] += src[p + c] as u32;
        }
    }

    for i in 0..len {
        let p = index(i);
        for c in 0..4 {
            dst[p + c] = ((sums[c] + div / 2) / div) as u8;
        }

        let incoming = i + radius + 1;
        if incoming < len {
            let q = index(incoming);
            for c in 0..4 {
                sums[c] += src[q + c] as u32;
            }
        }
        if i >= radius {
            let q = index(i - radius);
            for c in 0..4 {
                sums[c] -= src[q + c] as u32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::{Paint, Rect, Transform};

    fn dot() -> Pixmap {
        let mut pixmap = Pixmap::new(21, 21).unwrap();
        let mut paint = Paint::default();
        paint.set_color_rgba8(255, 255, 255, 255);
        pixmap.fill_rect(
            Rect::from_xywh(8.0, 8.0, 5.0, 5.0).unwrap(),
            &paint,
            Transform::identity(),
            None,
        );
        pixmap
    }

    #[test]
    fn test_blur_spreads_and_softens() {
        let source = dot();
        let result = blurred(&source, 4.0);

        let center = result.pixel(10, 10).unwrap().alpha();
        let near = result.pixel(10, 6).unwrap().alpha();
        assert!(center < 255);
        assert!(near > 0);
        assert_eq!(source.pixel(10, 6).unwrap().alpha(), 0);
    }

    #[test]
    fn test_premultiplied_stays_valid() {
        let result = blurred(&dot(), 6.0);
        for pixel in result.pixels() {
            assert!(pixel.red() <= pixel.alpha());
        }
    }

    #[test]
    fn test_small_radius_is_noop() {
        let source = dot();
        let result = blurred(&source, 0.2);
        assert_eq!(result.data(), source.data());
    }

    #[test]
    fn test_symmetric_result() {
        let result = blurred(&dot(), 4.0);
        let left = result.pixel(5, 10).unwrap().alpha();
        let right = result.pixel(15, 10).unwrap().alpha();
        assert_eq!(left, right);
    }
}
