//! Procedural wood-planks texture for the back of the frame.

use image::{Rgba, RgbaImage};

pub const WOOD_TEXTURE_SIZE: u32 = 512;

const BASE: [u8; 3] = [0xd2, 0xc2, 0xa5];
const DARK: [u8; 3] = [18, 15, 11];
const LIGHT: [u8; 3] = [255, 255, 255];
const PLANKS: u32 = 5;
const GRAIN_SPACING: u32 = 22;

/// Source-over composite of an sRGB colour with `alpha` onto one pixel.
fn blend(img: &mut RgbaImage, x: i64, y: i64, color: [u8; 3], alpha: f32) {
    if x < 0 || y < 0 || x >= img.width() as i64 || y >= img.height() as i64 {
        return;
    }
    let px = img.get_pixel_mut(x as u32, y as u32);
    for (channel, src) in px.0.iter_mut().take(3).zip(color) {
        let mixed = *channel as f32 * (1.0 - alpha) + src as f32 * alpha;
        *channel = mixed.round().clamp(0.0, 255.0) as u8;
    }
}

fn fill_rect(img: &mut RgbaImage, x0: u32, x1: u32, color: [u8; 3], alpha: f32) {
    for y in 0..img.height() {
        for x in x0..x1.min(img.width()) {
            blend(img, x as i64, y as i64, color, alpha);
        }
    }
}

fn cubic_bezier(p: [(f32, f32); 4], t: f32) -> (f32, f32) {
    let u = 1.0 - t;
    let a = u * u * u;
    let b = 3.0 * u * u * t;
    let c = 3.0 * u * t * t;
    let d = t * t * t;
    (
        a * p[0].0 + b * p[1].0 + c * p[2].0 + d * p[3].0,
        a * p[0].1 + b * p[1].1 + c * p[2].1 + d * p[3].1,
    )
}

fn stroke_grain(img: &mut RgbaImage, points: [(f32, f32); 4]) {
    let steps = 96;
    let mut last = None;
    for step in 0..=steps {
        let (x, y) = cubic_bezier(points, step as f32 / steps as f32);
        let pixel = (x.round() as i64, y.round() as i64);
        if last != Some(pixel) {
            blend(img, pixel.0, pixel.1, DARK, 0.06);
            last = Some(pixel);
        }
    }
}

pub fn wood_planks(size: u32) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(size, size, Rgba([BASE[0], BASE[1], BASE[2], 255]));
    let plank_w = size as f32 / PLANKS as f32;

    for i in 0..PLANKS {
        let x = i as f32 * plank_w;
        let x0 = x.round() as u32;
        let x1 = (x + plank_w).round() as u32;
        let (tint, alpha) = if i % 2 == 0 { (DARK, 0.06) } else { (LIGHT, 0.06) };
        fill_rect(&mut img, x0, x1, tint, alpha);
        // seam
        fill_rect(&mut img, x0, x0 + 2, DARK, 0.08);

        for y in (0..size).step_by(GRAIN_SPACING as usize) {
            let y = y as f32;
            let wobble = ((y / 38.0) + i as f32).sin() * 6.0;
            stroke_grain(
                &mut img,
                [
                    (x + 10.0 + wobble, y + 6.0),
                    (x + plank_w * 0.35 + wobble, y + 2.0),
                    (x + plank_w * 0.65 + wobble, y + 12.0),
                    (x + plank_w - 10.0 + wobble, y + 8.0),
                ],
            );
        }
    }

    let center = size as f32 / 2.0;
    let inner = size as f32 * 20.0 / 512.0;
    let outer = size as f32 * 360.0 / 512.0;
    for y in 0..size {
        for x in 0..size {
            let d = ((x as f32 - center).powi(2) + (y as f32 - center).powi(2)).sqrt();
            let t = ((d - inner) / (outer - inner)).clamp(0.0, 1.0);
            blend(&mut img, x as i64, y as i64, DARK, 0.12 * t);
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_darker_than_centre() {
        let img = wood_planks(WOOD_TEXTURE_SIZE);
        assert_eq!(img.dimensions(), (512, 512));
        let luma = |p: &Rgba<u8>| p.0[0] as u32 + p.0[1] as u32 + p.0[2] as u32;
        let centre = luma(img.get_pixel(300, 256));
        let corner = luma(img.get_pixel(511, 511));
        assert!(corner < centre);
        assert!(img.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn seams_darken_plank_edges() {
        let img = wood_planks(WOOD_TEXTURE_SIZE);
        let seam = img.get_pixel(205, 300).0[0];
        let body = img.get_pixel(215, 301).0[0];
        assert!(seam < body);
    }
}
