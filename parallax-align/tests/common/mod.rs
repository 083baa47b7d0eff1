#![allow(dead_code)]

use image::{imageops, Rgb, RgbImage};
use parallax_align::{AlignConfig, CropSpec};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const BLOCK: u32 = 8;

/// Random grey blocks with a slight colour cast; block junctions give dense, distinctive corners
pub fn block_canvas(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let cols = width.div_ceil(BLOCK);
    let rows = height.div_ceil(BLOCK);
    let values: Vec<u8> = (0..cols * rows).map(|_| rng.random()).collect();
    RgbImage::from_fn(width, height, |x, y| {
        let v = values[((y / BLOCK) * cols + x / BLOCK) as usize];
        Rgb([v, v.saturating_add(15), v.saturating_sub(15)])
    })
}

pub fn window(canvas: &RgbImage, x: u32, y: u32, width: u32, height: u32) -> RgbImage {
    imageops::crop_imm(canvas, x, y, width, height).to_image()
}

/// Reference and target views of one scene, where content at target (x, y)
/// appears at reference (x + dx, y + dy)
pub fn shifted_pair(width: u32, height: u32, dx: i32, dy: i32, seed: u64) -> (RgbImage, RgbImage) {
    let margin = 32;
    let canvas = block_canvas(width + 2 * margin, height + 2 * margin, seed);
    let reference = window(&canvas, margin, margin, width, height);
    let target = window(
        &canvas,
        (margin as i32 + dx) as u32,
        (margin as i32 + dy) as u32,
        width,
        height,
    );
    (reference, target)
}

pub fn test_config(crop: CropSpec) -> AlignConfig {
    AlignConfig::default().with_crop(crop).with_max_features(1500)
}

/// Mean absolute per-channel difference over a region both images cover
pub fn mean_abs_diff(a: &RgbImage, b: &RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) -> f64 {
    let mut total = 0u64;
    let mut count = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let (pa, pb) = (a.get_pixel(x, y), b.get_pixel(x, y));
            for c in 0..3 {
                total += (pa[c] as i32 - pb[c] as i32).unsigned_abs() as u64;
                count += 1;
            }
        }
    }
    total as f64 / count as f64
}

pub fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("parallax-it-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
