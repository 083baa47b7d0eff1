use image::{imageops, Rgb, RgbImage};
use parallax_align::{AlignConfig, Combiner, CropSpec, ErrorKind};
use std::time::Instant;

/// Smooth rings with a checker overlay, rich enough in corners to align
fn scene(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let (fx, fy) = (x as f32, y as f32);
        let ring = ((fx - 300.0).hypot(fy - 220.0) / 9.0).sin();
        let checker = if (x / 24 + y / 24) % 2 == 0 { 60.0 } else { 0.0 };
        let v = (120.0 + 70.0 * ring + checker).clamp(0.0, 255.0) as u8;
        Rgb([v, v.wrapping_mul(3), 255 - v])
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    parallax_cli::init_logging();

    println!("Parallax Alignment Showcase");
    println!("===========================\n");

    let canvas = scene(900, 700);
    let reference = imageops::crop_imm(&canvas, 40, 40, 800, 600).to_image();
    // Content at target (x, y) appears at reference (x + 12, y - 5)
    let target = imageops::crop_imm(&canvas, 52, 35, 800, 600).to_image();

    let config = AlignConfig::default().with_crop(CropSpec::new(200, 60));
    println!("{}\n", config.summary());
    println!("TOML form:\n{}", config.to_toml()?);

    let combiner = Combiner::new(config)?;

    let start = Instant::now();
    let alignment = combiner.align(&reference, &target)?;
    let (tx, ty) = alignment.estimate.model.translation();
    println!(
        "Features: {} / {}, matches: {}, inliers: {} ({:.1}%)",
        alignment.reference_features.len(),
        alignment.target_features.len(),
        alignment.matches.len(),
        alignment.estimate.num_inliers,
        100.0 * alignment.estimate.inlier_ratio()
    );
    println!(
        "Estimated shift ({:.2}, {:.2}), rotation {:.4} rad, scale {:.4} in {:.2?}",
        tx,
        ty,
        alignment.estimate.model.rotation(),
        alignment.estimate.model.scale(),
        start.elapsed()
    );

    let combination = combiner.combine_to_path(&reference, &target, "showcase_combined.jpg".as_ref())?;
    println!(
        "Composite {}x{} saved as showcase_combined.jpg",
        combination.composite.width(),
        combination.composite.height()
    );

    // A featureless pair fails alignment, not input validation
    let flat = RgbImage::from_pixel(320, 240, Rgb([128, 128, 128]));
    if let Err(e) = combiner.combine(&flat, &flat) {
        println!("\nFlat images: {} (retry capture: {})", e, e.kind() == ErrorKind::Alignment);
    }

    Ok(())
}
