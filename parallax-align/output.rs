use crate::error::{AlignError, AlignResult};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static PARTIAL_COUNTER: AtomicU64 = AtomicU64::new(0);

const PARTIAL_SUFFIX: &str = ".partial";

/// Sibling path the image is encoded to before being renamed into place.
///
/// Unique per process and per call, so concurrent writers to one destination never share it.
fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let n = PARTIAL_COUNTER.fetch_add(1, Ordering::Relaxed);
    dest.with_file_name(format!(".{}.{}-{}{}", name, std::process::id(), n, PARTIAL_SUFFIX))
}

/// Encode `img` in the format named by `dest`'s extension and move it into place.
///
/// The destination is either replaced by a complete file or left untouched.
pub fn write_atomic(img: &RgbImage, dest: &Path, jpeg_quality: u8) -> AlignResult<()> {
    let format = ImageFormat::from_path(dest)?;
    let tmp = partial_path(dest);

    let result = encode(img, &tmp, format, jpeg_quality).and_then(|()| fs::rename(&tmp, dest).map_err(AlignError::from));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result?;

    log::debug!("wrote {}x{} {:?} to {}", img.width(), img.height(), format, dest.display());
    Ok(())
}

fn encode(img: &RgbImage, path: &Path, format: ImageFormat, jpeg_quality: u8) -> AlignResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    match format {
        ImageFormat::Jpeg => img.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, jpeg_quality))?,
        other => img.write_to(&mut writer, other)?,
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::Rgb;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("parallax-output-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn leftover_partials(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| p.to_string_lossy().ends_with(PARTIAL_SUFFIX))
            .collect()
    }

    fn checker(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([250, 250, 250])
            } else {
                Rgb([10, 10, 10])
            }
        })
    }

    #[test]
    fn test_png_roundtrip_leaves_no_partial_file() {
        let dir = scratch_dir("png");
        let dest = dir.join("out.png");
        let img = checker(32, 16);

        write_atomic(&img, &dest, 95).unwrap();

        let back = image::open(&dest).unwrap().to_rgb8();
        assert_eq!(back, img);
        assert!(leftover_partials(&dir).is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_jpeg_written() {
        let dir = scratch_dir("jpeg");
        let dest = dir.join("out.jpg");

        write_atomic(&checker(64, 32), &dest, 90).unwrap();

        let back = image::open(&dest).unwrap().to_rgb8();
        assert_eq!(back.dimensions(), (64, 32));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unknown_extension_writes_nothing() {
        let dir = scratch_dir("ext");
        let dest = dir.join("out.notaformat");

        let err = write_atomic(&checker(8, 8), &dest, 95).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Output);
        assert!(!dest.exists());
        assert!(leftover_partials(&dir).is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_directory_fails_cleanly() {
        let dir = scratch_dir("missing");
        let dest = dir.join("nope").join("out.png");

        let err = write_atomic(&checker(8, 8), &dest, 95).unwrap_err();

        assert!(matches!(err, AlignError::Io(_)));
        assert!(!dest.exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_existing_destination_replaced() {
        let dir = scratch_dir("replace");
        let dest = dir.join("out.png");
        fs::write(&dest, b"stale").unwrap();

        write_atomic(&checker(8, 8), &dest, 95).unwrap();

        assert_eq!(image::open(&dest).unwrap().to_rgb8(), checker(8, 8));
        assert!(leftover_partials(&dir).is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_failed_rename_removes_partial_file() {
        let dir = scratch_dir("rename");
        let dest = dir.join("out.png");
        fs::create_dir(&dest).unwrap();

        let err = write_atomic(&checker(8, 8), &dest, 95).unwrap_err();

        assert!(matches!(err, AlignError::Io(_)));
        assert!(dest.is_dir());
        assert!(leftover_partials(&dir).is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_partial_paths_are_unique_per_call() {
        let dest = Path::new("shots/out.jpg");
        let a = partial_path(dest);
        let b = partial_path(dest);

        assert_ne!(a, b);
        assert_eq!(a.parent(), dest.parent());
        assert!(a.file_name().unwrap().to_string_lossy().starts_with(".out.jpg."));
        assert!(a.to_string_lossy().ends_with(PARTIAL_SUFFIX));
    }
}
