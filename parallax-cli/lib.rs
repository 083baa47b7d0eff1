use anyhow::Context;
use clap::{ArgGroup, Parser, ValueEnum};
use env_logger::Env;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_circle_mut;
use parallax_align::{
    capture_pair, output_filename, write_atomic, AlignConfig, AlignError, CaptureSettings, Combiner, CropSpec,
    ErrorKind, FeatureExtractor, FileCamera, ImageRole, Keypoint,
};
use parallax_core::init_thread_pool;
use std::path::{Path, PathBuf};

pub const DEFAULT_CROP: CropSpec = CropSpec { left: 200, bottom: 60 };

/// Layout of composite file names written with `--output-dir`
pub const TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

#[derive(Debug, Clone, PartialEq)]
pub enum OutputTarget {
    File(PathBuf),
    Directory(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Awb {
    On,
    Off,
}

/// Aligns the target still onto the reference still, crops both and writes them side by side
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "parallax", version, long_about = None)]
#[command(group(ArgGroup::new("destination").required(true).args(["output", "output_dir"])))]
pub struct Args {
    /// Reference (left) image
    #[arg(long)]
    pub reference: PathBuf,

    /// Target (right) image, warped onto the reference
    #[arg(long)]
    pub target: PathBuf,

    /// Composite path; the extension selects the format
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Write combined_<settings>_<timestamp>.jpg into this directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Columns removed from the left edge [default: 200, or the config file's value]
    #[arg(long)]
    pub crop_left: Option<u32>,

    /// Rows removed from the bottom edge [default: 60, or the config file's value]
    #[arg(long)]
    pub crop_bottom: Option<u32>,

    /// TOML or JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Exposure time in microseconds
    #[arg(long, default_value_t = 2_000_000)]
    pub shutter: u32,

    /// Analogue gain
    #[arg(long, default_value_t = 2.0)]
    pub gain: f32,

    /// Auto white balance
    #[arg(long, value_enum, default_value_t = Awb::On)]
    pub awb: Awb,

    /// Also write the reference keypoints drawn over the reference
    #[arg(long)]
    pub keypoints: Option<PathBuf>,
}

impl Args {
    pub fn settings(&self) -> CaptureSettings {
        CaptureSettings::new(self.shutter, self.gain, self.awb == Awb::On)
    }

    pub fn output_target(&self) -> OutputTarget {
        match (&self.output, &self.output_dir) {
            (Some(file), _) => OutputTarget::File(file.clone()),
            (None, Some(dir)) => OutputTarget::Directory(dir.clone()),
            (None, None) => OutputTarget::Directory(PathBuf::from(".")),
        }
    }
}

/// Install `env_logger`; `RUST_LOG` overrides the default `info` filter
pub fn init_logging() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

fn load_config(path: &Path) -> anyhow::Result<AlignConfig> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let config = if is_json {
        AlignConfig::load_json(path)
    } else {
        AlignConfig::load_toml(path)
    };
    config.with_context(|| format!("loading configuration from {}", path.display()))
}

/// Configuration file (or defaults), with crop values from the command line taking precedence
pub fn build_config(args: &Args) -> anyhow::Result<AlignConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => AlignConfig::default().with_crop(DEFAULT_CROP),
    };
    if let Some(left) = args.crop_left {
        config.crop.left = left;
    }
    if let Some(bottom) = args.crop_bottom {
        config.crop.bottom = bottom;
    }
    config.validate()?;
    Ok(config)
}

/// Local wall-clock time, used to keep output names unique
pub fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

pub fn resolve_output(output: &OutputTarget, settings: &CaptureSettings, stamp: &str) -> PathBuf {
    match output {
        OutputTarget::File(path) => path.clone(),
        OutputTarget::Directory(dir) => dir.join(output_filename("combined", settings, stamp)),
    }
}

/// Reference image with a red circle per keypoint, sized by detection scale
pub fn draw_keypoints(img: &RgbImage, keypoints: &[Keypoint], scale_factor: f32) -> RgbImage {
    let mut canvas = img.clone();
    for kp in keypoints {
        let radius = (3.0 * scale_factor.powi(kp.octave as i32)).round() as i32;
        draw_hollow_circle_mut(
            &mut canvas,
            (kp.x.round() as i32, kp.y.round() as i32),
            radius,
            Rgb([255, 0, 0]),
        );
    }
    canvas
}

/// Process exit code for a failed run, so scripts can tell a bad capture from a failed alignment
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<AlignError>().map(AlignError::kind) {
        Some(ErrorKind::Input) => 2,
        Some(ErrorKind::Alignment) => 3,
        Some(ErrorKind::Output) => 4,
        Some(ErrorKind::Config) | None => 1,
    }
}

fn camera_name(path: &Path, fallback: &str) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

/// Run one capture → align → combine → write cycle and return the composite path
pub fn run(args: &Args) -> anyhow::Result<PathBuf> {
    let config = build_config(args)?;
    log::debug!("{}", config.summary());

    if let Err(e) = init_thread_pool(config.features.n_threads) {
        log::debug!("using existing thread pool: {}", e);
    }

    let settings = args.settings();
    let output = args.output_target();
    let dest = resolve_output(&output, &settings, &timestamp());
    if let OutputTarget::Directory(dir) = &output {
        std::fs::create_dir_all(dir).with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let reference_cam = FileCamera::new(camera_name(&args.reference, "reference"), &args.reference);
    let target_cam = FileCamera::new(camera_name(&args.target, "target"), &args.target);
    let (reference, target) = capture_pair(&reference_cam, &target_cam, &settings)?;

    if let Some(path) = &args.keypoints {
        let extractor = FeatureExtractor::new(config.features.clone())?;
        let features = extractor.extract_or_empty(&reference, ImageRole::Reference)?;
        let overlay = draw_keypoints(&reference, &features.keypoints, config.features.scale_factor);
        write_atomic(&overlay, path, config.jpeg_quality)
            .with_context(|| format!("writing keypoint overlay to {}", path.display()))?;
        log::info!("{} reference keypoints drawn to {}", features.len(), path.display());
    }

    let combiner = Combiner::new(config)?;
    combiner.combine_to_path(&reference, &target, &dest)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use clap::error::ErrorKind as ClapErrorKind;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("parallax").chain(args.iter().copied()))
    }

    fn minimal() -> Args {
        parse(&["--reference", "a.jpg", "--target", "b.jpg", "--output", "out.jpg"]).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = minimal();
        assert_eq!(args.reference, PathBuf::from("a.jpg"));
        assert_eq!(args.output_target(), OutputTarget::File(PathBuf::from("out.jpg")));
        assert_eq!(args.settings(), CaptureSettings::new(2_000_000, 2.0, true));
        assert_eq!(build_config(&args).unwrap().crop, DEFAULT_CROP);
    }

    #[test]
    fn test_all_flags() {
        let args = parse(&[
            "--reference", "noir.png",
            "--target", "normal.png",
            "--output-dir", "out",
            "--crop-left", "150",
            "--crop-bottom", "40",
            "--shutter", "10000",
            "--gain", "1.5",
            "--awb", "off",
            "--keypoints", "kp.png",
        ])
        .unwrap();

        assert_eq!(args.output_target(), OutputTarget::Directory(PathBuf::from("out")));
        assert_eq!(args.settings(), CaptureSettings::new(10_000, 1.5, false));
        assert_eq!(args.keypoints, Some(PathBuf::from("kp.png")));
        assert_eq!(build_config(&args).unwrap().crop, CropSpec::new(150, 40));
    }

    #[test]
    fn test_help_and_errors() {
        let kind = |args: Vec<&str>| parse(&args).unwrap_err().kind();
        let with_required = |extra: &[&'static str]| {
            let mut args = vec!["--reference", "a.jpg", "--target", "b.jpg"];
            args.extend_from_slice(extra);
            args
        };

        assert_eq!(kind(vec!["--help"]), ClapErrorKind::DisplayHelp);
        assert_eq!(kind(with_required(&[])), ClapErrorKind::MissingRequiredArgument);
        assert_eq!(
            kind(with_required(&["--output", "a.jpg", "--output-dir", "d"])),
            ClapErrorKind::ArgumentConflict
        );
        assert_eq!(
            kind(with_required(&["--output", "o.jpg", "--awb", "auto"])),
            ClapErrorKind::InvalidValue
        );
        assert_eq!(kind(vec!["--bogus"]), ClapErrorKind::UnknownArgument);
        assert!(parse(&["--reference"]).is_err());
        assert!(parse(&with_required(&["--output", "o.jpg", "--crop-left", "-3"])).is_err());
    }

    #[test]
    fn test_timestamp_layout() {
        let stamp = timestamp();
        let fields: Vec<&str> = stamp.split('_').collect();

        assert_eq!(stamp.len(), 19);
        assert_eq!(fields.iter().map(|f| f.len()).collect::<Vec<_>>(), [4, 2, 2, 2, 2, 2]);
        assert!(fields.iter().all(|f| f.chars().all(|c| c.is_ascii_digit())));
        assert!(chrono::NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn test_crop_flags_override_config_file() {
        let dir = std::env::temp_dir().join(format!("parallax-cli-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("parallax.toml");
        std::fs::write(&path, "ransac_threshold = 2.0\n\n[crop]\nleft = 100\nbottom = 30\n").unwrap();

        let mut args = minimal();
        args.config = Some(path.clone());
        let from_file = build_config(&args).unwrap();
        assert_eq!(from_file.crop, CropSpec::new(100, 30));
        assert_eq!(from_file.ransac_threshold, 2.0);

        args.crop_bottom = Some(0);
        assert_eq!(build_config(&args).unwrap().crop, CropSpec::new(100, 0));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_output_directory_naming() {
        let settings = CaptureSettings::new(2_000_000, 2.0, true);
        let path = resolve_output(&OutputTarget::Directory(PathBuf::from("shots")), &settings, "2024_05_01_12_30_00");
        assert_eq!(
            path,
            PathBuf::from("shots/combined_shutter-2000000_gain-2.0_awb-on_2024_05_01_12_30_00.jpg")
        );
    }

    #[test]
    fn test_draw_keypoints_marks_image() {
        let img = RgbImage::new(40, 40);
        let kp = Keypoint { x: 20.0, y: 20.0, angle: 0.0, octave: 0, response: 1.0 };
        let out = draw_keypoints(&img, &[kp], 1.2);

        assert_eq!(*out.get_pixel(23, 20), Rgb([255, 0, 0]));
        assert_eq!(*out.get_pixel(20, 20), Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(23, 20), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_exit_codes_follow_error_kind() {
        let input: anyhow::Error = AlignError::InvalidCrop { left: 9, bottom: 0, width: 9, height: 9 }.into();
        let alignment: anyhow::Error = AlignError::DegenerateMotion { reason: "x".into() }.into();
        let other = anyhow!("plain failure");

        assert_eq!(exit_code(&input), 2);
        assert_eq!(exit_code(&alignment.context("aligning")), 3);
        assert_eq!(exit_code(&other), 1);
    }
}
