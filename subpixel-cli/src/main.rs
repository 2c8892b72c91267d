use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use subpixel::image::io::load_gray_image;
use subpixel::{
    AcceleratedFilter, AffineEmConfig, Algorithm, BackendContext, BackendSettings, Disparity,
    DisparityMap, Image, LaplacianOfGaussian, MergePolicy, NullFilter, ParabolaConfig,
    PreprocessFilter, ShaderLanguage, SignOfLog, SubpixelConfig, SubpixelView, SubtractedMean,
};
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Subpixel disparity refinement CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum PreprocessKind {
    Null,
    Log,
    Slog,
    SubtractedMean,
}

/// Runtime-selected preprocessing filter.
#[derive(Debug, Clone, Copy)]
enum Preprocess {
    Null(NullFilter),
    Log(LaplacianOfGaussian),
    Slog(SignOfLog),
    SubtractedMean(SubtractedMean),
}

impl Preprocess {
    fn new(kind: PreprocessKind, sigma: f32) -> Self {
        match kind {
            PreprocessKind::Null => Preprocess::Null(NullFilter),
            PreprocessKind::Log => Preprocess::Log(LaplacianOfGaussian::new(sigma)),
            PreprocessKind::Slog => Preprocess::Slog(SignOfLog::new(sigma)),
            PreprocessKind::SubtractedMean => {
                Preprocess::SubtractedMean(SubtractedMean::new(sigma))
            }
        }
    }
}

impl PreprocessFilter for Preprocess {
    fn apply(&self, image: Image<f32>) -> Image<f32> {
        match self {
            Preprocess::Null(f) => f.apply(image),
            Preprocess::Log(f) => f.apply(image),
            Preprocess::Slog(f) => f.apply(image),
            Preprocess::SubtractedMean(f) => f.apply(image),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum MergePolicyConfig {
    PreferPyramid,
    PreferSeed,
}

impl From<MergePolicyConfig> for MergePolicy {
    fn from(value: MergePolicyConfig) -> Self {
        match value {
            MergePolicyConfig::PreferPyramid => MergePolicy::PreferPyramid,
            MergePolicyConfig::PreferSeed => MergePolicy::PreferSeed,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum ShaderLanguageConfig {
    CgGlsl,
    GlslCg,
    Glsl,
    Cg,
}

impl From<ShaderLanguageConfig> for ShaderLanguage {
    fn from(value: ShaderLanguageConfig) -> Self {
        match value {
            ShaderLanguageConfig::CgGlsl => ShaderLanguage::CgGlsl,
            ShaderLanguageConfig::GlslCg => ShaderLanguage::GlslCg,
            ShaderLanguageConfig::Glsl => ShaderLanguage::Glsl,
            ShaderLanguageConfig::Cg => ShaderLanguage::Cg,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AffineEmJson {
    max_iterations: usize,
    epsilon: f32,
    max_drift: f32,
    max_deformation: f32,
    inlier_prior: f32,
    min_variance: f32,
}

impl Default for AffineEmJson {
    fn default() -> Self {
        let cfg = AffineEmConfig::default();
        Self {
            max_iterations: cfg.max_iterations,
            epsilon: cfg.epsilon,
            max_drift: cfg.max_drift,
            max_deformation: cfg.max_deformation,
            inlier_prior: cfg.inlier_prior,
            min_variance: cfg.min_variance,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SubpixelJson {
    /// 0 = pass-through, 1 = parabola, 2 = affine EM.
    algorithm: i32,
    kernel_width: usize,
    kernel_height: usize,
    horizontal: bool,
    vertical: bool,
    pyramid_levels: usize,
    pyramid_sigma: f32,
    quorum: usize,
    merge_policy: MergePolicyConfig,
    min_curvature: f32,
    affine_em: AffineEmJson,
    verbose: bool,
}

impl Default for SubpixelJson {
    fn default() -> Self {
        let cfg = SubpixelConfig::default();
        Self {
            algorithm: cfg.algorithm.selector(),
            kernel_width: cfg.kernel_width,
            kernel_height: cfg.kernel_height,
            horizontal: cfg.horizontal,
            vertical: cfg.vertical,
            pyramid_levels: cfg.pyramid_levels,
            pyramid_sigma: cfg.pyramid_sigma,
            quorum: cfg.quorum,
            merge_policy: MergePolicyConfig::PreferPyramid,
            min_curvature: cfg.parabola.min_curvature,
            affine_em: AffineEmJson::default(),
            verbose: cfg.verbose,
        }
    }
}

impl SubpixelJson {
    fn to_config(&self) -> Result<SubpixelConfig, subpixel::SubpixelError> {
        let em = &self.affine_em;
        Ok(SubpixelConfig {
            kernel_width: self.kernel_width,
            kernel_height: self.kernel_height,
            horizontal: self.horizontal,
            vertical: self.vertical,
            algorithm: Algorithm::try_from(self.algorithm)?,
            pyramid_levels: self.pyramid_levels,
            pyramid_sigma: self.pyramid_sigma,
            quorum: self.quorum,
            merge_policy: self.merge_policy.into(),
            parabola: ParabolaConfig {
                min_curvature: self.min_curvature,
            },
            affine_em: AffineEmConfig {
                max_iterations: em.max_iterations,
                epsilon: em.epsilon,
                max_drift: em.max_drift,
                max_deformation: em.max_deformation,
                inlier_prior: em.inlier_prior,
                min_variance: em.min_variance,
            },
            verbose: self.verbose,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct BackendJson {
    shader_language: ShaderLanguageConfig,
    memory_recycling: bool,
    logging: bool,
}

impl Default for BackendJson {
    fn default() -> Self {
        let cfg = BackendSettings::default();
        Self {
            shader_language: ShaderLanguageConfig::CgGlsl,
            memory_recycling: cfg.memory_recycling,
            logging: cfg.logging,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    left_path: String,
    right_path: String,
    /// Constant integer seed disparity `[dx, dy]`.
    seed: [i32; 2],
    output_path: Option<String>,
    tile_size: [usize; 2],
    parallel: bool,
    preprocess: PreprocessKind,
    preprocess_sigma: f32,
    /// Route preprocessing through the accelerator backend.
    backend: Option<BackendJson>,
    subpixel: SubpixelJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            left_path: String::new(),
            right_path: String::new(),
            seed: [0, 0],
            output_path: None,
            tile_size: [256, 256],
            parallel: false,
            preprocess: PreprocessKind::Null,
            preprocess_sigma: 1.5,
            backend: None,
            subpixel: SubpixelJson::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    width: usize,
    height: usize,
    valid: usize,
    mean_dx: Option<f32>,
    mean_dy: Option<f32>,
    /// Row-major refined disparity, `null` where invalid.
    disparity: Vec<Option<[f32; 2]>>,
}

impl From<&DisparityMap> for Output {
    fn from(map: &DisparityMap) -> Self {
        let disparity: Vec<_> = map
            .data()
            .iter()
            .map(|d| d.vector().map(|(dx, dy)| [dx, dy]))
            .collect();
        let (sum_dx, sum_dy, valid) = disparity
            .iter()
            .flatten()
            .fold((0.0f64, 0.0f64, 0usize), |(sx, sy, n), [dx, dy]| {
                (sx + f64::from(*dx), sy + f64::from(*dy), n + 1)
            });
        let mean = |sum: f64| (valid > 0).then(|| (sum / valid as f64) as f32);
        Self {
            width: map.width(),
            height: map.height(),
            valid,
            mean_dx: mean(sum_dx),
            mean_dy: mean(sum_dy),
            disparity,
        }
    }
}

#[cfg(feature = "rayon")]
fn rasterize<F: PreprocessFilter + Sync>(
    view: &SubpixelView<'_, F>,
    tile: [usize; 2],
    parallel: bool,
) -> subpixel::SubpixelResult<DisparityMap> {
    if parallel {
        view.par_rasterize_tiled(tile[0], tile[1])
    } else {
        view.rasterize_tiled(tile[0], tile[1])
    }
}

#[cfg(not(feature = "rayon"))]
fn rasterize<F: PreprocessFilter>(
    view: &SubpixelView<'_, F>,
    tile: [usize; 2],
    parallel: bool,
) -> subpixel::SubpixelResult<DisparityMap> {
    if parallel {
        tracing::warn!("built without the rayon feature; rasterizing sequentially");
    }
    view.rasterize_tiled(tile[0], tile[1])
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("subpixel=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.left_path.is_empty() || config.right_path.is_empty() {
        return Err("left_path and right_path must be set in the config".into());
    }
    if config.tile_size.contains(&0) {
        return Err("tile_size entries must be at least 1".into());
    }
    let subpixel_config = config.subpixel.to_config()?;

    let left = load_gray_image(&config.left_path)?;
    let right = load_gray_image(&config.right_path)?;
    let seed = DisparityMap::filled(
        left.width(),
        left.height(),
        Disparity::new(config.seed[0] as f32, config.seed[1] as f32),
    );

    if let Some(backend) = &config.backend {
        BackendContext::initialize(BackendSettings {
            shader_language: backend.shader_language.into(),
            memory_recycling: backend.memory_recycling,
            logging: backend.logging,
        })?;
    }
    let filter = AcceleratedFilter::new(Preprocess::new(config.preprocess, config.preprocess_sigma));

    let view = SubpixelView::new(
        seed.view(),
        left.view(),
        right.view(),
        subpixel_config,
        filter,
    )?;
    let refined = rasterize(&view, config.tile_size, config.parallel)?;
    BackendContext::shutdown();

    let output = Output::from(&refined);
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
