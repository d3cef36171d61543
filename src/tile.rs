//! 单个瓦片的距离场计算：预筛选、选择计算策略、暴力计算或采样加克里金插值、信号放大。

use std::time::Instant;

use geo::{Geometry, Point};
use ndarray::Array2;
use rayon::prelude::*;

use crate::{
    apply_boost, create_raster,
    distance::{nearest_distance, prefilter, DEFAULT_PREFILTER_MULTIPLIER},
    kriging::{KrigingParams, OrdinaryKriging},
    rasterize_roads,
    sampling::{draw_samples, Points, WorkerPool},
    BoundingBox, FieldError, PixelMapping, Result, DEFAULT_BOOST,
};

/// 默认随机种子
pub const DEFAULT_SEED: u64 = 42;
/// `Mode::Auto` 下仍使用暴力计算的最大像素数
pub const AUTO_BRUTE_MAX_PIXELS: usize = 128 * 128;

/// 距离场的计算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// 像素数不超过 128x128 时暴力计算，否则插值
    #[default]
    Auto,
    /// 逐像素精确计算
    Brute,
    /// 随机采样后做普通克里金插值
    Kriging,
}

/// `Mode` 解析后实际使用的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Brute,
    Kriging,
}

impl Mode {
    /// 针对 `height` x `width` 的栅格确定策略，每次调用只决定一次
    pub fn resolve(&self, height: usize, width: usize) -> Strategy {
        match self {
            Mode::Brute => Strategy::Brute,
            Mode::Kriging => Strategy::Kriging,
            Mode::Auto if height * width <= AUTO_BRUTE_MAX_PIXELS => Strategy::Brute,
            Mode::Auto => Strategy::Kriging,
        }
    }
}

/// 瓦片计算的配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileOptions {
    /// 插值时的采样点数量
    pub points: Points,
    /// 信号放大倍数
    pub boost: f64,
    /// 采样使用的随机种子
    pub seed: u64,
    /// 以 info 级别输出进度，不影响计算结果
    pub verbose: bool,
    /// 工作线程数，`None` 表示 CPU 核数
    pub threads: Option<usize>,
    /// 预筛选半径相对瓦片跨度的倍数
    pub prefilter_multiplier: f64,
    /// 克里金插值参数
    pub kriging: KrigingParams,
}

impl Default for TileOptions {
    fn default() -> Self {
        TileOptions {
            points: Points::Default,
            boost: DEFAULT_BOOST,
            seed: DEFAULT_SEED,
            verbose: false,
            threads: None,
            prefilter_multiplier: DEFAULT_PREFILTER_MULTIPLIER,
            kriging: KrigingParams::default(),
        }
    }
}

/// [TileOptions] 的构建器
///
/// # 示例
///
/// ```rust
/// # fn main() -> road_distance_field::Result<()> {
/// use road_distance_field::{Points, TileBuilder};
///
/// let options = TileBuilder::new().points(Points::Count(200)).boost(0.01).seed(2).build()?;
/// assert_eq!(options.seed, 2);
/// # Ok(())}
/// ```
#[derive(Debug, Clone, Default)]
pub struct TileBuilder {
    options: TileOptions,
}

impl TileBuilder {
    /// 创建一个使用默认配置的构建器
    pub fn new() -> Self {
        TileBuilder::default()
    }

    /// 设置采样点数量
    pub fn points(mut self, points: Points) -> Self {
        self.options.points = points;
        self
    }

    /// 设置信号放大倍数
    pub fn boost(mut self, boost: f64) -> Self {
        self.options.boost = boost;
        self
    }

    /// 设置随机种子
    pub fn seed(mut self, seed: u64) -> Self {
        self.options.seed = seed;
        self
    }

    /// 是否输出详细进度
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.options.verbose = verbose;
        self
    }

    /// 设置工作线程数
    pub fn threads(mut self, threads: usize) -> Self {
        self.options.threads = Some(threads);
        self
    }

    /// 设置预筛选倍数
    pub fn prefilter_multiplier(mut self, multiplier: f64) -> Self {
        self.options.prefilter_multiplier = multiplier;
        self
    }

    /// 设置克里金插值参数
    pub fn kriging(mut self, kriging: KrigingParams) -> Self {
        self.options.kriging = kriging;
        self
    }

    /// 校验并生成配置
    ///
    /// # 错误
    /// 放大倍数或预筛选倍数非有限、线程数为零时返回 [FieldError::InvalidOption]；
    /// 采样比例不在 `(0, 1)` 内时返回 [FieldError::InvalidSampleCount]
    pub fn build(self) -> Result<TileOptions> {
        let options = self.options;
        if !options.boost.is_finite() {
            return Err(FieldError::InvalidOption(format!(
                "放大倍数必须是有限值: {}",
                options.boost
            )));
        }
        if !options.prefilter_multiplier.is_finite() {
            return Err(FieldError::InvalidOption(format!(
                "预筛选倍数必须是有限值: {}",
                options.prefilter_multiplier
            )));
        }
        if options.threads == Some(0) {
            return Err(FieldError::InvalidOption("线程数不能为零".to_string()));
        }
        if let Points::Fraction(fraction) = options.points {
            if !(fraction > 0. && fraction < 1.) {
                return Err(FieldError::InvalidSampleCount(fraction.to_string()));
            }
        }
        Ok(options)
    }
}

/// 计算瓦片内每个像素到最近道路的距离，结果写入 `image`
///
/// 依次执行：预筛选道路、确定计算策略、计算距离场、放大信号。
/// 预筛选后没有道路时直接返回，`image` 保持原值，也不做放大。
/// 道路本身不在这里绘制，见 [rasterize_roads] 与 [render_tile]。
///
/// # 错误
/// * 范围退化或栅格为空
/// * 采样失败：[FieldError::SamplingFailed]
/// * 克里金插值失败：[FieldError::InterpolationFailed]，不会退回暴力计算
pub fn compute_tile(
    image: &mut Array2<f64>,
    roads: &[Geometry<f64>],
    mode: Mode,
    bbox: &BoundingBox,
    options: &TileOptions,
) -> Result<()> {
    let (height, width) = image.dim();
    let mapping = PixelMapping::new(bbox, width, height)?;
    let level = if options.verbose {
        log::Level::Info
    } else {
        log::Level::Debug
    };

    let candidates = prefilter(roads, bbox, options.prefilter_multiplier);
    log::log!(level, "瓦片附近的道路: {}", candidates.len());
    if candidates.is_empty() {
        log::log!(level, "附近没有道路，跳过距离计算");
        return Ok(());
    }

    let pool = WorkerPool::new(&candidates, options.threads, options.verbose)?;
    match mode.resolve(height, width) {
        Strategy::Brute => {
            log::log!(level, "使用暴力计算");
            compute_brute(image, &mapping, &pool)?;
        }
        Strategy::Kriging => {
            log::log!(level, "使用普通克里金插值");
            compute_kriging(image, &mapping, bbox, &pool, options)?;
        }
    }

    apply_boost(image, options.boost);
    Ok(())
}

/// 逐像素计算精确距离，各行在线程池中并行
fn compute_brute(image: &mut Array2<f64>, mapping: &PixelMapping, pool: &WorkerPool) -> Result<()> {
    let started = Instant::now();
    let (height, width) = (mapping.height(), mapping.width());
    let roads = pool.roads();

    let rows = pool.install(|| {
        Ok((0..height)
            .into_par_iter()
            .map(|row| {
                (0..width)
                    .map(|col| {
                        let point = Point::from(mapping.pixel_to_geo(row, col));
                        nearest_distance(point, roads.iter().copied()).unwrap_or(f64::INFINITY)
                    })
                    .collect::<Vec<f64>>()
            })
            .collect::<Vec<_>>())
    })?;

    for (row, values) in rows.into_iter().enumerate() {
        for (col, value) in values.into_iter().enumerate() {
            image[[row, col]] = value;
        }
    }
    log::log!(
        pool.progress_level(),
        "暴力计算 {} 个像素用时 {:.2} 秒",
        height * width,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

/// 随机采样、并行计算采样点距离，再用克里金插值覆盖整个栅格
fn compute_kriging(
    image: &mut Array2<f64>,
    mapping: &PixelMapping,
    bbox: &BoundingBox,
    pool: &WorkerPool,
    options: &TileOptions,
) -> Result<()> {
    let count = options.points.resolve(mapping.height(), mapping.width())?;
    let tasks = draw_samples(bbox, count, options.seed);
    let samples = pool.sample(&tasks)?;

    let started = Instant::now();
    let model = OrdinaryKriging::fit(&samples, &options.kriging)?;
    log::log!(
        pool.progress_level(),
        "克里金模型拟合用时 {:.2} 秒",
        started.elapsed().as_secs_f64()
    );

    let field = model.execute_grid(mapping, pool)?;
    image.assign(&field);
    Ok(())
}

/// 生成一个完整的瓦片：新建栅格、计算距离场，再把道路画成 `road_value`
pub fn render_tile(
    width: usize,
    height: usize,
    roads: &[Geometry<f64>],
    mode: Mode,
    bbox: &BoundingBox,
    options: &TileOptions,
    road_value: f64,
) -> Result<Array2<f64>> {
    let mut image = create_raster(width, height);
    compute_tile(&mut image, roads, mode, bbox, options)?;
    rasterize_roads(&mut image, roads, bbox, road_value)?;
    Ok(image)
}
