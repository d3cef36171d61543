//! 普通克里金插值：拟合高斯变差函数，然后在整个像素网格上求值。

use std::time::Instant;

use geo::Coord;
use ndarray::Array2;
use rayon::prelude::*;

use crate::{
    sampling::{Sample, WorkerPool},
    solve::LuDecomposition,
    FieldError, PixelMapping, Result,
};

/// 实验变差函数的默认分组数
pub const DEFAULT_NLAGS: usize = 20;
/// 每个求值点默认使用的最近采样点数
pub const DEFAULT_NEIGHBORS: usize = 100;
/// 至少需要的采样点数
pub const MIN_SAMPLES: usize = 3;

/// 拟合时扫描的变程候选值个数
const RANGE_CANDIDATES: usize = 200;
/// 距离小于该值的采样点视为与求值点重合
const ZERO_DISTANCE: f64 = 1e-10;
/// 块金值相对偏基台值的下限，高斯模型在块金为零时方程组接近奇异
const MIN_NUGGET_RATIO: f64 = 1e-3;

/// 采样点之间距离的度量方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateSystem {
    /// 平面坐标，直接使用欧几里得距离
    Euclidean,
    /// 经纬度坐标，使用单位球面上的大圆角距离（度）
    #[default]
    Geographic,
}

impl CoordinateSystem {
    /// 把 `(x, y)` 转换为便于计算距离的三维表示
    pub fn embed(&self, coord: Coord<f64>) -> [f64; 3] {
        match self {
            CoordinateSystem::Euclidean => [coord.x, coord.y, 0.],
            CoordinateSystem::Geographic => {
                let (lon, lat) = (coord.x.to_radians(), coord.y.to_radians());
                [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
            }
        }
    }

    /// 两个三维表示之间的距离，地理坐标下单位为度
    pub fn distance(&self, a: &[f64; 3], b: &[f64; 3]) -> f64 {
        let chord = ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt();
        match self {
            CoordinateSystem::Euclidean => chord,
            CoordinateSystem::Geographic => (2. * (chord / 2.).min(1.).asin()).to_degrees(),
        }
    }
}

/// 克里金插值的参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KrigingParams {
    /// 实验变差函数的分组数
    pub nlags: usize,
    /// 每个求值点使用的最近采样点数
    pub neighbors: usize,
    /// 距离度量方式
    pub coordinates: CoordinateSystem,
}

impl Default for KrigingParams {
    fn default() -> Self {
        KrigingParams {
            nlags: DEFAULT_NLAGS,
            neighbors: DEFAULT_NEIGHBORS,
            coordinates: CoordinateSystem::default(),
        }
    }
}

/// 高斯变差函数模型
///
/// `γ(h) = psill * (1 - exp(-h² / (range * 4/7)²)) + nugget`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianVariogram {
    /// 偏基台值
    pub psill: f64,
    /// 变程
    pub range: f64,
    /// 块金值
    pub nugget: f64,
}

impl GaussianVariogram {
    fn shape(range: f64, lag: f64) -> f64 {
        let scaled = lag / (range * 4. / 7.);
        1. - (-scaled * scaled).exp()
    }

    /// 距离 `lag` 处的半方差
    pub fn value(&self, lag: f64) -> f64 {
        self.psill * Self::shape(self.range, lag) + self.nugget
    }

    /// 最小二乘拟合实验变差函数，`psill` 与 `nugget` 均不为负
    ///
    /// 变程在 `(0, 最大分组距离]` 上等距扫描，每个候选变程下模型对
    /// `psill`、`nugget` 是线性的，直接求闭式解，取残差平方和最小者。
    /// 最终的块金值不小于 `psill` 的千分之一。
    ///
    /// # 错误
    /// 实验变差函数为空或处处为零时返回 [FieldError::InterpolationFailed]
    pub fn fit(experimental: &ExperimentalVariogram) -> Result<Self> {
        let lags = &experimental.lags;
        let semivariance = &experimental.semivariance;
        let max_lag = lags.iter().copied().fold(0f64, f64::max);
        let max_semivariance = semivariance.iter().copied().fold(0f64, f64::max);
        if lags.is_empty() || max_lag <= 0. || max_semivariance <= 0. {
            return Err(FieldError::InterpolationFailed(
                "采样值没有空间变化，无法拟合变差函数".to_string(),
            ));
        }

        let mut best: Option<(f64, GaussianVariogram)> = None;
        for step in 1..=RANGE_CANDIDATES {
            let range = max_lag * step as f64 / RANGE_CANDIDATES as f64;
            let shapes: Vec<f64> = lags.iter().map(|&lag| Self::shape(range, lag)).collect();
            let (psill, nugget) = fit_linear_nonnegative(&shapes, semivariance);
            let model = GaussianVariogram {
                psill,
                range,
                nugget,
            };
            let sse: f64 = lags
                .iter()
                .zip(semivariance)
                .map(|(&lag, &observed)| (model.value(lag) - observed).powi(2))
                .sum();
            if best.map_or(true, |(best_sse, _)| sse < best_sse) {
                best = Some((sse, model));
            }
        }

        match best {
            Some((_, mut model)) if model.psill + model.nugget > 0. => {
                model.nugget = model.nugget.max(model.psill * MIN_NUGGET_RATIO);
                Ok(model)
            }
            _ => Err(FieldError::InterpolationFailed(
                "变差函数拟合结果退化".to_string(),
            )),
        }
    }
}

/// 在 `psill, nugget >= 0` 约束下最小化 `Σ (psill * f + nugget - s)²`
fn fit_linear_nonnegative(shapes: &[f64], observed: &[f64]) -> (f64, f64) {
    let n = shapes.len() as f64;
    let s_ff: f64 = shapes.iter().map(|f| f * f).sum();
    let s_f: f64 = shapes.iter().sum();
    let s_fs: f64 = shapes.iter().zip(observed).map(|(f, s)| f * s).sum();
    let s_s: f64 = observed.iter().sum();

    let sse = |psill: f64, nugget: f64| -> f64 {
        shapes
            .iter()
            .zip(observed)
            .map(|(f, s)| (psill * f + nugget - s).powi(2))
            .sum()
    };

    let mut candidates = vec![
        (0., (s_s / n).max(0.)),
        (if s_ff > 0. { (s_fs / s_ff).max(0.) } else { 0. }, 0.),
    ];
    let det = s_ff * n - s_f * s_f;
    if det.abs() > f64::EPSILON * s_ff * n {
        let psill = (s_fs * n - s_f * s_s) / det;
        let nugget = (s_ff * s_s - s_f * s_fs) / det;
        if psill >= 0. && nugget >= 0. {
            candidates.push((psill, nugget));
        }
    }

    candidates
        .into_iter()
        .map(|(psill, nugget)| (sse(psill, nugget), (psill, nugget)))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, params)| params)
        .unwrap_or((0., 0.))
}

/// 实验变差函数：各分组的平均距离和平均半方差
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentalVariogram {
    pub lags: Vec<f64>,
    pub semivariance: Vec<f64>,
}

impl ExperimentalVariogram {
    /// 由所有采样点对计算实验变差函数
    ///
    /// 在最小、最大点对距离之间等宽分成 `nlags` 组，最大距离落入最后一组，空组被丢弃。
    fn compute(
        points: &[[f64; 3]],
        values: &[f64],
        nlags: usize,
        coordinates: CoordinateSystem,
    ) -> Result<Self> {
        let pairs = || {
            (0..points.len()).flat_map(move |i| {
                (i + 1..points.len()).map(move |j| {
                    (
                        coordinates.distance(&points[i], &points[j]),
                        0.5 * (values[i] - values[j]).powi(2),
                    )
                })
            })
        };

        let (min_d, max_d) = pairs().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (d, _)| {
            (lo.min(d), hi.max(d))
        });
        if !(max_d > min_d) {
            return Err(FieldError::InterpolationFailed(
                "采样点位置重合，无法计算变差函数".to_string(),
            ));
        }

        let nlags = nlags.max(1);
        let width = (max_d - min_d) / nlags as f64;
        let mut sums = vec![(0f64, 0f64, 0usize); nlags];
        for (d, gamma) in pairs() {
            let bin = (((d - min_d) / width) as usize).min(nlags - 1);
            let entry = &mut sums[bin];
            entry.0 += d;
            entry.1 += gamma;
            entry.2 += 1;
        }

        let (lags, semivariance): (Vec<f64>, Vec<f64>) = sums
            .into_iter()
            .filter(|&(_, _, count)| count > 0)
            .map(|(d, gamma, count)| (d / count as f64, gamma / count as f64))
            .unzip();
        Ok(ExperimentalVariogram { lags, semivariance })
    }
}

/// 拟合好的普通克里金模型。
///
/// 采样点不多于邻域大小时，所有采样点参与每一次预测，方程组只分解一次，
/// 以对偶形式求值；否则每个求值点取最近的 `neighbors` 个采样点单独求解。
#[derive(Debug, Clone)]
pub struct OrdinaryKriging {
    points: Vec<[f64; 3]>,
    values: Vec<f64>,
    variogram: GaussianVariogram,
    params: KrigingParams,
    /// 全局方程组的对偶权重，最后一项对应拉格朗日乘子
    dual_weights: Option<Vec<f64>>,
}

impl OrdinaryKriging {
    /// 用采样点拟合模型
    ///
    /// # 错误
    /// 采样点少于 [MIN_SAMPLES]、变差函数退化或方程组奇异时返回
    /// [FieldError::InterpolationFailed]
    pub fn fit(samples: &[Sample], params: &KrigingParams) -> Result<Self> {
        if samples.len() < MIN_SAMPLES {
            return Err(FieldError::InterpolationFailed(format!(
                "至少需要 {MIN_SAMPLES} 个采样点，实际只有 {} 个",
                samples.len()
            )));
        }
        if params.neighbors < MIN_SAMPLES {
            return Err(FieldError::InvalidOption(format!(
                "克里金邻域至少包含 {MIN_SAMPLES} 个采样点"
            )));
        }

        let coordinates = params.coordinates;
        let points: Vec<_> = samples
            .iter()
            .map(|sample| coordinates.embed(sample.position))
            .collect();
        let values: Vec<_> = samples.iter().map(|sample| sample.distance).collect();

        let experimental = ExperimentalVariogram::compute(&points, &values, params.nlags, coordinates)?;
        let variogram = GaussianVariogram::fit(&experimental)?;
        log::debug!("高斯变差函数拟合结果: {variogram:?}");

        let mut model = OrdinaryKriging {
            points,
            values,
            variogram,
            params: *params,
            dual_weights: None,
        };
        if model.points.len() <= params.neighbors {
            let all: Vec<usize> = (0..model.points.len()).collect();
            let lu = model.factor_system(&all)?;
            let mut rhs = model.values.clone();
            rhs.push(0.);
            lu.solve_in_place(&mut rhs);
            model.dual_weights = Some(rhs);
        }
        Ok(model)
    }

    /// 拟合得到的变差函数
    pub fn variogram(&self) -> &GaussianVariogram {
        &self.variogram
    }

    /// 参与拟合的采样点数
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否没有采样点（拟合成功的模型总是非空）
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 求值点与采样点之间的半方差，重合时为零
    fn gamma_to(&self, at: &[f64; 3], index: usize) -> f64 {
        let lag = self.params.coordinates.distance(at, &self.points[index]);
        if lag <= ZERO_DISTANCE {
            0.
        } else {
            self.variogram.value(lag)
        }
    }

    /// 组装并分解选定采样点的克里金矩阵
    fn factor_system(&self, indices: &[usize]) -> Result<LuDecomposition> {
        let k = indices.len();
        let n = k + 1;
        let mut matrix = vec![0.; n * n];
        for (row, &i) in indices.iter().enumerate() {
            for (col, &j) in indices.iter().enumerate().skip(row + 1) {
                let lag = self.params.coordinates.distance(&self.points[i], &self.points[j]);
                let gamma = self.variogram.value(lag);
                matrix[row * n + col] = gamma;
                matrix[col * n + row] = gamma;
            }
            matrix[row * n + k] = 1.;
            matrix[k * n + row] = 1.;
        }
        LuDecomposition::factor(matrix, n)
    }

    /// 预测单个位置的值
    ///
    /// # 错误
    /// 局部方程组奇异或结果非有限时返回 [FieldError::InterpolationFailed]
    pub fn predict(&self, position: Coord<f64>) -> Result<f64> {
        let at = self.params.coordinates.embed(position);
        let value = match &self.dual_weights {
            Some(weights) => {
                let k = self.points.len();
                (0..k)
                    .map(|index| self.gamma_to(&at, index) * weights[index])
                    .sum::<f64>()
                    + weights[k]
            }
            None => self.predict_local(&at)?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(FieldError::InterpolationFailed(format!(
                "{position:?} 处的预测值非有限"
            )))
        }
    }

    fn predict_local(&self, at: &[f64; 3]) -> Result<f64> {
        let coordinates = self.params.coordinates;
        let mut nearest: Vec<(f64, usize)> = self
            .points
            .iter()
            .enumerate()
            .map(|(index, point)| (coordinates.distance(at, point), index))
            .collect();
        let k = self.params.neighbors.min(nearest.len());
        nearest.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0));
        nearest.truncate(k);
        nearest.sort_unstable_by_key(|&(_, index)| index);

        let indices: Vec<usize> = nearest.iter().map(|&(_, index)| index).collect();
        let lu = self.factor_system(&indices)?;
        let mut rhs: Vec<f64> = nearest
            .iter()
            .map(|&(lag, _)| {
                if lag <= ZERO_DISTANCE {
                    0.
                } else {
                    self.variogram.value(lag)
                }
            })
            .collect();
        rhs.push(1.);
        lu.solve_in_place(&mut rhs);

        Ok(indices
            .iter()
            .zip(&rhs)
            .map(|(&index, weight)| weight * self.values[index])
            .sum())
    }

    /// 在整个像素网格上求值，每个像素取其左上角对应的地理位置
    ///
    /// 行之间并行计算；任何一个像素失败都会使整个网格失败。
    pub fn execute_grid(&self, mapping: &PixelMapping, pool: &WorkerPool) -> Result<Array2<f64>> {
        let started = Instant::now();
        let (height, width) = (mapping.height(), mapping.width());

        let rows = pool.install(|| {
            (0..height)
                .into_par_iter()
                .map(|row| {
                    (0..width)
                        .map(|col| self.predict(mapping.pixel_to_geo(row, col)))
                        .collect::<Result<Vec<f64>>>()
                })
                .collect::<Result<Vec<_>>>()
        })?;

        log::log!(
            pool.progress_level(),
            "克里金网格 {height}x{width} 求值用时 {:.2} 秒",
            started.elapsed().as_secs_f64()
        );
        Array2::from_shape_vec((height, width), rows.concat())
            .map_err(|err| FieldError::InterpolationFailed(err.to_string()))
    }
}
