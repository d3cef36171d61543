//! 随机采样点的生成，以及在固定大小的线程池中并行计算采样点到道路的距离。

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::atomic::{AtomicUsize, Ordering},
    time::Instant,
};

use geo::{Coord, Geometry, Point};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};

use crate::{distance::nearest_distance, BoundingBox, FieldError, Result};

/// 未指定采样数时，采样点占像素总数的比例
pub const DEFAULT_SAMPLE_FRACTION: f64 = 0.01;

/// 每完成这么多个采样点输出一次进度
const PROGRESS_EVERY: usize = 1000;

/// 采样点数量的配置方式
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Points {
    /// 像素总数的 1%
    #[default]
    Default,
    /// 绝对数量
    Count(usize),
    /// 像素总数的比例，取值在 `(0, 1)` 之间
    Fraction(f64),
}

impl Points {
    /// 按命令行习惯解析一个数值：
    /// `0` 表示默认值，`(0, 1)` 之间是比例，不小于 1 的数取整后作为绝对数量
    ///
    /// # 错误
    /// 负数、NaN 或无穷大返回 [FieldError::InvalidSampleCount]
    pub fn from_value(value: f64) -> Result<Self> {
        if !value.is_finite() {
            Err(FieldError::InvalidSampleCount(value.to_string()))
        } else if value == 0. {
            Ok(Points::Default)
        } else if value > 0. && value < 1. {
            Ok(Points::Fraction(value))
        } else if value >= 1. {
            Ok(Points::Count(value as usize))
        } else {
            Err(FieldError::InvalidSampleCount(value.to_string()))
        }
    }

    /// 针对 `height` x `width` 的栅格解析出具体的采样数
    ///
    /// # 错误
    /// 绝对数量超过像素总数，或比例不在 `(0, 1)` 之间时返回
    /// [FieldError::InvalidSampleCount]
    pub fn resolve(&self, height: usize, width: usize) -> Result<usize> {
        let total = height.saturating_mul(width);
        let pixels = total as f64;
        match *self {
            Points::Default => Ok((pixels * DEFAULT_SAMPLE_FRACTION) as usize),
            Points::Count(count) if count <= total => Ok(count),
            Points::Count(count) => Err(FieldError::InvalidSampleCount(format!(
                "{count} 超过像素总数 {total}"
            ))),
            Points::Fraction(fraction) if fraction > 0. && fraction < 1. => {
                Ok((pixels * fraction) as usize)
            }
            Points::Fraction(fraction) => Err(FieldError::InvalidSampleCount(fraction.to_string())),
        }
    }
}

/// 等待计算距离的采样位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleTask {
    pub index: usize,
    pub position: Coord<f64>,
}

/// 一个采样点及其到最近道路的距离
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub index: usize,
    /// `(经度, 纬度)`
    pub position: Coord<f64>,
    pub distance: f64,
}

/// 在范围内均匀随机地生成 `count` 个采样位置
///
/// 所有随机数都在调用线程上按顺序抽取，每个采样点依次抽取经度、纬度两个值，
/// 所以同一个种子总是得到完全相同的采样位置，与线程池大小无关。
pub fn draw_samples(bbox: &BoundingBox, count: usize, seed: u64) -> Vec<SampleTask> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (gps_w, gps_h) = (bbox.width(), bbox.height());
    let origin = bbox.west_north;

    (0..count)
        .map(|index| {
            let c0: f64 = rng.random();
            let c1: f64 = rng.random();
            SampleTask {
                index,
                position: Coord {
                    x: origin.x + c0 * gps_w,
                    y: origin.y + c1 * gps_h,
                },
            }
        })
        .collect()
}

/// 固定大小的工作线程池。
///
/// 预筛选后的道路集合在创建线程池时以只读引用的形式交给所有工作线程，
/// 任务本身只携带采样序号和位置。工作线程从不接触栅格，只返回距离。
pub struct WorkerPool<'a> {
    roads: &'a [&'a Geometry<f64>],
    pool: ThreadPool,
    verbose: bool,
}

impl<'a> WorkerPool<'a> {
    /// 创建线程池
    ///
    /// # 参数
    /// * `roads` - 预筛选后的道路集合，所有任务共享
    /// * `threads` - 工作线程数，`None` 时使用 rayon 的默认值（CPU 核数）
    /// * `verbose` - 是否以 info 级别输出进度
    ///
    /// # 错误
    /// 线程池创建失败时返回 [FieldError::SamplingFailed]
    pub fn new(roads: &'a [&'a Geometry<f64>], threads: Option<usize>, verbose: bool) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|index| format!("road-sampler-{index}"));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|err| FieldError::SamplingFailed(err.to_string()))?;
        Ok(WorkerPool {
            roads,
            pool,
            verbose,
        })
    }

    /// 工作线程数
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// 共享的道路集合
    pub fn roads(&self) -> &'a [&'a Geometry<f64>] {
        self.roads
    }

    /// 在线程池中执行任意计算
    ///
    /// 工作线程发生 panic 时整个请求失败，返回 [FieldError::SamplingFailed]。
    pub fn install<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce() -> Result<R> + Send,
        R: Send,
    {
        catch_unwind(AssertUnwindSafe(|| self.pool.install(op))).unwrap_or_else(|panic| {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|reason| reason.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "工作线程异常退出".to_string());
            Err(FieldError::SamplingFailed(reason))
        })
    }

    /// 并行计算所有采样点的距离
    ///
    /// 任务完成的顺序不受约束，但结果按采样序号写回，
    /// 返回的向量顺序只取决于输入顺序。任何一个采样点失败都会使整个批次失败。
    pub fn sample(&self, tasks: &[SampleTask]) -> Result<Vec<Sample>> {
        let started = Instant::now();
        let completed = AtomicUsize::new(0);
        let total = tasks.len();
        let level = self.progress_level();
        let roads = self.roads;

        let samples = self.install(|| {
            tasks
                .par_iter()
                .map(|task| {
                    let distance = nearest_distance(Point::from(task.position), roads.iter().copied())
                        .filter(|distance| distance.is_finite())
                        .ok_or_else(|| {
                            FieldError::SamplingFailed(format!(
                                "采样点 {} ({:?}) 无法计算距离",
                                task.index, task.position
                            ))
                        })?;

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % PROGRESS_EVERY == 0 {
                        log::log!(
                            level,
                            "已采样 {done} / {total} ({:.1}%)，用时 {:.2} 秒",
                            done as f64 / total as f64 * 100.,
                            started.elapsed().as_secs_f64()
                        );
                    }

                    Ok(Sample {
                        index: task.index,
                        position: task.position,
                        distance,
                    })
                })
                .collect::<Result<Vec<_>>>()
        })?;

        log::log!(
            level,
            "{total} 个采样点用时 {:.2} 秒（{} 个工作线程）",
            started.elapsed().as_secs_f64(),
            self.threads()
        );
        Ok(samples)
    }

    pub(crate) fn progress_level(&self) -> log::Level {
        if self.verbose {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }
}
