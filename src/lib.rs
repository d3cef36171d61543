#![doc = include_str!("../README.md")]
use ndarray::Array2;
use thiserror::Error;

mod bbox;
pub use bbox::{BoundingBox, PixelCoordinate, PixelMapping, Transform};
mod boost;
pub use boost::{apply_boost, DEFAULT_BOOST};
mod clip;
pub use clip::clip_to_rect;
mod codec;
pub use codec::{decode_raster, encode_raster};
mod distance;
pub use distance::{
    compute_point_distance, nearest_distance, point_to_geometry_distance, prefilter,
    DEFAULT_PREFILTER_MULTIPLIER,
};
pub mod kriging;
pub use kriging::{CoordinateSystem, KrigingParams, OrdinaryKriging};
mod line;
mod roads;
pub use roads::{rasterize_roads, Rasterize, RoadRasterizer, DEFAULT_ROAD_VALUE};
pub mod sampling;
pub use sampling::{draw_samples, Points, Sample, SampleTask, WorkerPool};
mod solve;
mod source;
pub use source::{Feature, GeometrySource, LayerInfo, MemorySource, RoadClass};
mod tile;
pub use tile::{
    compute_tile, render_tile, Mode, Strategy, TileBuilder, TileOptions, AUTO_BRUTE_MAX_PIXELS,
    DEFAULT_SEED,
};
#[cfg(test)]
mod proptests;

/// 本库的错误类型
#[derive(Error, Clone, Debug, PartialEq)]
pub enum FieldError {
    /// 瓦片范围的某个方向跨度为零，或角点坐标不是有限值
    #[error("瓦片范围退化：宽度或高度为零，或角点坐标不是有限值")]
    DegenerateBoundingBox,

    /// 栅格的宽或高为零
    #[error("栅格的宽度和高度必须大于零")]
    EmptyRaster,

    /// 采样点数量配置无效
    #[error("无效的采样点数量: {0}")]
    InvalidSampleCount(String),

    /// 其他配置项无效
    #[error("无效的配置: {0}")]
    InvalidOption(String),

    /// 并行采样中有工作线程失败，整个请求作废
    #[error("采样失败: {0}")]
    SamplingFailed(String),

    /// 克里金插值在数值上失败（样本不足、变差函数退化或方程组奇异）
    #[error("插值失败: {0}")]
    InterpolationFailed(String),

    /// 数据源中不存在该图层
    #[error("图层 {0} 不存在")]
    MissingLayer(usize),

    /// 图像编码或解码失败
    #[error("图像编解码失败: {0}")]
    Codec(String),
}

/// 本库使用的结果类型，使用[FieldError]作为错误类型。
pub type Result<T> = std::result::Result<T, FieldError>;

/// 创建 `height` 行 `width` 列、全为零的栅格
pub fn create_raster(width: usize, height: usize) -> Array2<f64> {
    Array2::zeros((height, width))
}
