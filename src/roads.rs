use geo::{Geometry, GeometryCollection, LineString, MultiLineString, Point};
use itertools::Itertools;
use ndarray::Array2;

use crate::{clip::clip_to_rect, line::rasterize_line, BoundingBox, PixelMapping, Result};

/// 道路像素的默认取值
pub const DEFAULT_ROAD_VALUE: f64 = 1.0;

/// 定义栅格化能力的特性
///
/// 几何在调用前已经裁剪到瓦片内，坐标仍是地理坐标，
/// 由栅格化器负责映射到像素。
#[doc(hidden)]
pub trait Rasterize {
    /// 将自身绘制到栅格化器中
    fn rasterize(&self, rasterizer: &mut RoadRasterizer);
}

/// 道路栅格化器，把裁剪后的道路画进调用方持有的栅格。
///
/// 每个被道路经过的像素都直接覆盖为 `road_value`，不与原有的距离值混合。
#[derive(Debug)]
pub struct RoadRasterizer<'a> {
    /// 调用方持有的栅格
    pixels: &'a mut Array2<f64>,
    /// 地理坐标到像素坐标的映射
    mapping: PixelMapping,
    /// 道路像素的取值
    road_value: f64,
    /// 因类型不受支持而跳过的几何数量
    skipped: usize,
}

impl<'a> RoadRasterizer<'a> {
    /// 创建一个新的道路栅格化器
    ///
    /// # 错误
    /// 栅格为空或范围退化时返回相应错误
    pub fn new(pixels: &'a mut Array2<f64>, bbox: &BoundingBox, road_value: f64) -> Result<Self> {
        let (height, width) = pixels.dim();
        let mapping = PixelMapping::new(bbox, width, height)?;
        Ok(RoadRasterizer {
            pixels,
            mapping,
            road_value,
            skipped: 0,
        })
    }

    /// 因类型不受支持而跳过的几何数量
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub(crate) fn fill_pixel(&mut self, row: usize, col: usize) {
        debug_assert!(row < self.mapping.height());
        debug_assert!(col < self.mapping.width());
        self.pixels[[row, col]] = self.road_value;
    }

    fn skip(&mut self, kind: &str) {
        log::warn!("跳过不支持的裁剪结果类型: {kind}");
        self.skipped += 1;
    }
}

impl Rasterize for Point<f64> {
    /// 点没有长度，不绘制
    fn rasterize(&self, _rasterizer: &mut RoadRasterizer) {}
}

impl Rasterize for LineString<f64> {
    /// 依次连接相邻顶点对应的像素
    fn rasterize(&self, rasterizer: &mut RoadRasterizer) {
        for (start, end) in self.coords().tuple_windows() {
            let start = rasterizer.mapping.geo_to_pixel(*start);
            let end = rasterizer.mapping.geo_to_pixel(*end);
            rasterize_line(start, end, rasterizer);
        }
    }
}

impl Rasterize for MultiLineString<f64> {
    fn rasterize(&self, rasterizer: &mut RoadRasterizer) {
        self.iter()
            .for_each(|line_string| line_string.rasterize(rasterizer));
    }
}

impl Rasterize for GeometryCollection<f64> {
    /// 展开集合，逐个绘制其中的线
    fn rasterize(&self, rasterizer: &mut RoadRasterizer) {
        self.iter().for_each(|member| member.rasterize(rasterizer));
    }
}

impl Rasterize for Geometry<f64> {
    fn rasterize(&self, rasterizer: &mut RoadRasterizer) {
        match self {
            Geometry::Point(point) => point.rasterize(rasterizer),
            Geometry::Line(line) => {
                LineString::new(vec![line.start, line.end]).rasterize(rasterizer)
            }
            Geometry::LineString(line_string) => line_string.rasterize(rasterizer),
            Geometry::MultiLineString(lines) => lines.rasterize(rasterizer),
            Geometry::GeometryCollection(collection) => collection.rasterize(rasterizer),
            Geometry::Polygon(_) => rasterizer.skip("Polygon"),
            Geometry::MultiPolygon(_) => rasterizer.skip("MultiPolygon"),
            Geometry::MultiPoint(_) => rasterizer.skip("MultiPoint"),
            Geometry::Rect(_) => rasterizer.skip("Rect"),
            Geometry::Triangle(_) => rasterizer.skip("Triangle"),
        }
    }
}

/// 把与瓦片相交的道路画进栅格
///
/// `roads` 应是未经预筛选的完整道路集合。每条道路先裁剪到瓦片矩形，
/// 再把裁剪结果的每一段线画成 `road_value`。
///
/// # 示例
///
/// ```rust
/// # fn main() -> road_distance_field::Result<()> {
/// use geo::{Geometry, LineString};
/// use road_distance_field::{create_raster, rasterize_roads, BoundingBox};
///
/// let roads: Vec<Geometry<f64>> = vec![LineString::from(vec![(10., 10.), (20., 20.)]).into()];
/// let mut image = create_raster(100, 200);
/// rasterize_roads(&mut image, &roads, &BoundingBox::new((0., 0.), (100., 200.)), 1.0)?;
/// assert_eq!(image[[15, 15]], 1.0);
/// assert_eq!(image[[0, 0]], 0.0);
/// # Ok(())}
/// ```
pub fn rasterize_roads(
    image: &mut Array2<f64>,
    roads: &[Geometry<f64>],
    bbox: &BoundingBox,
    road_value: f64,
) -> Result<()> {
    let tile = bbox.to_rect();
    let mut rasterizer = RoadRasterizer::new(image, bbox, road_value)?;

    roads
        .iter()
        .filter_map(|road| clip_to_rect(road, &tile))
        .for_each(|clipped| clipped.rasterize(&mut rasterizer));

    if rasterizer.skipped() > 0 {
        log::warn!("共有 {} 个几何因类型不受支持未被绘制", rasterizer.skipped());
    }
    Ok(())
}
