use euclid::{Transform2D, UnknownUnit};
use geo::{Coord, Rect};

use crate::{FieldError, Result};

/// 仿射变换，用于描述地理坐标与像素坐标之间的换算。
pub type Transform = Transform2D<f64, UnknownUnit, UnknownUnit>;
/// 欧几里得点类型，仅用于内部坐标换算。
type EuclidPoint = euclid::Point2D<f64, UnknownUnit>;

/// 瓦片的地理范围，由西北角和东南角两个角点确定。
///
/// 两个方向上的跨度都允许为负：代码不假设 west < east 或 north > south，
/// 映射关系由 [PixelMapping] 统一处理。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// 西北角 `(经度, 纬度)`
    pub west_north: Coord<f64>,
    /// 东南角 `(经度, 纬度)`
    pub east_south: Coord<f64>,
}

impl BoundingBox {
    /// 由两个角点创建范围，不做校验
    ///
    /// 校验推迟到构建 [PixelMapping] 时进行，退化的范围在那里被拒绝。
    pub fn new(west_north: impl Into<Coord<f64>>, east_south: impl Into<Coord<f64>>) -> Self {
        BoundingBox {
            west_north: west_north.into(),
            east_south: east_south.into(),
        }
    }

    /// 经度方向的跨度（有符号）
    pub fn width(&self) -> f64 {
        self.east_south.x - self.west_north.x
    }

    /// 纬度方向的跨度（有符号）
    pub fn height(&self) -> f64 {
        self.east_south.y - self.west_north.y
    }

    /// 两个角点，依次为西北角和东南角
    pub fn corners(&self) -> [Coord<f64>; 2] {
        [self.west_north, self.east_south]
    }

    /// 转换为轴对齐矩形，用作栅格化时的裁剪区域
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(self.west_north, self.east_south)
    }

    /// 检查范围是否可以用于坐标映射
    ///
    /// # 错误
    /// 任一角点坐标非有限，或任一方向跨度为零时返回
    /// [FieldError::DegenerateBoundingBox]
    pub fn validate(&self) -> Result<()> {
        let finite = self
            .corners()
            .iter()
            .all(|corner| corner.x.is_finite() && corner.y.is_finite());
        if !finite || self.width() == 0. || self.height() == 0. {
            return Err(FieldError::DegenerateBoundingBox);
        }
        Ok(())
    }
}

/// 像素坐标，总是被限制在栅格的有效范围内
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelCoordinate {
    pub row: usize,
    pub col: usize,
}

/// 地理坐标与像素坐标之间唯一的映射。
///
/// 纬度沿行方向变化，经度沿列方向变化：
///
/// ```text
/// col = (lon - lon_wn) / step_x      step_x = (lon_es - lon_wn) / width
/// row = (lat - lat_wn) / step_y      step_y = (lat_es - lat_wn) / height
/// ```
///
/// 道路栅格化、暴力计算和克里金网格都通过这个类型换算坐标，
/// 越界的结果一律按 `(行, 列)` 的顺序限制到栅格内。
///
/// # 示例
///
/// ```rust
/// # fn main() -> road_distance_field::Result<()> {
/// use road_distance_field::{BoundingBox, PixelMapping};
///
/// let bbox = BoundingBox::new((0., 0.), (100., 200.));
/// let mapping = PixelMapping::new(&bbox, 100, 200)?;
/// let pixel = mapping.geo_to_pixel((100., 100.).into());
/// assert_eq!((pixel.row, pixel.col), (100, 99));
/// # Ok(())}
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PixelMapping {
    width: usize,
    height: usize,
    step_x: f64,
    step_y: f64,
    geo_to_pix: Transform,
    pix_to_geo: Transform,
}

impl PixelMapping {
    /// 为 `width` x `height` 的栅格建立映射
    ///
    /// # 错误
    /// * 栅格宽或高为零时返回 [FieldError::EmptyRaster]
    /// * 范围退化时返回 [FieldError::DegenerateBoundingBox]
    pub fn new(bbox: &BoundingBox, width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(FieldError::EmptyRaster);
        }
        bbox.validate()?;

        let origin = bbox.west_north;
        let step_x = bbox.width() / width as f64;
        let step_y = bbox.height() / height as f64;
        if !(step_x.is_finite() && step_y.is_finite()) || step_x == 0. || step_y == 0. {
            return Err(FieldError::DegenerateBoundingBox);
        }

        let geo_to_pix =
            Transform::translation(-origin.x, -origin.y).then_scale(1. / step_x, 1. / step_y);
        let pix_to_geo = Transform::scale(step_x, step_y)
            .then_translate(euclid::vec2(origin.x, origin.y));

        Ok(PixelMapping {
            width,
            height,
            step_x,
            step_y,
            geo_to_pix,
            pix_to_geo,
        })
    }

    /// 栅格宽度（列数）
    pub fn width(&self) -> usize {
        self.width
    }

    /// 栅格高度（行数）
    pub fn height(&self) -> usize {
        self.height
    }

    /// 每个像素对应的经度、纬度步长（有符号）
    pub fn steps(&self) -> (f64, f64) {
        (self.step_x, self.step_y)
    }

    /// 地理坐标到像素坐标的变换矩阵
    pub fn geo_to_pix(&self) -> Transform {
        self.geo_to_pix
    }

    /// 地理坐标映射为像素坐标，结果向下取整并限制在栅格范围内
    pub fn geo_to_pixel(&self, coord: Coord<f64>) -> PixelCoordinate {
        let pixel = self
            .geo_to_pix
            .transform_point(EuclidPoint::new(coord.x, coord.y));
        PixelCoordinate {
            row: clamp_index(pixel.y, self.height),
            col: clamp_index(pixel.x, self.width),
        }
    }

    /// 像素左上角对应的地理坐标
    pub fn pixel_to_geo(&self, row: usize, col: usize) -> Coord<f64> {
        self.pix_to_geo
            .transform_point(EuclidPoint::new(col as f64, row as f64))
            .to_tuple()
            .into()
    }
}

/// 距离像素边界小于该值的坐标视为落在边界上，抵消换算中的舍入误差
const SNAP_TOLERANCE: f64 = 1e-6;

// NaN 落到 0
fn clamp_index(value: f64, len: usize) -> usize {
    let floored = (value + SNAP_TOLERANCE).floor();
    if floored.is_nan() || floored <= 0. {
        0
    } else if floored >= (len - 1) as f64 {
        len - 1
    } else {
        floored as usize
    }
}
