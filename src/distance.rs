//! 点到道路几何的最近距离，以及按瓦片范围预筛选候选道路。

use geo::{Coord, Distance, Euclidean, Geometry, LineString, Point};

use crate::BoundingBox;

/// 预筛选半径相对瓦片跨度的默认倍数
pub const DEFAULT_PREFILTER_MULTIPLIER: f64 = 2.5;

/// 点到单个几何的欧几里得最近距离
///
/// 支持点、线段、线串、多线串以及由它们组成的几何集合；
/// 其余几何类型（多边形、多点、矩形、三角形等）没有定义距离，返回 `None`。
pub fn point_to_geometry_distance(point: Point<f64>, geometry: &Geometry<f64>) -> Option<f64> {
    match geometry {
        Geometry::Point(other) => Some(Euclidean.distance(&point, other)),
        Geometry::Line(line) => Some(Euclidean.distance(&point, line)),
        Geometry::LineString(line_string) => line_string_distance(point, line_string),
        Geometry::MultiLineString(lines) => lines
            .iter()
            .filter_map(|line_string| line_string_distance(point, line_string))
            .min_by(f64::total_cmp),
        Geometry::GeometryCollection(collection) => collection
            .iter()
            .filter_map(|member| point_to_geometry_distance(point, member))
            .min_by(f64::total_cmp),
        Geometry::Polygon(_)
        | Geometry::MultiPolygon(_)
        | Geometry::MultiPoint(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => None,
    }
}

// geo 对少于两个顶点的线串给出的是哨兵值而不是距离，这里单独处理
fn line_string_distance(point: Point<f64>, line_string: &LineString<f64>) -> Option<f64> {
    match line_string.0.as_slice() {
        [] => None,
        [only] => Some(Euclidean.distance(&point, &Point::from(*only))),
        _ => Some(Euclidean.distance(&point, line_string)),
    }
}

/// 点到一组几何的最近距离
///
/// 集合中没有任何支持的几何时返回 `None`。
pub fn nearest_distance<'a, I>(point: Point<f64>, geometries: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a Geometry<f64>>,
{
    geometries
        .into_iter()
        .filter_map(|geometry| point_to_geometry_distance(point, geometry))
        .min_by(f64::total_cmp)
}

/// 计算单个坐标到最近道路的距离
///
/// # 示例
///
/// ```rust
/// use geo::{Geometry, LineString};
/// use road_distance_field::compute_point_distance;
///
/// let roads: Vec<Geometry<f64>> = vec![
///     LineString::from(vec![(100., 100.), (50., 50.)]).into(),
///     LineString::from(vec![(10., 10.), (20., 20.)]).into(),
/// ];
/// assert_eq!(compute_point_distance(&roads, (21., 20.).into()), Some(1.));
/// ```
pub fn compute_point_distance(roads: &[Geometry<f64>], coord: Coord<f64>) -> Option<f64> {
    nearest_distance(Point::from(coord), roads)
}

/// 只保留离瓦片足够近的道路
///
/// 半径为 `max(|multiplier * 经度跨度|, |multiplier * 纬度跨度|)`，
/// 道路到任一角点的距离小于半径即保留。返回的引用保持输入顺序。
/// 没有定义距离的几何类型不会被保留。
pub fn prefilter<'a>(
    roads: &'a [Geometry<f64>],
    bbox: &BoundingBox,
    multiplier: f64,
) -> Vec<&'a Geometry<f64>> {
    let radius = (multiplier * bbox.width())
        .abs()
        .max((multiplier * bbox.height()).abs());
    let [west_north, east_south] = bbox.corners().map(Point::from);

    roads
        .iter()
        .filter(|road| {
            let near_west_north = point_to_geometry_distance(west_north, road);
            let near_east_south = point_to_geometry_distance(east_south, road);
            match (near_west_north, near_east_south) {
                (Some(a), Some(b)) => a.min(b) < radius,
                _ => false,
            }
        })
        .collect()
}
