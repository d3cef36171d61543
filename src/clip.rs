//! 将道路几何裁剪到瓦片矩形内。

use geo::{
    BooleanOps, BoundingRect, Geometry, GeometryCollection, Intersects, LineString,
    MultiLineString, Rect,
};

/// 计算几何与瓦片矩形的交集
///
/// 矩形转换为多边形后与线求交。返回值可能是：
/// * `None` - 几何与矩形不相交
/// * `Point` - 点落在矩形内（含边界）
/// * `LineString` / `MultiLineString` - 线被裁剪后留下的一段或多段
/// * `GeometryCollection` - 集合中每个成员分别裁剪
///
/// 其他几何类型不做裁剪：只要外包矩形与瓦片相交就原样返回，
/// 由调用方决定如何处理。
pub fn clip_to_rect(geometry: &Geometry<f64>, rect: &Rect<f64>) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::Point(point) => rect.intersects(point).then_some(Geometry::Point(*point)),
        Geometry::Line(line) => {
            let lines = MultiLineString::new(vec![LineString::new(vec![line.start, line.end])]);
            clip_lines(&lines, rect).map(single_or_multi)
        }
        Geometry::LineString(line_string) => {
            let lines = MultiLineString::new(vec![line_string.clone()]);
            clip_lines(&lines, rect).map(single_or_multi)
        }
        Geometry::MultiLineString(lines) => {
            clip_lines(lines, rect).map(Geometry::MultiLineString)
        }
        Geometry::GeometryCollection(collection) => {
            let members: Vec<_> = collection
                .iter()
                .filter_map(|member| clip_to_rect(member, rect))
                .collect();
            (!members.is_empty())
                .then(|| Geometry::GeometryCollection(GeometryCollection(members)))
        }
        other => other
            .bounding_rect()
            .filter(|bounds| bounds.intersects(rect))
            .map(|_| other.clone()),
    }
}

/// 用矩形多边形裁剪线，外包矩形不相交时直接跳过
fn clip_lines(lines: &MultiLineString<f64>, rect: &Rect<f64>) -> Option<MultiLineString<f64>> {
    let bounds = lines.bounding_rect()?;
    if !bounds.intersects(rect) {
        return None;
    }
    let clipped = rect.to_polygon().clip(lines, false);
    (!clipped.0.is_empty()).then_some(clipped)
}

fn single_or_multi(mut lines: MultiLineString<f64>) -> Geometry<f64> {
    if lines.0.len() == 1 {
        Geometry::LineString(lines.0.remove(0))
    } else {
        Geometry::MultiLineString(lines)
    }
}
