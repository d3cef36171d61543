use crate::{roads::RoadRasterizer, PixelCoordinate};

/// 将两个像素之间的线段栅格化（Bresenham 算法）
///
/// 两个端点都会被填充；端点已由 [crate::PixelMapping] 限制在栅格内，
/// 因此途经的像素不会越界。
///
/// # 参数
/// * `start` - 起点像素
/// * `end` - 终点像素
/// * `rasterizer` - 用于填充像素的栅格化器实例
pub fn rasterize_line(start: PixelCoordinate, end: PixelCoordinate, rasterizer: &mut RoadRasterizer) {
    let (mut row, mut col) = (start.row as isize, start.col as isize);
    let (end_row, end_col) = (end.row as isize, end.col as isize);

    let d_col = (end_col - col).abs();
    let d_row = -(end_row - row).abs();
    let step_col = if col < end_col { 1 } else { -1 };
    let step_row = if row < end_row { 1 } else { -1 };
    let mut error = d_col + d_row;

    loop {
        rasterizer.fill_pixel(row as usize, col as usize);
        if row == end_row && col == end_col {
            break;
        }
        let doubled = 2 * error;
        // 沿列方向前进
        if doubled >= d_row {
            error += d_row;
            col += step_col;
        }
        // 沿行方向前进
        if doubled <= d_col {
            error += d_col;
            row += step_row;
        }
    }
}
