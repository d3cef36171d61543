use ndarray::Array2;

/// 默认的信号放大倍数
pub const DEFAULT_BOOST: f64 = 1000.0;

/// 将每个像素乘以 `level`，再限制到 `[0, 1]`
///
/// 距离通常以度为单位，数值很小；放大后得到适合导出为 8 位图像的信号。
///
/// # 示例
///
/// ```rust
/// use road_distance_field::{apply_boost, create_raster};
///
/// let mut image = create_raster(100, 200);
/// image[[50, 50]] = 0.01;
/// apply_boost(&mut image, 1000.0);
/// assert_eq!(image[[50, 50]], 1.0);
/// assert_eq!(image[[0, 0]], 0.0);
/// ```
pub fn apply_boost(image: &mut Array2<f64>, level: f64) {
    image.mapv_inplace(|value| (value * level).clamp(0.0, 1.0));
}
