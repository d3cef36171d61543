use std::io::Cursor;

use image::{GrayImage, ImageFormat, Luma};
use ndarray::Array2;

use crate::{FieldError, Result};

/// 将栅格编码为 8 位灰度 PNG
///
/// 像素值先限制到 `[0, 1]`，再按 `round(v * 255)` 量化。
pub fn encode_raster(image: &Array2<f64>) -> Result<Vec<u8>> {
    let (height, width) = image.dim();
    let gray = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let value = image[[y as usize, x as usize]].clamp(0.0, 1.0);
        Luma([(value * 255.0).round() as u8])
    });

    let mut buffer = Vec::new();
    gray.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|err| FieldError::Codec(err.to_string()))?;
    Ok(buffer)
}

/// 从图像字节解码栅格，任意格式先转为 8 位灰度，像素值为 `v / 255`
pub fn decode_raster(bytes: &[u8]) -> Result<Array2<f64>> {
    let gray = image::load_from_memory(bytes)
        .map_err(|err| FieldError::Codec(err.to_string()))?
        .into_luma8();
    let (width, height) = gray.dimensions();
    Ok(Array2::from_shape_fn(
        (height as usize, width as usize),
        |(row, col)| gray.get_pixel(col as u32, row as u32).0[0] as f64 / 255.0,
    ))
}
