//! Mask generation and alpha compositing
//!
//! Converts the model's output tensor into a per-pixel opacity mask at the
//! original image resolution, composites that mask as the alpha channel
//! over the original pixels, and encodes the result to PNG.

use crate::error::{Result, WorkerError};
use image::{DynamicImage, RgbaImage};
use ndarray::Array4;

/// Per-pixel opacity mask at original image resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    /// One opacity byte per pixel, row-major
    pub data: Vec<u8>,
    /// Mask dimensions as `(width, height)`
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask
    ///
    /// # Errors
    /// Returns `WorkerError::Processing` when `data` does not contain
    /// exactly `width * height` values.
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Result<Self> {
        let (width, height) = dimensions;
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(WorkerError::processing(format!(
                "Mask data length {} does not match {}x{} dimensions",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self { data, dimensions })
    }
}

/// Convert a `1x1xHxW` output tensor into a mask at the original resolution.
///
/// The model predicts on a fixed square input produced by stretching the
/// original image, so mapping back is a plain per-axis rescale with
/// nearest-neighbor sampling.
///
/// # Errors
/// Returns `WorkerError::Processing` for tensors that are not `1x1xHxW`
/// with non-zero spatial dimensions.
pub fn tensor_to_mask(tensor: &Array4<f32>, dimensions: (u32, u32)) -> Result<SegmentationMask> {
    let shape = tensor.shape();
    let (batch, channels) = (
        shape.first().copied().unwrap_or(0),
        shape.get(1).copied().unwrap_or(0),
    );
    let mask_height = shape.get(2).copied().unwrap_or(0);
    let mask_width = shape.get(3).copied().unwrap_or(0);
    if batch != 1 || channels != 1 || mask_height == 0 || mask_width == 0 {
        return Err(WorkerError::processing(format!(
            "Invalid output tensor shape {shape:?}: expected 1x1xHxW"
        )));
    }

    let (width, height) = dimensions;
    if width == 0 || height == 0 {
        return Err(WorkerError::processing(
            "Cannot build mask for zero-sized image",
        ));
    }

    let mut data = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let tensor_x = (x as usize * mask_width) / width as usize;
            let tensor_y = (y as usize * mask_height) / height as usize;
            let value = tensor
                .get([0, 0, tensor_y, tensor_x])
                .copied()
                .unwrap_or(0.0);
            data.push((value.clamp(0.0, 1.0) * 255.0) as u8);
        }
    }

    SegmentationMask::new(data, dimensions)
}

/// Composite the mask as the alpha channel over the original image pixels.
///
/// # Errors
/// Returns `WorkerError::Processing` when the mask dimensions do not match
/// the image dimensions.
pub fn composite_alpha(image: &DynamicImage, mask: &SegmentationMask) -> Result<RgbaImage> {
    let rgba_image = image.to_rgba8();
    let (width, height) = rgba_image.dimensions();
    if mask.dimensions != (width, height) {
        return Err(WorkerError::processing(format!(
            "Mask dimensions {}x{} do not match image {}x{}",
            mask.dimensions.0, mask.dimensions.1, width, height
        )));
    }

    let mut result = RgbaImage::new(width, height);
    for (x, y, pixel) in rgba_image.enumerate_pixels() {
        let pixel_index = (y * width + x) as usize;
        let alpha = mask.data.get(pixel_index).copied().unwrap_or(0);
        result.put_pixel(x, y, image::Rgba([pixel[0], pixel[1], pixel[2], alpha]));
    }

    Ok(result)
}

/// Encode a composited RGBA image to PNG bytes
///
/// # Errors
/// Returns `WorkerError::Image` on encoding failures.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    DynamicImage::ImageRgba8(image.clone()).write_to(&mut cursor, image::ImageFormat::Png)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_tensor(value: f32, size: usize) -> Array4<f32> {
        Array4::from_elem((1, 1, size, size), value)
    }

    #[test]
    fn test_tensor_to_mask_rejects_bad_shapes() {
        let tensor = Array4::<f32>::zeros((2, 1, 8, 8));
        assert!(tensor_to_mask(&tensor, (4, 4)).is_err());

        let tensor = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(tensor_to_mask(&tensor, (4, 4)).is_err());
    }

    #[test]
    fn test_tensor_to_mask_scales_and_clamps() {
        let mask = tensor_to_mask(&uniform_tensor(1.5, 8), (4, 2)).unwrap();
        assert_eq!(mask.dimensions, (4, 2));
        assert_eq!(mask.data.len(), 8);
        assert!(mask.data.iter().all(|&v| v == 255));

        let mask = tensor_to_mask(&uniform_tensor(-0.25, 8), (4, 2)).unwrap();
        assert!(mask.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_tensor_to_mask_resizes_to_original_dimensions() {
        // Left half foreground, right half background
        let mut tensor = Array4::<f32>::zeros((1, 1, 8, 8));
        for y in 0..8 {
            for x in 0..4 {
                tensor[[0, 0, y, x]] = 1.0;
            }
        }

        let mask = tensor_to_mask(&tensor, (16, 4)).unwrap();
        assert_eq!(mask.data.len(), 64);
        // Row-major: first 8 columns of each row map to the foreground half
        assert_eq!(mask.data[0], 255);
        assert_eq!(mask.data[7], 255);
        assert_eq!(mask.data[8], 0);
        assert_eq!(mask.data[15], 0);
    }

    #[test]
    fn test_composite_applies_mask_as_alpha() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            2,
            2,
            image::Rgba([10, 20, 30, 255]),
        ));
        let mask = SegmentationMask::new(vec![255, 128, 0, 64], (2, 2)).unwrap();

        let composited = composite_alpha(&image, &mask).unwrap();
        assert_eq!(composited.get_pixel(0, 0).0, [10, 20, 30, 255]);
        assert_eq!(composited.get_pixel(1, 0).0, [10, 20, 30, 128]);
        assert_eq!(composited.get_pixel(0, 1).0, [10, 20, 30, 0]);
        assert_eq!(composited.get_pixel(1, 1).0, [10, 20, 30, 64]);
    }

    #[test]
    fn test_composite_rejects_dimension_mismatch() {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        let mask = SegmentationMask::new(vec![0; 4], (2, 2)).unwrap();
        assert!(composite_alpha(&image, &mask).is_err());
    }

    #[test]
    fn test_encode_png_is_decodable() {
        let image = RgbaImage::from_pixel(3, 5, image::Rgba([1, 2, 3, 200]));
        let png = encode_png(&image).unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 3);
        assert_eq!(decoded.height(), 5);
    }

    #[test]
    fn test_mask_rejects_wrong_data_length() {
        assert!(SegmentationMask::new(vec![0; 3], (2, 2)).is_err());
    }
}
