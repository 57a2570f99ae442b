use image::DynamicImage;
use ndarray::Array3;

/// Converts a decoded image into an (H, W, 3) float tensor, scaling every
/// channel by `scale` (1/255 maps the standard byte range into [0, 1]).
pub(crate) fn normalize_image(image: &DynamicImage, scale: f32) -> Array3<f32> {
    let image = image.to_rgb8();
    Array3::from_shape_fn(
        (image.height() as usize, image.width() as usize, 3),
        |(y, x, ch)| image.get_pixel(x as u32, y as u32).0[ch] as f32 * scale,
    )
}
