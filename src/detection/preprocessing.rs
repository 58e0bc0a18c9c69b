use image::{DynamicImage, GrayImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter;
use imageproc::morphology;

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Edge-preserving smoothing.
///
/// Each output pixel is a weighted mean over a `diameter`-wide window, where
/// the weight is the product of a spatial Gaussian (`sigma_space`) and a
/// Gaussian on the intensity difference to the centre pixel (`sigma_color`).
/// Flat regions are smoothed while strong steps keep their contrast.
pub fn bilateral_filter(img: &GrayImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> GrayImage {
    if img.width() == 0 || img.height() == 0 {
        return img.clone();
    }
    filter::bilateral_filter(img, diameter, sigma_color, sigma_space)
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Bridge small gaps in the edge map: close, then dilate once more to thicken boundaries.
pub fn close_edges(edges: &GrayImage, radius: u8) -> GrayImage {
    let closed = morphology::close(edges, Norm::LInf, radius);
    morphology::dilate(&closed, Norm::LInf, radius)
}
