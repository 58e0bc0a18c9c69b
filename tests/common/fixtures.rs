use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point as PixelPoint;
use tempfile::NamedTempFile;

pub const BACKGROUND: u8 = 230;
pub const CARD: u8 = 40;

/// Axis-aligned dark rectangle: top-left corner and size.
#[derive(Debug, Clone, Copy)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }
}

/// Light grayscale canvas with each rectangle filled dark.
pub fn card_image(width: u32, height: u32, rects: &[Rect]) -> DynamicImage {
    let mut img = GrayImage::from_pixel(width, height, Luma([BACKGROUND]));
    for r in rects {
        for y in r.y..(r.y + r.height).min(height) {
            for x in r.x..(r.x + r.width).min(width) {
                img.put_pixel(x, y, Luma([CARD]));
            }
        }
    }
    DynamicImage::ImageLuma8(img)
}

/// Light canvas with one dark filled polygon (corners in drawing order).
pub fn polygon_image(width: u32, height: u32, corners: &[(f32, f32)]) -> DynamicImage {
    let mut img = GrayImage::from_pixel(width, height, Luma([BACKGROUND]));
    let poly: Vec<PixelPoint<i32>> = corners
        .iter()
        .map(|&(x, y)| PixelPoint::new(x.round() as i32, y.round() as i32))
        .collect();
    draw_polygon_mut(&mut img, &poly, Luma([CARD]));
    DynamicImage::ImageLuma8(img)
}

/// Corners of a `width`x`height` rectangle centred on `(cx, cy)`, rotated
/// clockwise by `degrees`, as `[top-left, top-right, bottom-right, bottom-left]`.
pub fn rotated_rect(cx: f32, cy: f32, width: f32, height: f32, degrees: f32) -> [(f32, f32); 4] {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (hw, hh) = (width / 2.0, height / 2.0);
    [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(dx, dy)| {
        (cx + dx * cos - dy * sin, cy + dx * sin + dy * cos)
    })
}

/// One 160x110 card on a 320x240 canvas.
pub fn single_card() -> (DynamicImage, Rect) {
    let rect = Rect::new(80, 60, 160, 110);
    (card_image(320, 240, &[rect]), rect)
}

/// Two cards of different size; the second one is larger.
pub fn two_cards() -> (DynamicImage, Rect, Rect) {
    let small = Rect::new(20, 20, 100, 80);
    let large = Rect::new(170, 120, 120, 90);
    (card_image(320, 240, &[small, large]), small, large)
}

/// Smooth RGB gradient, useful for comparing resampled pixels.
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    DynamicImage::ImageRgb8(img)
}

/// Save an image as a temporary PNG file.
/// The file is removed when the returned handle is dropped.
pub fn save_temp_png(img: &DynamicImage) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}
