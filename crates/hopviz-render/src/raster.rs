use image::{Rgb, RgbImage};
use rayon::prelude::*;

pub const FIGURE: Rgb<u8> = Rgb([248, 248, 248]);
pub const PLOT: Rgb<u8> = Rgb([255, 255, 255]);
pub const GRID: Rgb<u8> = Rgb([210, 210, 210]);
pub const FRAME: Rgb<u8> = Rgb([40, 40, 40]);
pub const INK: Rgb<u8> = Rgb([30, 30, 30]);

const DASH: u32 = 4;

/// Pixel rectangle with inclusive edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    fn on_edge(&self, x: u32, y: u32) -> bool {
        x == self.left || x == self.right || y == self.top || y == self.bottom
    }
}

/// Everything static behind the data: figure fill, plot frame, dashed grid.
pub struct Backdrop<'a> {
    pub plot: Rect,
    pub grid_x: &'a [u32],
    pub grid_y: &'a [u32],
}

pub fn paint_backdrop(image: &mut RgbImage, backdrop: &Backdrop<'_>) {
    let width = image.width() as usize;
    if width == 0 {
        return;
    }

    image
        .par_chunks_mut(width * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.chunks_exact_mut(3).enumerate() {
                let color = backdrop_color(backdrop, x as u32, y as u32);
                pixel.copy_from_slice(&color.0);
            }
        });
}

fn backdrop_color(backdrop: &Backdrop<'_>, x: u32, y: u32) -> Rgb<u8> {
    let plot = backdrop.plot;
    if !plot.contains(x, y) {
        return FIGURE;
    }
    if plot.on_edge(x, y) {
        return FRAME;
    }

    let vertical = backdrop.grid_x.contains(&x) && (y / DASH) % 2 == 0;
    let horizontal = backdrop.grid_y.contains(&y) && (x / DASH) % 2 == 0;
    if vertical || horizontal {
        GRID
    } else {
        PLOT
    }
}

pub fn put(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, color);
    }
}

pub fn fill_rect(image: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>) {
    for dy in 0..h as i32 {
        for dx in 0..w as i32 {
            put(image, x + dx, y + dy, color);
        }
    }
}

pub fn outline_rect(image: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>) {
    let (right, bottom) = (x + w as i32 - 1, y + h as i32 - 1);
    for px in x..=right {
        put(image, px, y, color);
        put(image, px, bottom, color);
    }
    for py in y..=bottom {
        put(image, x, py, color);
        put(image, right, py, color);
    }
}

pub fn draw_line(
    image: &mut RgbImage,
    from: (f32, f32),
    to: (f32, f32),
    thickness: u32,
    color: Rgb<u8>,
) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as i32;
    let half = thickness as i32 / 2;

    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        let x = (from.0 + dx * t).round() as i32;
        let y = (from.1 + dy * t).round() as i32;
        fill_rect(image, x - half, y - half, thickness.max(1), thickness.max(1), color);
    }
}

pub fn draw_disc(image: &mut RgbImage, center: (f32, f32), radius: i32, color: Rgb<u8>) {
    let (cx, cy) = (center.0.round() as i32, center.1.round() as i32);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put(image, cx + dx, cy + dy, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backdrop_frames_the_plot_and_dashes_grid() {
        let mut image = RgbImage::new(40, 30);
        let plot = Rect {
            left: 5,
            top: 5,
            right: 34,
            bottom: 24,
        };
        paint_backdrop(
            &mut image,
            &Backdrop {
                plot,
                grid_x: &[20],
                grid_y: &[],
            },
        );

        assert_eq!(*image.get_pixel(0, 0), FIGURE);
        assert_eq!(*image.get_pixel(5, 10), FRAME);
        assert_eq!(*image.get_pixel(20, 8), GRID);
        assert_eq!(*image.get_pixel(20, 12), PLOT);
        assert_eq!(*image.get_pixel(10, 10), PLOT);
    }

    #[test]
    fn drawing_clips_at_image_edges() {
        let mut image = RgbImage::new(10, 10);
        draw_line(&mut image, (-5.0, 5.0), (15.0, 5.0), 2, INK);
        draw_disc(&mut image, (0.0, 0.0), 3, INK);
        assert_eq!(*image.get_pixel(9, 5), INK);
        assert_eq!(*image.get_pixel(0, 0), INK);
    }
}
