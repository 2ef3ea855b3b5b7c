//! Candlestick chart rendering for result notifications.
//!
//! Each evaluation attempt produces a PNG of the candles around the
//! entry window, with a marker on the evaluated candle. Files land in
//! the configured chart directory and are deleted once sent; the
//! instrument and verdict text travel in the Telegram caption.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::types::{Candle, CandleColor};

/// Visual configuration for rendered charts.
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    pub background: Rgb<u8>,
    pub bullish: Rgb<u8>,
    pub bearish: Rgb<u8>,
    pub neutral: Rgb<u8>,
    pub grid: Rgb<u8>,
    pub margin: u32,
    pub volume_height: u32,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            background: Rgb([24, 26, 32]),
            bullish: Rgb([25, 183, 111]),
            bearish: Rgb([253, 68, 70]),
            neutral: Rgb([148, 148, 148]),
            grid: Rgb([52, 56, 64]),
            margin: 16,
            volume_height: 80,
        }
    }
}

impl ChartStyle {
    fn color_for(&self, color: CandleColor) -> Rgb<u8> {
        match color {
            CandleColor::Up => self.bullish,
            CandleColor::Down => self.bearish,
            CandleColor::Neutral => self.neutral,
        }
    }
}

/// Renders evaluation charts to disk and cleans them up after use.
pub trait ChartRenderer: Send + Sync {
    /// Draws `candles` and returns the path of the saved PNG.
    fn render(&self, candles: &[Candle], title: &str, subtitle: &str) -> Result<PathBuf>;

    /// Removes a previously rendered chart. Failures are logged, never
    /// propagated; a stale file must not abort signal tracking.
    fn discard(&self, path: &Path);
}

/// File-backed candlestick renderer.
pub struct CandleChart {
    dir: PathBuf,
    style: ChartStyle,
}

impl CandleChart {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            style: ChartStyle::default(),
        }
    }

    pub fn with_style(dir: impl Into<PathBuf>, style: ChartStyle) -> Self {
        Self {
            dir: dir.into(),
            style,
        }
    }

    fn unique_path(&self) -> PathBuf {
        let mut path = self.dir.join(format!("chart-{}.png", Uuid::new_v4()));
        while path.exists() {
            path = self.dir.join(format!("chart-{}.png", Uuid::new_v4()));
        }
        path
    }

    fn draw(&self, candles: &[Candle]) -> RgbImage {
        let style = &self.style;
        let mut img = RgbImage::from_pixel(style.width, style.height, style.background);

        let price_top = style.margin;
        let price_bottom = style
            .height
            .saturating_sub(style.volume_height + 2 * style.margin);
        let price_height = price_bottom.saturating_sub(price_top).max(1);
        let volume_base = style.height.saturating_sub(style.margin);

        let (low, high) = price_span(candles);
        let range = if high > low { high - low } else { 1.0 };
        let price_to_y = |price: f64| -> u32 {
            let ratio = ((high - price) / range).clamp(0.0, 1.0);
            price_top + (ratio * price_height as f64).round() as u32
        };

        for step in 1..4 {
            let y = price_top + price_height * step / 4;
            draw_horizontal_line(&mut img, y, style.margin, style.width - style.margin, style.grid);
        }

        let max_volume = candles.iter().map(|c| c.volume).fold(0.0f64, f64::max);
        let slot = ((style.width - 2 * style.margin) / candles.len() as u32).max(1);
        let gap = (slot / 5).max(1);

        for (i, candle) in candles.iter().enumerate() {
            let x0 = style.margin + slot * i as u32;
            let center = x0 + slot / 2;
            let color = style.color_for(candle.color());

            draw_vertical_line(
                &mut img,
                center,
                price_to_y(candle.high),
                price_to_y(candle.low),
                color,
            );

            let top = price_to_y(candle.open.max(candle.close));
            let bottom = price_to_y(candle.open.min(candle.close));
            let body_width = slot.saturating_sub(2 * gap).max(1);
            draw_filled_rect(
                &mut img,
                x0 + gap,
                top,
                body_width,
                bottom.saturating_sub(top).max(1),
                color,
            );

            if max_volume > 0.0 {
                let bar = ((candle.volume / max_volume) * style.volume_height as f64).round() as u32;
                if bar > 0 {
                    draw_filled_rect(
                        &mut img,
                        x0 + gap,
                        volume_base.saturating_sub(bar),
                        body_width,
                        bar,
                        color,
                    );
                }
            }
        }

        if let Some(last) = candles.last() {
            let x = style.margin + slot * (candles.len() as u32 - 1) + slot / 2;
            match last.color() {
                CandleColor::Up => {
                    draw_triangle_up(&mut img, x, price_to_y(last.low) + 8, style.bullish);
                }
                CandleColor::Down => {
                    draw_triangle_down(
                        &mut img,
                        x,
                        price_to_y(last.high).saturating_sub(8),
                        style.bearish,
                    );
                }
                CandleColor::Neutral => {
                    draw_filled_rect(
                        &mut img,
                        x.saturating_sub(2),
                        price_to_y(last.high).saturating_sub(10),
                        4,
                        4,
                        style.neutral,
                    );
                }
            }
        }

        img
    }
}

impl ChartRenderer for CandleChart {
    fn render(&self, candles: &[Candle], title: &str, subtitle: &str) -> Result<PathBuf> {
        if candles.is_empty() {
            return Err(AppError::Render("no candles to draw".to_string()));
        }

        fs::create_dir_all(&self.dir)?;
        let img = self.draw(candles);
        let path = self.unique_path();
        img.save(&path)?;
        debug!(
            "Rendered chart for {} ({}) at {}",
            title,
            subtitle,
            path.display()
        );
        Ok(path)
    }

    fn discard(&self, path: &Path) {
        if let Err(err) = fs::remove_file(path) {
            warn!("Failed to remove chart {}: {}", path.display(), err);
        }
    }
}

fn price_span(candles: &[Candle]) -> (f64, f64) {
    let low = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let high = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    (low, high)
}

fn draw_filled_rect(img: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
    let img_width = img.width();
    let img_height = img.height();
    for dy in 0..height {
        for dx in 0..width {
            let px = x + dx;
            let py = y + dy;
            if px < img_width && py < img_height {
                img.put_pixel(px, py, color);
            }
        }
    }
}

fn draw_vertical_line(img: &mut RgbImage, x: u32, y1: u32, y2: u32, color: Rgb<u8>) {
    let (start, end) = if y1 < y2 { (y1, y2) } else { (y2, y1) };
    if x < img.width() {
        let limit = img.height() - 1;
        for y in start..=end.min(limit) {
            img.put_pixel(x, y, color);
        }
    }
}

fn draw_horizontal_line(img: &mut RgbImage, y: u32, x1: u32, x2: u32, color: Rgb<u8>) {
    let (start, end) = if x1 < x2 { (x1, x2) } else { (x2, x1) };
    if y < img.height() {
        let limit = img.width() - 1;
        for x in start..=end.min(limit) {
            img.put_pixel(x, y, color);
        }
    }
}

fn draw_triangle_up(img: &mut RgbImage, x: u32, apex_y: u32, color: Rgb<u8>) {
    for row in 0..6u32 {
        draw_horizontal_line(img, apex_y + row, x.saturating_sub(row), x + row, color);
    }
}

fn draw_triangle_down(img: &mut RgbImage, x: u32, apex_y: u32, color: Rgb<u8>) {
    for row in 0..6u32 {
        draw_horizontal_line(
            img,
            apex_y.saturating_sub(row),
            x.saturating_sub(row),
            x + row,
            color,
        );
    }
}
