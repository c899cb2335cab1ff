//! 映像キャプチャ
//!
//! 送出されたラインバッファを ARGB のフレームバッファに展開する。
//! ウィンドウ表示・スクリーンショット・テストで共通に使う。

use std::path::Path;

use crate::render::LineBuffer;
use crate::timing::{TimingProfile, VideoStandard, DISPLAY_LINES, DISPLAY_PIXELS};
use crate::video::{SyncArm, VideoSignal};

/// 表示用フレームの高さ（コンポジットは縦2倍にする）
pub const DISPLAY_HEIGHT: usize = DISPLAY_LINES * 2;

/// 白黒モニタ風の既定色
pub const DEFAULT_FOREGROUND: u32 = 0xFFE8_E8E8;
pub const DEFAULT_BACKGROUND: u32 = 0xFF10_1010;

pub struct FrameCapture {
    profile: &'static TimingProfile,
    pixels: Vec<u32>,
    foreground: u32,
    background: u32,
    frames_completed: u64,
    lines_this_frame: usize,
    lines_last_frame: usize,
}

impl FrameCapture {
    pub fn new(standard: VideoStandard) -> Self {
        let profile = standard.profile();
        let height = profile.visible_lines() as usize;
        FrameCapture {
            profile,
            pixels: vec![DEFAULT_BACKGROUND; DISPLAY_PIXELS * height],
            foreground: DEFAULT_FOREGROUND,
            background: DEFAULT_BACKGROUND,
            frames_completed: 0,
            lines_this_frame: 0,
            lines_last_frame: 0,
        }
    }

    /// 表示色を変更（ARGB）
    pub fn with_colors(mut self, foreground: u32, background: u32) -> Self {
        self.foreground = foreground;
        self.background = background;
        self.pixels.fill(background);
        self
    }

    pub fn width(&self) -> usize {
        DISPLAY_PIXELS
    }

    /// 物理表示ライン数（VGA 416、コンポジット 208）
    pub fn height(&self) -> usize {
        self.profile.visible_lines() as usize
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * DISPLAY_PIXELS + x]
    }

    pub fn foreground(&self) -> u32 {
        self.foreground
    }

    /// 垂直同期まで到達したフレーム数
    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    /// 直前に完了したフレームで受け取ったライン数
    pub fn lines_last_frame(&self) -> usize {
        self.lines_last_frame
    }

    /// 576x416 に揃えたフレーム
    pub fn display_frame(&self) -> Vec<u32> {
        let repeat = DISPLAY_HEIGHT / self.height();
        let mut out = Vec::with_capacity(DISPLAY_PIXELS * DISPLAY_HEIGHT);
        for row in self.pixels.chunks_exact(DISPLAY_PIXELS) {
            for _ in 0..repeat {
                out.extend_from_slice(row);
            }
        }
        out
    }

    /// PNG で保存
    pub fn save_png(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let file = std::fs::File::create(path)?;
        let w = std::io::BufWriter::new(file);
        let mut encoder = png::Encoder::new(w, DISPLAY_PIXELS as u32, DISPLAY_HEIGHT as u32);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder.write_header()?;

        let frame = self.display_frame();
        let mut rgb_data = Vec::with_capacity(frame.len() * 3);
        for pixel in frame.iter() {
            rgb_data.push(((pixel >> 16) & 0xFF) as u8);
            rgb_data.push(((pixel >> 8) & 0xFF) as u8);
            rgb_data.push((pixel & 0xFF) as u8);
        }

        writer.write_image_data(&rgb_data)?;
        Ok(())
    }

    /// 日時付きのファイル名でディレクトリに保存し、保存先を返す
    pub fn save_screenshot(&self, dir: &Path) -> Result<String, String> {
        std::fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
        let name = format!("vdm1_{}.png", chrono::Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(name);
        self.save_png(&path)
            .map_err(|e| format!("Failed to save screenshot: {}", e))?;
        Ok(path.display().to_string())
    }

    fn is_vertical_sync(&self, arm: SyncArm) -> bool {
        match arm {
            SyncArm::HsyncCompare(compare) => compare < self.profile.hsync_start(),
            SyncArm::VsyncLow => true,
            SyncArm::VsyncHigh => false,
        }
    }
}

impl VideoSignal for FrameCapture {
    fn arm_sync(&mut self, arm: SyncArm) {
        if self.is_vertical_sync(arm) {
            self.frames_completed += 1;
            self.lines_last_frame = self.lines_this_frame;
            self.lines_this_frame = 0;
        }
    }

    fn transmit(&mut self, scanline: u16, line: &LineBuffer) {
        let vbp = self.profile.vbp;
        if scanline < vbp {
            return;
        }
        let y = (scanline - vbp) as usize;
        if y >= self.height() {
            return;
        }
        let (fg, bg) = (self.foreground, self.background);
        let row = &mut self.pixels[y * DISPLAY_PIXELS..(y + 1) * DISPLAY_PIXELS];
        for (x, px) in row.iter_mut().enumerate() {
            *px = if line.pixel(x) { fg } else { bg };
        }
        self.lines_this_frame += 1;
    }
}
