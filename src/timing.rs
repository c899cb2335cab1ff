//! ビデオタイミング定数
//!
//! 表示領域は 576 ピクセル x 208 ラスタ行（64桁x9ピクセル、16行x13ライン）。
//! VGA は各ラスタ行を2回走査するので物理的には 416 ライン。

use serde::{Deserialize, Serialize};

/// 表示領域の幅（ピクセル）
pub const DISPLAY_PIXELS: usize = 64 * 9;
/// 表示領域の高さ（ラスタ行）
pub const DISPLAY_LINES: usize = 16 * 13;

/// 出力方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStandard {
    Vga,
    Ntsc,
    Pal,
}

impl VideoStandard {
    /// 起動時に2本の入力ピンから方式を決める
    ///
    /// VGAモニタが接続されているとVGAピンはLowに引かれる。
    /// 未接続ならコンポジットで、PALジャンパがHighならNTSC、LowならPAL。
    pub fn detect(vga_pin_high: bool, pal_jumper_high: bool) -> Self {
        match (vga_pin_high, pal_jumper_high) {
            (false, _) => VideoStandard::Vga,
            (true, true) => VideoStandard::Ntsc,
            (true, false) => VideoStandard::Pal,
        }
    }

    pub fn profile(self) -> &'static TimingProfile {
        match self {
            VideoStandard::Vga => &VGA,
            VideoStandard::Ntsc => &NTSC,
            VideoStandard::Pal => &PAL,
        }
    }

    pub fn is_composite(self) -> bool {
        self != VideoStandard::Vga
    }

    pub fn name(self) -> &'static str {
        match self {
            VideoStandard::Vga => "VGA",
            VideoStandard::Ntsc => "NTSC",
            VideoStandard::Pal => "PAL",
        }
    }
}

/// 1方式ぶんのタイミング（水平はピクセル数、垂直はライン数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingProfile {
    pub standard: VideoStandard,
    pub num_pixels: u16,
    pub hfp: u16,
    pub hbp: u16,
    pub hsync: u16,
    pub num_lines: u16,
    pub vfp: u16,
    pub vbp: u16,
    pub vsync: u16,
    /// 水平同期コンペア値の補正
    pub hsync_adjust: u16,
}

/// 24MHz ピクセルクロック、640x480 相当
pub const VGA: TimingProfile = TimingProfile {
    standard: VideoStandard::Vga,
    num_pixels: 763,
    hfp: 15 + 17,
    hbp: 46 + 17,
    hsync: 92,
    num_lines: 525,
    vfp: 10 + 32,
    vbp: 33 + 32,
    vsync: 2,
    hsync_adjust: 41,
};

/// 12MHz ピクセルクロック
pub const NTSC: TimingProfile = TimingProfile {
    standard: VideoStandard::Ntsc,
    num_pixels: 762,
    hfp: 18 + 27,
    hbp: 57 + 27,
    hsync: 57,
    num_lines: 262,
    vfp: 26,
    vbp: 27,
    vsync: 1,
    hsync_adjust: 37,
};

pub const PAL: TimingProfile = TimingProfile {
    standard: VideoStandard::Pal,
    num_pixels: 768,
    hfp: 44,
    hbp: 91,
    hsync: 57,
    num_lines: 312,
    vfp: 51,
    vbp: 52,
    vsync: 1,
    hsync_adjust: 37,
};

impl TimingProfile {
    /// 物理的な表示ライン数
    pub fn visible_lines(&self) -> u16 {
        match self.standard {
            VideoStandard::Vga => (DISPLAY_LINES * 2) as u16,
            _ => DISPLAY_LINES as u16,
        }
    }

    /// 水平同期パルスの開始コンペア値
    pub fn hsync_start(&self) -> u16 {
        self.num_pixels - self.hbp - self.hsync + self.hsync_adjust
    }

    /// 表示開始の何ライン前から描画を始めるか
    pub fn render_lead(&self) -> u16 {
        match self.standard {
            VideoStandard::Vga => 2,
            _ => 1,
        }
    }

    /// 垂直同期の開始ライン（フロントポーチの終わり）
    pub fn vsync_line(&self) -> u16 {
        self.num_lines - self.vsync
    }

    /// ピクセルクロック（VGA 24MHz、コンポジット 12MHz）
    pub fn pixel_clock_mhz(&self) -> u32 {
        match self.standard {
            VideoStandard::Vga => 24,
            _ => 12,
        }
    }

    /// 1フレームの長さ（マイクロ秒）
    pub fn frame_micros(&self) -> u32 {
        self.num_pixels as u32 * self.num_lines as u32 / self.pixel_clock_mhz()
    }

    /// 1ラインあたりのピクセル数・1フレームあたりのライン数の整合性
    pub fn is_consistent(&self) -> bool {
        let h = self.hfp + self.hbp + self.hsync + DISPLAY_PIXELS as u16 == self.num_pixels;
        let v = self.vfp + self.vbp + self.vsync + self.visible_lines() == self.num_lines;
        h && v
    }
}
