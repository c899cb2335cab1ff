//! 設定ファイル管理モジュール
//!
//! 端末の設定をJSON形式で永続化

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::{DEFAULT_BACKGROUND, DEFAULT_FOREGROUND};
use crate::keyboard::DEFAULT_REPEAT_RATE;
use crate::registers::DEFAULT_DIP;
use crate::timing::VideoStandard;

/// 設定ファイルのデフォルトファイル名
const CONFIG_FILENAME: &str = "vdm1_config.json";

/// 実行ファイルのディレクトリを取得
pub fn get_exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 相対パスを実行ファイルディレクトリからの絶対パスに解決
pub fn resolve_path(relative: &str) -> PathBuf {
    let path = Path::new(relative);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        get_exe_dir().join(relative)
    }
}

/// 設定ファイルのパスを取得
pub fn get_config_path() -> PathBuf {
    get_exe_dir().join(CONFIG_FILENAME)
}

/// 映像規格の選択
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSelect {
    /// 入力ピンから判定
    #[default]
    Auto,
    Vga,
    Ntsc,
    Pal,
}

impl VideoSelect {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Some(VideoSelect::Auto),
            "vga" => Some(VideoSelect::Vga),
            "ntsc" => Some(VideoSelect::Ntsc),
            "pal" => Some(VideoSelect::Pal),
            _ => None,
        }
    }
}

/// 端末設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 映像規格
    #[serde(default)]
    pub video: VideoSelect,
    /// VGAモニタ接続（auto 時、VGAピンが Low に引かれる）
    #[serde(default = "default_true")]
    pub vga_monitor: bool,
    /// PALジャンパ装着（auto 時、ジャンパピンが Low になる）
    #[serde(default)]
    pub pal_jumper: bool,
    /// 起動時の DIP スイッチ
    #[serde(default = "default_dip")]
    pub initial_dip: u8,
    /// 起動時のコントロールレジスタ
    #[serde(default)]
    pub initial_ctrl: u8,
    /// キーボードのリピート設定（0xF3 コマンドの引数）
    #[serde(default = "default_repeat_rate")]
    pub keyboard_repeat_rate: u8,
    /// ウィンドウ倍率
    #[serde(default = "default_scale")]
    pub scale: usize,
    /// 文字色（ARGB）
    #[serde(default = "default_foreground")]
    pub foreground: u32,
    /// 背景色（ARGB）
    #[serde(default = "default_background")]
    pub background: u32,
    /// スクリーンショットディレクトリ
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: String,
    /// ホスト待ち受けアドレス（例: "127.0.0.1:8800"）
    #[serde(default)]
    pub listen: Option<String>,
}

fn default_true() -> bool { true }
fn default_dip() -> u8 { DEFAULT_DIP }
fn default_repeat_rate() -> u8 { DEFAULT_REPEAT_RATE }
fn default_scale() -> usize { 2 }
fn default_foreground() -> u32 { DEFAULT_FOREGROUND }
fn default_background() -> u32 { DEFAULT_BACKGROUND }
fn default_screenshot_dir() -> String { "screenshots".to_string() }

impl Default for Config {
    fn default() -> Self {
        Config {
            video: VideoSelect::Auto,
            vga_monitor: default_true(),
            pal_jumper: false,
            initial_dip: default_dip(),
            initial_ctrl: 0,
            keyboard_repeat_rate: default_repeat_rate(),
            scale: default_scale(),
            foreground: default_foreground(),
            background: default_background(),
            screenshot_dir: default_screenshot_dir(),
            listen: None,
        }
    }
}

impl Config {
    /// 設定ファイルを読み込む（実行ファイルと同じディレクトリから）
    pub fn load() -> Self {
        Self::load_from(get_config_path())
    }

    /// 指定したパスから設定を読み込む
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(content) => {
                match serde_json::from_str(&content) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!("Failed to parse config {:?}: {}, using defaults", path.as_ref(), e);
                        Config::default()
                    }
                }
            }
            Err(_) => Config::default(),
        }
    }

    /// 設定ファイルを保存する（実行ファイルと同じディレクトリに）
    pub fn save(&self) -> Result<(), String> {
        self.save_to(get_config_path())
    }

    /// 指定したパスに設定を保存する
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(path, json)
            .map_err(|e| format!("Failed to write config: {}", e))?;
        Ok(())
    }

    /// 使用する映像規格
    pub fn video_standard(&self) -> VideoStandard {
        match self.video {
            VideoSelect::Vga => VideoStandard::Vga,
            VideoSelect::Ntsc => VideoStandard::Ntsc,
            VideoSelect::Pal => VideoStandard::Pal,
            // 入力はプルアップされているので、接続/装着で Low になる
            VideoSelect::Auto => VideoStandard::detect(!self.vga_monitor, !self.pal_jumper),
        }
    }

    /// スクリーンショットディレクトリの絶対パスを取得
    pub fn screenshot_dir_path(&self) -> PathBuf {
        resolve_path(&self.screenshot_dir)
    }

    /// ディレクトリが存在しなければ作成
    pub fn ensure_directories(&self) {
        let dir = self.screenshot_dir_path();
        if !dir.exists() {
            if let Err(e) = fs::create_dir_all(&dir) {
                log::warn!("Failed to create screenshot directory {}: {}", dir.display(), e);
            }
        }
    }
}
