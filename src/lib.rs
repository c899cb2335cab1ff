//! VDM1RS - VDM-1 Video Display Module terminal in Rust
//!
//! A scanline-accurate VDM-1 character terminal supporting:
//! - 64x16 character memory with scroll, cursor and blanking modes
//! - VGA, NTSC and PAL timing profiles
//! - Host protocol over TCP or recorded byte streams
//! - PS/2 keyboard with LEDs, typematic and a built-in local console

pub mod ring;
pub mod charset;
pub mod registers;
pub mod timing;
pub mod render;
pub mod video;
pub mod capture;
pub mod irq;
pub mod keyboard;
pub mod protocol;
pub mod console;
pub mod transport;
pub mod terminal;
pub mod config;
