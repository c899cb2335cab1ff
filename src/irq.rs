//! 割り込みコントローラ
//!
//! 要求ビットとマスクビットの組で保留中の割り込みを管理する。
//! 同時に保留されている場合は優先度の高い順に取り出す。

bitflags::bitflags! {
    /// 割り込み要因（ビットが小さいほど優先度が高い）
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct Interrupts: u8 {
        /// 水平同期ごとのタイマ割り込み
        const SCANLINE          = 0x01;
        /// ライン転送完了
        const TRANSFER_COMPLETE = 0x02;
        /// キーボードクロック立ち下がり
        const KEYBOARD_EDGE     = 0x04;
    }
}

#[derive(Debug, Default, Clone)]
pub struct InterruptController {
    request: Interrupts,
    disable: Interrupts,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, irq: Interrupts) {
        self.request.insert(irq);
    }

    pub fn mask(&mut self, irq: Interrupts) {
        self.disable.insert(irq);
    }

    pub fn unmask(&mut self, irq: Interrupts) {
        self.disable.remove(irq);
    }

    pub fn pending(&self) -> Interrupts {
        self.request - self.disable
    }

    /// 最優先の保留割り込みを1つ取り出して要求を落とす
    pub fn next(&mut self) -> Option<Interrupts> {
        let pending = self.pending().bits();
        if pending == 0 {
            return None;
        }
        let irq = Interrupts::from_bits_truncate(pending & pending.wrapping_neg());
        self.request.remove(irq);
        Some(irq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let mut ic = InterruptController::new();
        ic.raise(Interrupts::KEYBOARD_EDGE);
        ic.raise(Interrupts::SCANLINE);
        ic.raise(Interrupts::TRANSFER_COMPLETE);
        assert_eq!(ic.next(), Some(Interrupts::SCANLINE));
        assert_eq!(ic.next(), Some(Interrupts::TRANSFER_COMPLETE));
        assert_eq!(ic.next(), Some(Interrupts::KEYBOARD_EDGE));
        assert_eq!(ic.next(), None);
    }

    #[test]
    fn test_masked_request_stays_pending() {
        let mut ic = InterruptController::new();
        ic.mask(Interrupts::KEYBOARD_EDGE);
        ic.raise(Interrupts::KEYBOARD_EDGE);
        assert_eq!(ic.next(), None);
        ic.unmask(Interrupts::KEYBOARD_EDGE);
        assert_eq!(ic.next(), Some(Interrupts::KEYBOARD_EDGE));
    }
}
