//! 固定長リングバッファ
//!
//! 割り込み側（書き込み）とメインループ側（読み出し）の間でバイト列を受け渡す。
//! 満杯時は最も古いバイトを上書きする（ホストへのフロー制御経路が存在しないため）。

/// 単一プロデューサ/単一コンシューマのバイトキュー
///
/// 容量 `N` は2のべき乗でなければならない。
/// `head`/`tail` は折り返さないカウンタとして保持し、インデックスは `N-1` でマスクする。
#[derive(Clone)]
pub struct RingBuffer<const N: usize> {
    buf: [u8; N],
    /// 次に読み出す位置（書き込みは割り込み側が満杯時のみ進める）
    head: usize,
    /// 次に書き込む位置（割り込み側のみが進める）
    tail: usize,
}

impl<const N: usize> RingBuffer<N> {
    const POWER_OF_TWO: () = assert!(N.is_power_of_two(), "ring buffer capacity must be a power of two");
    const MASK: usize = N - 1;

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::POWER_OF_TWO;
        RingBuffer {
            buf: [0; N],
            head: 0,
            tail: 0,
        }
    }

    /// 容量（バイト数）
    pub const fn capacity(&self) -> usize {
        N
    }

    /// 格納済みバイト数
    pub fn len(&self) -> usize {
        self.tail.wrapping_sub(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// 1バイト追加。満杯なら最古のバイトを黙って捨てる
    #[inline]
    pub fn enqueue(&mut self, byte: u8) {
        self.buf[self.tail & Self::MASK] = byte;
        self.tail = self.tail.wrapping_add(1);
        if self.len() > N {
            self.head = self.head.wrapping_add(1);
        }
    }

    /// 最古のバイトを取り出す
    #[inline]
    pub fn dequeue(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.buf[self.head & Self::MASK];
        self.head = self.head.wrapping_add(1);
        Some(byte)
    }

    /// 上書きが始まるまでに書き込めるバイト数
    ///
    /// トランスポートへの受信要求サイズを絞るために使う。
    pub fn available_capacity(&self) -> usize {
        N - self.len()
    }

    /// 内容を全て破棄
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    /// スライスをまとめて追加（受信完了割り込みで使う）
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        for &b in data {
            self.enqueue(b);
        }
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> std::fmt::Debug for RingBuffer<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &N)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut ring = RingBuffer::<8>::new();
        assert!(ring.is_empty());
        assert_eq!(ring.dequeue(), None);
        for b in 1..=5 {
            ring.enqueue(b);
        }
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.available_capacity(), 3);
        for b in 1..=5 {
            assert_eq!(ring.dequeue(), Some(b));
        }
        assert_eq!(ring.dequeue(), None);
    }

    #[test]
    fn test_overwrite_keeps_last_n() {
        let mut ring = RingBuffer::<16>::new();
        for b in 0..40u8 {
            ring.enqueue(b);
        }
        assert!(ring.is_full());
        assert_eq!(ring.available_capacity(), 0);
        let drained: Vec<u8> = std::iter::from_fn(|| ring.dequeue()).collect();
        assert_eq!(drained, (24..40).collect::<Vec<u8>>());
    }

    #[test]
    fn test_interleaved_wraparound() {
        let mut ring = RingBuffer::<4>::new();
        for b in 0..200u8 {
            ring.enqueue(b);
            // 中身は常に直近の連続した値
            let len = ring.len() as u8;
            assert!(len <= 4);
            if b % 3 != 0 {
                assert_eq!(ring.dequeue(), Some(b.wrapping_add(1).wrapping_sub(len)));
            }
        }
    }

    #[test]
    fn test_clear() {
        let mut ring = RingBuffer::<8>::new();
        ring.extend_from_slice(&[1, 2, 3]);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.available_capacity(), 8);
    }
}
