//! Interrupt-driven serial transport: a lock-free receive ring fed by the
//! UART receive interrupt and a transmit ring drained by the transmit-empty
//! interrupt, with realtime-command interception, CAN injection and the
//! tool-acknowledge backup protocol.
//!
//! Index ownership: `rx_head` is written only by the receive interrupt,
//! `tx_head` only by the foreground writer, `tx_tail` only by the transmit
//! interrupt. Cross-context reads are single atomic loads. `rx_tail` has two
//! writers (the foreground reader and the tool-acknowledge collapse), so the
//! reader's check-and-advance and every multi-field update (backup
//! snapshot/restore, CAN injection) run inside `critical_section` sections.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::config::{ASCII_CAN, CMD_TOOL_ACK};

/// Transmit side of the UART, as seen by the transport.
///
/// The transmit-interrupt enable is modeled as explicit state rather than
/// left implicit in the peripheral, so tests can observe the transitions.
pub trait UartTx {
    /// Transmit data register empty, a direct write is possible.
    fn tx_ready(&self) -> bool;
    /// Write one byte to the transmit data register.
    fn write(&mut self, byte: u8);
    fn set_tx_interrupt(&mut self, enabled: bool);
    fn tx_interrupt_enabled(&self) -> bool;
}

/// Receive side of the UART.
pub trait UartRx {
    /// Read the received byte, clearing the interrupt condition.
    fn read(&mut self) -> u8;
}

/// Classifies a received byte as a realtime command. Returning `true`
/// consumes the byte; it is never stored in the receive ring.
pub type RealtimeHook = fn(u8) -> bool;

/// Consulted while `put_byte` waits on a full transmit ring. Returning
/// `false` aborts the wait and fails the write.
pub type BlockingHook = fn() -> bool;

struct RxBackup<const N: usize> {
    data: [u8; N],
    head: usize,
    tail: usize,
}

/// Byte transport over one serial link.
///
/// `RX` and `TX` are ring capacities and must be powers of two; one slot per
/// ring is kept free to distinguish full from empty, so the usable capacity
/// is `RX - 1` / `TX - 1`.
///
/// A single instance is meant to live in a `static` shared between the
/// foreground and the UART interrupt; all methods take `&self`.
pub struct SerialTransport<const RX: usize, const TX: usize> {
    rx_data: UnsafeCell<[u8; RX]>,
    /// Written only by `rx_interrupt` (and the guarded `rx_cancel`/`rx_flush`).
    rx_head: AtomicUsize,
    /// Written only by the foreground reader.
    rx_tail: AtomicUsize,
    rx_overflow: AtomicBool,
    suspended: AtomicBool,

    backup: UnsafeCell<RxBackup<RX>>,
    backup_active: AtomicBool,

    tx_data: UnsafeCell<[u8; TX]>,
    /// Written only by the foreground writer.
    tx_head: AtomicUsize,
    /// Written only by `tx_interrupt`.
    tx_tail: AtomicUsize,

    realtime_hook: RealtimeHook,
    blocking_hook: BlockingHook,
}

// Safe under the single-writer-per-index discipline documented above: the
// data arrays are only written by the context that owns the corresponding
// index, and index handoff uses release/acquire pairs.
unsafe impl<const RX: usize, const TX: usize> Sync for SerialTransport<RX, TX> {}

impl<const RX: usize, const TX: usize> SerialTransport<RX, TX> {
    const CAPACITY_CHECK: () = assert!(
        RX.is_power_of_two() && TX.is_power_of_two(),
        "ring capacities must be powers of two"
    );
    const RX_MASK: usize = RX - 1;
    const TX_MASK: usize = TX - 1;

    pub const fn new(realtime_hook: RealtimeHook, blocking_hook: BlockingHook) -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::CAPACITY_CHECK;

        Self {
            rx_data: UnsafeCell::new([0; RX]),
            rx_head: AtomicUsize::new(0),
            rx_tail: AtomicUsize::new(0),
            rx_overflow: AtomicBool::new(false),
            suspended: AtomicBool::new(false),

            backup: UnsafeCell::new(RxBackup {
                data: [0; RX],
                head: 0,
                tail: 0,
            }),
            backup_active: AtomicBool::new(false),

            tx_data: UnsafeCell::new([0; TX]),
            tx_head: AtomicUsize::new(0),
            tx_tail: AtomicUsize::new(0),

            realtime_hook,
            blocking_hook,
        }
    }

    fn occupied(head: usize, tail: usize, mask: usize) -> usize {
        head.wrapping_sub(tail) & mask
    }

    /// Free space in the receive ring. Usable capacity is `RX - 1`.
    pub fn rx_free(&self) -> usize {
        let head = self.rx_head.load(Ordering::Acquire);
        let tail = self.rx_tail.load(Ordering::Acquire);
        (RX - 1) - Self::occupied(head, tail, Self::RX_MASK)
    }

    /// Sticky receive-overflow flag; set when a byte was dropped.
    pub fn rx_overflow(&self) -> bool {
        self.rx_overflow.load(Ordering::Acquire)
    }

    /// Clears the overflow flag. Consumer decision, never automatic.
    pub fn clear_rx_overflow(&self) {
        self.rx_overflow.store(false, Ordering::Release);
    }

    /// Discards all unread input. Foreground call; the receive interrupt
    /// must not be running concurrently.
    pub fn rx_flush(&self) {
        critical_section::with(|_| {
            self.rx_head.store(0, Ordering::Release);
            self.rx_tail.store(0, Ordering::Release);
        });
    }

    /// Discards unread input and injects a CAN byte in its place, so the
    /// next read reports the cancellation to the command interpreter.
    ///
    /// Ignored while a backup snapshot is active: rewriting the indices
    /// would desynchronize the pending restore.
    pub fn rx_cancel(&self) {
        if self.backup_active.load(Ordering::Acquire) {
            warn!("rx_cancel ignored, backup active");
            return;
        }

        critical_section::with(|_| {
            let head = self.rx_head.load(Ordering::Relaxed);
            unsafe {
                (*self.rx_data.get())[head] = ASCII_CAN;
            }
            self.rx_tail.store(head, Ordering::Release);
            self.rx_head
                .store((head + 1) & Self::RX_MASK, Ordering::Release);
        });
    }

    /// Non-blocking foreground read. `None` when the ring is empty or input
    /// is suspended.
    ///
    /// The check-and-advance runs under a critical section: the
    /// tool-acknowledge path also moves `rx_tail`, and a collapse landing
    /// between the check and the advance would re-expose consumed bytes.
    pub fn get_byte(&self) -> Option<u8> {
        if self.suspended.load(Ordering::Acquire) {
            return None;
        }

        critical_section::with(|_| {
            let tail = self.rx_tail.load(Ordering::Relaxed);
            if tail == self.rx_head.load(Ordering::Acquire) {
                return None;
            }

            let data = unsafe { (*self.rx_data.get())[tail] };
            self.rx_tail
                .store((tail + 1) & Self::RX_MASK, Ordering::Release);

            Some(data)
        })
    }

    /// Suspends or resumes input. While suspended, `get_byte` reports empty
    /// without consuming. Resuming restores the backup snapshot when one is
    /// active. Returns whether input is pending afterwards.
    pub fn suspend_input(&self, suspend: bool) -> bool {
        if suspend {
            self.suspended.store(true, Ordering::Release);
        } else {
            self.suspended.store(false, Ordering::Release);

            if self.backup_active.load(Ordering::Acquire) {
                // Rewind to the pre-acknowledge stream: restore the
                // snapshot window and its tail, keep the live head so
                // bytes received after the acknowledge stay queued.
                critical_section::with(|_| {
                    let backup = unsafe { &*self.backup.get() };
                    let data = unsafe { &mut *self.rx_data.get() };

                    let mut i = backup.tail;
                    while i != backup.head {
                        data[i] = backup.data[i];
                        i = (i + 1) & Self::RX_MASK;
                    }
                    self.rx_tail.store(backup.tail, Ordering::Release);
                    self.backup_active.store(false, Ordering::Release);
                });
                debug!("rx backup restored");
            }
        }

        self.rx_tail.load(Ordering::Acquire) != self.rx_head.load(Ordering::Acquire)
    }

    /// Receive-interrupt handler: call when the UART signals a byte ready.
    ///
    /// A full ring drops the byte and latches the overflow flag. The
    /// tool-acknowledge byte snapshots the ring and collapses the unread
    /// window; other bytes are first offered to the realtime hook and only
    /// stored if unclaimed.
    pub fn rx_interrupt<H: UartRx>(&self, hw: &mut H) {
        let head = self.rx_head.load(Ordering::Relaxed);
        let next_head = (head + 1) & Self::RX_MASK;

        // While a backup is active the snapshot window [backup.tail,
        // backup.head) still holds undelivered bytes; the full check bounds
        // against the snapshot tail so they survive until the restore.
        let tail = if self.backup_active.load(Ordering::Acquire) {
            unsafe { (*self.backup.get()).tail }
        } else {
            self.rx_tail.load(Ordering::Acquire)
        };

        if next_head == tail {
            self.rx_overflow.store(true, Ordering::Release);
            let _ = hw.read(); // dummy read, clears the interrupt condition
            warn!("rx ring full, byte dropped");
            return;
        }

        let data = hw.read();
        if data == CMD_TOOL_ACK && !self.backup_active.load(Ordering::Acquire) {
            critical_section::with(|_| {
                let backup = unsafe { &mut *self.backup.get() };
                backup.data = unsafe { *self.rx_data.get() };
                backup.head = head;
                backup.tail = self.rx_tail.load(Ordering::Relaxed);
                self.backup_active.store(true, Ordering::Release);
                // Unread pre-acknowledge bytes leave the live view until
                // the restore. Also undoes a pending suspend.
                self.rx_tail.store(head, Ordering::Release);
                self.suspended.store(false, Ordering::Release);
            });
            debug!("rx backup taken");
        } else if !(self.realtime_hook)(data) {
            unsafe {
                (*self.rx_data.get())[head] = data;
            }
            self.rx_head.store(next_head, Ordering::Release);
        }
    }

    fn tx_pending(&self) -> bool {
        self.tx_head.load(Ordering::Acquire) != self.tx_tail.load(Ordering::Acquire)
    }

    /// Writes one byte to the output stream.
    ///
    /// Takes the direct hardware path when the transmitter is idle and
    /// nothing is buffered; otherwise enqueues, consulting the blocking
    /// hook while the ring is full. Returns `false` when the hook aborted
    /// the wait: the byte was not committed, and ring state for this call
    /// is not guaranteed consistent.
    pub fn put_byte<H: UartTx>(&self, c: u8, hw: &mut H) -> bool {
        if !self.tx_pending() && !hw.tx_interrupt_enabled() && hw.tx_ready() {
            hw.write(c);
            return true;
        }

        let head = self.tx_head.load(Ordering::Relaxed);
        let next_head = (head + 1) & Self::TX_MASK;

        while next_head == self.tx_tail.load(Ordering::Acquire) {
            if !(self.blocking_hook)() {
                return false;
            }
        }

        unsafe {
            (*self.tx_data.get())[head] = c;
        }
        self.tx_head.store(next_head, Ordering::Release);
        hw.set_tx_interrupt(true);

        true
    }

    /// Writes a string through `put_byte`, blocking per its policy.
    pub fn write_string<H: UartTx>(&self, s: &str, hw: &mut H) {
        for c in s.bytes() {
            let _ = self.put_byte(c, hw);
        }
    }

    /// Writes a byte slice through `put_byte`, blocking per its policy.
    pub fn write_bytes<H: UartTx>(&self, s: &[u8], hw: &mut H) {
        for &c in s {
            let _ = self.put_byte(c, hw);
        }
    }

    /// Transmit-interrupt handler: call on transmit-register-empty. Sends
    /// the next buffered byte and disables the interrupt source once the
    /// ring drains.
    pub fn tx_interrupt<H: UartTx>(&self, hw: &mut H) {
        let tail = self.tx_tail.load(Ordering::Relaxed);

        if tail == self.tx_head.load(Ordering::Acquire) {
            hw.set_tx_interrupt(false);
            return;
        }

        let data = unsafe { (*self.tx_data.get())[tail] };
        hw.write(data);

        let tail = (tail + 1) & Self::TX_MASK;
        self.tx_tail.store(tail, Ordering::Release);

        if tail == self.tx_head.load(Ordering::Acquire) {
            hw.set_tx_interrupt(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    use crate::config::{ASCII_CAN, CMD_TOOL_ACK};

    struct FakeUart {
        ready: bool,
        irq: bool,
        sent: Vec<u8>,
        rx: VecDeque<u8>,
    }

    impl FakeUart {
        fn new() -> Self {
            Self {
                ready: true,
                irq: false,
                sent: Vec::new(),
                rx: VecDeque::new(),
            }
        }
    }

    impl UartTx for FakeUart {
        fn tx_ready(&self) -> bool {
            self.ready
        }

        fn write(&mut self, byte: u8) {
            self.sent.push(byte);
        }

        fn set_tx_interrupt(&mut self, enabled: bool) {
            self.irq = enabled;
        }

        fn tx_interrupt_enabled(&self) -> bool {
            self.irq
        }
    }

    impl UartRx for FakeUart {
        fn read(&mut self) -> u8 {
            self.rx.pop_front().unwrap_or(0)
        }
    }

    fn pass_through(_: u8) -> bool {
        false
    }

    fn no_block() -> bool {
        false
    }

    static STATUS_REPORTS: StdAtomicUsize = StdAtomicUsize::new(0);

    fn strip_status(b: u8) -> bool {
        if b == b'?' {
            STATUS_REPORTS.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    fn feed<const RX: usize, const TX: usize>(
        t: &SerialTransport<RX, TX>,
        hw: &mut FakeUart,
        byte: u8,
    ) {
        hw.rx.push_back(byte);
        t.rx_interrupt(hw);
    }

    #[test]
    fn tx_direct_path_when_idle() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();

        assert!(t.put_byte(b'x', &mut hw));
        assert_eq!(hw.sent, vec![b'x']);
        assert!(!hw.irq);
    }

    #[test]
    fn tx_conservation_through_interrupt_drain() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();
        hw.ready = false; // force buffering

        let payload = b"ok\r\n";
        for &c in payload {
            assert!(t.put_byte(c, &mut hw));
        }
        assert!(hw.irq);

        for _ in 0..payload.len() {
            t.tx_interrupt(&mut hw);
        }
        assert_eq!(hw.sent, payload);
        assert!(!hw.irq, "interrupt source stays on after drain");

        // a spurious extra interrupt must not emit garbage
        t.tx_interrupt(&mut hw);
        assert_eq!(hw.sent, payload);
    }

    #[test]
    fn tx_full_aborts_via_blocking_hook() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();
        hw.ready = false;

        for i in 0..7 {
            assert!(t.put_byte(i, &mut hw));
        }
        // ring full, hook says do not keep waiting
        assert!(!t.put_byte(7, &mut hw));
    }

    #[test]
    fn interleaved_put_and_drain_preserves_order() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();
        hw.ready = false;

        for round in 0u8..40 {
            assert!(t.put_byte(round, &mut hw));
            t.tx_interrupt(&mut hw);
            if round % 3 == 0 {
                t.tx_interrupt(&mut hw);
            }
        }
        while hw.irq {
            t.tx_interrupt(&mut hw);
        }
        let expected: Vec<u8> = (0u8..40).collect();
        assert_eq!(hw.sent, expected);
    }

    #[test]
    fn rx_roundtrip_in_order() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();

        for c in b"G1X0\n" {
            feed(&t, &mut hw, *c);
        }
        let mut out = Vec::new();
        while let Some(b) = t.get_byte() {
            out.push(b);
        }
        assert_eq!(out, b"G1X0\n");
        assert_eq!(t.rx_free(), 7);
        assert!(!t.rx_overflow());
    }

    #[test]
    fn rx_overflow_drops_byte_and_latches_flag() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();

        for i in 0..8u8 {
            feed(&t, &mut hw, i);
        }
        assert!(t.rx_overflow());
        assert_eq!(t.rx_free(), 0);

        let mut out = Vec::new();
        while let Some(b) = t.get_byte() {
            out.push(b);
        }
        // the 8th byte was dropped, not retried, and indices stayed sane
        assert_eq!(out, (0..7u8).collect::<Vec<_>>());
        assert_eq!(t.rx_free(), 7);

        // flag is sticky until the consumer clears it
        assert!(t.rx_overflow());
        t.clear_rx_overflow();
        assert!(!t.rx_overflow());
    }

    #[test]
    fn realtime_bytes_bypass_the_ring() {
        let t: SerialTransport<8, 8> = SerialTransport::new(strip_status, no_block);
        let mut hw = FakeUart::new();

        STATUS_REPORTS.store(0, Ordering::Relaxed);
        feed(&t, &mut hw, b'a');
        feed(&t, &mut hw, b'?');
        feed(&t, &mut hw, b'b');

        assert_eq!(STATUS_REPORTS.load(Ordering::Relaxed), 1);
        assert_eq!(t.get_byte(), Some(b'a'));
        assert_eq!(t.get_byte(), Some(b'b'));
        assert_eq!(t.get_byte(), None);
    }

    #[test]
    fn rx_cancel_replaces_unread_input_with_can() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();

        for c in b"abc" {
            feed(&t, &mut hw, *c);
        }
        t.rx_cancel();
        assert_eq!(t.get_byte(), Some(ASCII_CAN));
        assert_eq!(t.get_byte(), None);
    }

    #[test]
    fn rx_flush_empties_the_ring() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();

        for c in b"abc" {
            feed(&t, &mut hw, *c);
        }
        t.rx_flush();
        assert_eq!(t.get_byte(), None);
        assert_eq!(t.rx_free(), 7);
    }

    #[test]
    fn suspend_gates_reads_without_consuming() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();

        feed(&t, &mut hw, b'a');
        assert!(t.suspend_input(true));
        assert_eq!(t.get_byte(), None);
        assert!(t.suspend_input(false));
        assert_eq!(t.get_byte(), Some(b'a'));
    }

    #[test]
    fn tool_ack_backup_replays_full_stream() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();

        feed(&t, &mut hw, b'a');
        feed(&t, &mut hw, b'b');
        feed(&t, &mut hw, CMD_TOOL_ACK);
        feed(&t, &mut hw, b'c');
        feed(&t, &mut hw, b'd');

        // ack collapsed the unread window: only post-ack bytes visible
        assert_eq!(t.get_byte(), Some(b'c'));

        // restore rewinds to the pre-ack stream without loss or duplication
        assert!(t.suspend_input(false));
        assert_eq!(t.get_byte(), Some(b'a'));
        assert_eq!(t.get_byte(), Some(b'b'));
        assert_eq!(t.get_byte(), Some(b'c'));
        assert_eq!(t.get_byte(), Some(b'd'));
        assert_eq!(t.get_byte(), None);
    }

    #[test]
    fn tool_ack_undoes_suspend_and_second_ack_is_plain_data() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();

        feed(&t, &mut hw, b'a');
        t.suspend_input(true);
        assert_eq!(t.get_byte(), None);

        feed(&t, &mut hw, CMD_TOOL_ACK);
        // ack re-enabled reading; with a backup active a second ack is
        // ordinary data
        feed(&t, &mut hw, CMD_TOOL_ACK);
        assert_eq!(t.get_byte(), Some(CMD_TOOL_ACK));
    }

    #[test]
    fn post_ack_bytes_cannot_overwrite_the_backup_window() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();

        feed(&t, &mut hw, b'a');
        feed(&t, &mut hw, b'b');
        feed(&t, &mut hw, CMD_TOOL_ACK);
        for c in b"cdefghi" {
            feed(&t, &mut hw, *c);
        }
        // the snapshot window counts as occupied: the last two bytes drop
        assert!(t.rx_overflow());

        assert!(t.suspend_input(false));
        let mut out = Vec::new();
        while let Some(b) = t.get_byte() {
            out.push(b);
        }
        assert_eq!(out, b"abcdefg");
    }

    #[test]
    fn replay_resumes_after_already_consumed_bytes() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();

        feed(&t, &mut hw, b'a');
        feed(&t, &mut hw, b'b');
        assert_eq!(t.get_byte(), Some(b'a'));

        feed(&t, &mut hw, CMD_TOOL_ACK);
        assert_eq!(t.get_byte(), None);
        feed(&t, &mut hw, b'c');

        // the snapshot starts at the consumption point: no byte delivered
        // before the acknowledge comes back a second time
        assert!(t.suspend_input(false));
        assert_eq!(t.get_byte(), Some(b'b'));
        assert_eq!(t.get_byte(), Some(b'c'));
        assert_eq!(t.get_byte(), None);
    }

    #[test]
    fn rx_cancel_is_ignored_while_backup_active() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();

        feed(&t, &mut hw, b'a');
        feed(&t, &mut hw, CMD_TOOL_ACK);
        t.rx_cancel();

        assert!(t.suspend_input(false));
        assert_eq!(t.get_byte(), Some(b'a'));
        assert_eq!(t.get_byte(), None);
    }

    #[test]
    fn write_string_forwards_every_byte() {
        let t: SerialTransport<8, 8> = SerialTransport::new(pass_through, no_block);
        let mut hw = FakeUart::new();
        hw.ready = false;

        t.write_string("ok", &mut hw);
        t.tx_interrupt(&mut hw);
        t.tx_interrupt(&mut hw);
        assert_eq!(hw.sent, b"ok");
    }
}
