//! Frame slot bookkeeping and swapchain invalidation.
//!
//! Both types are plain state machines with no Vulkan handles so the frame
//! pacing rules can be checked without a GPU. [`FrameManager`] drives them
//! from fence waits and present results.
//!
//! [`FrameManager`]: crate::frame_manager::FrameManager

/// Ring of `N` frame slots with in-flight tracking.
///
/// A slot is in flight from [`submit`](Self::submit) until its fence is
/// observed signaled. [`begin`](Self::begin) runs the caller's fence wait for
/// an in-flight slot before handing it out again, so a slot is never
/// recorded while the GPU may still read it.
#[derive(Debug)]
pub struct FrameSlots<const N: usize> {
    current: usize,
    in_flight: [bool; N],
}

impl<const N: usize> FrameSlots<N> {
    const NON_EMPTY: () = assert!(N > 0, "FrameSlots needs at least one slot");

    pub fn new() -> Self {
        let () = Self::NON_EMPTY;
        Self {
            current: 0,
            in_flight: [false; N],
        }
    }

    /// Index of the active slot.
    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Claims the active slot for recording.
    ///
    /// If the slot is still in flight, `wait` is called with its index and
    /// must block until the slot's previous submission has completed. A
    /// failed wait leaves the slot in flight.
    pub fn begin<E>(&mut self, wait: impl FnOnce(usize) -> Result<(), E>) -> Result<usize, E> {
        let slot = self.current;
        if self.is_in_flight(slot) {
            wait(slot)?;
            self.in_flight[slot] = false;
        }
        Ok(slot)
    }

    /// Marks the active slot as submitted to the GPU.
    pub fn submit(&mut self) {
        self.in_flight[self.current] = true;
    }

    /// Records that `slot`'s work has completed.
    pub fn retire(&mut self, slot: usize) {
        if let Some(flag) = self.in_flight.get_mut(slot) {
            *flag = false;
        }
    }

    /// Moves to the next slot, wrapping after `N`.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % N;
    }

    pub fn is_in_flight(&self, slot: usize) -> bool {
        self.in_flight.get(slot).copied().unwrap_or(false)
    }

    /// Number of slots submitted and not yet retired.
    pub fn in_flight(&self) -> usize {
        self.in_flight.iter().filter(|&&f| f).count()
    }

    /// Forgets all outstanding work, e.g. after a device idle wait.
    pub fn retire_all(&mut self) {
        self.in_flight = [false; N];
    }

    #[inline]
    pub const fn len(&self) -> usize {
        N
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }
}

impl<const N: usize> Default for FrameSlots<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Why the swapchain has to be rebuilt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidationReason {
    /// The window reported a new size.
    Resized,
    /// Acquire or present returned `ERROR_OUT_OF_DATE_KHR`.
    OutOfDate,
    /// Acquire or present reported `SUBOPTIMAL_KHR`.
    Suboptimal,
}

/// Coalesces invalidation signals into at most one pending recreate.
///
/// Any number of signals between two frames collapse into a single
/// [`take`](Self::take); the first reason is kept for logging.
#[derive(Debug, Default)]
pub struct SwapchainInvalidation {
    pending: Option<InvalidationReason>,
    signals: u32,
}

impl SwapchainInvalidation {
    pub fn signal(&mut self, reason: InvalidationReason) {
        self.signals += 1;
        if self.pending.is_none() {
            self.pending = Some(reason);
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the pending reason and clears it.
    pub fn take(&mut self) -> Option<InvalidationReason> {
        self.signals = 0;
        self.pending.take()
    }

    /// Signals received since the last [`take`](Self::take).
    pub fn signal_count(&self) -> u32 {
        self.signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// GPU model: each slot holds at most one submission, which completes
    /// `latency` frames after it was submitted or when the CPU waits on it.
    struct Gpu<const N: usize> {
        pending: [Option<usize>; N],
        waits: usize,
    }

    impl<const N: usize> Gpu<N> {
        fn new() -> Self {
            Self {
                pending: [None; N],
                waits: 0,
            }
        }

        fn submit(&mut self, slot: usize, frame: usize) {
            assert!(
                self.pending[slot].is_none(),
                "slot {} reused while its previous submission is pending",
                slot
            );
            self.pending[slot] = Some(frame);
        }

        fn wait(&mut self, slot: usize) -> Result<(), ()> {
            self.waits += 1;
            self.pending[slot] = None;
            Ok(())
        }

        fn complete_older_than(&mut self, frame: usize, latency: usize, slots: &mut FrameSlots<N>) {
            for (slot, pending) in self.pending.iter_mut().enumerate() {
                if pending.is_some_and(|at| frame >= at + latency) {
                    *pending = None;
                    slots.retire(slot);
                }
            }
        }
    }

    /// Runs `frames` iterations and returns how many fence waits were needed.
    fn run_frames<const N: usize>(frames: usize, latency: usize) -> usize {
        let mut slots = FrameSlots::<N>::new();
        let mut gpu = Gpu::<N>::new();

        for frame in 0..frames {
            gpu.complete_older_than(frame, latency, &mut slots);
            let slot = slots.begin(|s| gpu.wait(s)).unwrap();
            gpu.submit(slot, frame);
            slots.submit();
            slots.advance();
        }
        gpu.waits
    }

    #[test]
    fn test_slow_gpu_forces_a_wait_per_reuse() {
        // Work takes longer than the ring, so every reuse after the first lap blocks.
        assert_eq!(run_frames::<2>(10, 5), 8);
        assert_eq!(run_frames::<3>(10, 5), 7);
    }

    #[test]
    fn test_fast_gpu_never_blocks() {
        assert_eq!(run_frames::<2>(10, 0), 0);
        assert_eq!(run_frames::<2>(10, 2), 0);
    }

    #[test]
    fn test_begin_waits_for_submitted_slot_before_reuse() {
        let mut slots = FrameSlots::<2>::new();
        let mut waited = Vec::new();

        // Fresh slots are handed out without waiting.
        assert_eq!(slots.begin(|s| -> Result<(), ()> { waited.push(s); Ok(()) }), Ok(0));
        slots.submit();
        slots.advance();
        assert_eq!(slots.begin(|s| -> Result<(), ()> { waited.push(s); Ok(()) }), Ok(1));
        slots.submit();
        slots.advance();
        assert!(waited.is_empty());
        assert_eq!(slots.in_flight(), 2);

        assert_eq!(slots.begin(|s| -> Result<(), ()> { waited.push(s); Ok(()) }), Ok(0));
        assert_eq!(waited, vec![0]);
        assert!(!slots.is_in_flight(0));
        assert!(slots.is_in_flight(1));
    }

    #[test]
    fn test_failed_wait_keeps_slot_in_flight() {
        let mut slots = FrameSlots::<1>::new();
        slots.begin(|_| Ok::<(), ()>(())).unwrap();
        slots.submit();
        slots.advance();

        assert_eq!(slots.begin(|_| Err("device lost")), Err("device lost"));
        assert!(slots.is_in_flight(0));
    }

    #[test]
    fn test_retired_slot_needs_no_wait() {
        let mut slots = FrameSlots::<2>::new();
        slots.submit();
        slots.retire(0);
        slots.retire(7);
        assert_eq!(slots.begin(|_| Err(())), Ok(0));
    }

    #[test]
    fn test_slots_wrap() {
        let mut slots = FrameSlots::<2>::new();
        assert_eq!(slots.current(), 0);
        slots.advance();
        assert_eq!(slots.current(), 1);
        slots.advance();
        assert_eq!(slots.current(), 0);
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn test_retire_all() {
        let mut slots = FrameSlots::<2>::new();
        slots.submit();
        slots.advance();
        slots.submit();
        slots.retire_all();
        assert_eq!(slots.in_flight(), 0);
    }

    #[test]
    fn test_two_signals_give_one_recreate() {
        let mut invalidation = SwapchainInvalidation::default();
        assert!(!invalidation.is_pending());

        invalidation.signal(InvalidationReason::Resized);
        invalidation.signal(InvalidationReason::OutOfDate);
        assert_eq!(invalidation.signal_count(), 2);

        let mut recreates = 0;
        while invalidation.take().is_some() {
            recreates += 1;
        }
        assert_eq!(recreates, 1);
        assert_eq!(invalidation.signal_count(), 0);
    }

    #[test]
    fn test_first_reason_is_kept() {
        let mut invalidation = SwapchainInvalidation::default();
        invalidation.signal(InvalidationReason::Suboptimal);
        invalidation.signal(InvalidationReason::Resized);
        assert_eq!(invalidation.take(), Some(InvalidationReason::Suboptimal));
        assert_eq!(invalidation.take(), None);
    }
}
