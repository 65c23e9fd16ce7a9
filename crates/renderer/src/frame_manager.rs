//! Per-slot synchronization and the begin/end frame contract.
//!
//! Each slot owns a command buffer, an "image available" semaphore, a
//! "render finished" semaphore and an in-flight fence:
//!
//! ```text
//! 1. Wait on in_flight fence (CPU waits for the previous use of this slot)
//! 2. Acquire swapchain image (signals image_available)
//! 3. Reset fence and command buffer, record
//! 4. Submit: wait image_available at COLOR_ATTACHMENT_OUTPUT,
//!    signal render_finished and in_flight
//! 5. Present (waits on render_finished), advance the slot
//! ```
//!
//! Out-of-date and suboptimal results never abort: they are reported as
//! [`FrameOutcome::Recreate`] / [`PresentOutcome::Recreate`] and the caller
//! rebuilds the swapchain before its next iteration.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info, warn};

use vista_rhi::RhiResult;
use vista_rhi::command::{CommandBuffer, CommandPool};
use vista_rhi::device::Device;
use vista_rhi::swapchain::Swapchain;
use vista_rhi::sync::{Fence, Semaphore, WAIT_FOREVER};

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::frame::{FrameSlots, InvalidationReason, SwapchainInvalidation};

/// Resources owned by one frame slot.
pub struct FrameSlot {
    command_buffer: CommandBuffer,
    image_available: Semaphore,
    render_finished: Semaphore,
    in_flight: Fence,
}

impl FrameSlot {
    fn new(device: Arc<Device>, pool: &CommandPool) -> RhiResult<Self> {
        Ok(Self {
            command_buffer: CommandBuffer::new(device.clone(), pool)?,
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            // Signaled so the first wait returns immediately.
            in_flight: Fence::new(device, true)?,
        })
    }

    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }
}

/// The slot and swapchain image a frame is being recorded for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameContext {
    pub slot: usize,
    pub image_index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Recording has begun on the slot's command buffer.
    Ready(FrameContext),
    /// The swapchain is out of date; recreate it and try again next iteration.
    Recreate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Presented (or not) but the swapchain must be rebuilt before the next frame.
    Recreate,
    /// Presentation failed for another reason; the frame is lost.
    Dropped,
}

pub struct FrameManager {
    device: Arc<Device>,
    slots: Vec<FrameSlot>,
    tracker: FrameSlots<MAX_FRAMES_IN_FLIGHT>,
    invalidation: SwapchainInvalidation,
    // Slots are dropped before the pool that allocated their buffers.
    _pool: CommandPool,
}

impl FrameManager {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let pool = CommandPool::new(device.clone(), device.graphics_family())?;
        let slots = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|i| {
                debug!("Creating frame slot {}", i);
                FrameSlot::new(device.clone(), &pool)
            })
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Frame manager created with {} frames in flight",
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            device,
            slots,
            tracker: FrameSlots::new(),
            invalidation: SwapchainInvalidation::default(),
            _pool: pool,
        })
    }

    /// Waits for the active slot, acquires an image and starts recording.
    ///
    /// The fence is only reset once an image has been acquired, so an
    /// out-of-date result leaves the slot ready for the retry.
    pub fn begin_frame(&mut self, swapchain: &Swapchain) -> RhiResult<FrameOutcome> {
        let slots = &self.slots;
        let slot_index = self
            .tracker
            .begin(|i| slots[i].in_flight.wait(WAIT_FOREVER))?;
        let slot = &self.slots[slot_index];

        let image_index = match swapchain.acquire_next_image(slot.image_available.handle()) {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    self.invalidation.signal(InvalidationReason::Suboptimal);
                }
                index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date during acquire");
                self.invalidation.signal(InvalidationReason::OutOfDate);
                return Ok(FrameOutcome::Recreate);
            }
            Err(e) => return Err(e.into()),
        };

        slot.in_flight.reset()?;
        slot.command_buffer.reset()?;
        slot.command_buffer.begin()?;

        Ok(FrameOutcome::Ready(FrameContext {
            slot: slot_index,
            image_index,
        }))
    }

    /// Ends recording, submits, presents and advances to the next slot.
    pub fn end_frame(
        &mut self,
        swapchain: &Swapchain,
        ctx: FrameContext,
    ) -> RhiResult<PresentOutcome> {
        let slot = &self.slots[ctx.slot];
        slot.command_buffer.end()?;

        let wait_semaphores = [slot.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [slot.render_finished.handle()];
        let command_buffers = [slot.command_buffer.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: recording has ended and the fence was reset in begin_frame.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], slot.in_flight.handle())?;
        }
        self.tracker.submit();

        let presented = swapchain.present(
            self.device.present_queue(),
            ctx.image_index,
            slot.render_finished.handle(),
        );
        self.tracker.advance();

        let dropped = match presented {
            Ok(false) => false,
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => {
                self.invalidation.signal(InvalidationReason::Suboptimal);
                false
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date during present");
                self.invalidation.signal(InvalidationReason::OutOfDate);
                false
            }
            Err(e) => {
                error!("Present failed, dropping frame: {:?}", e);
                true
            }
        };

        Ok(if self.invalidation.is_pending() {
            PresentOutcome::Recreate
        } else if dropped {
            PresentOutcome::Dropped
        } else {
            PresentOutcome::Presented
        })
    }

    /// Flags the swapchain for recreation from outside the frame, e.g. on resize.
    pub fn invalidate(&mut self, reason: InvalidationReason) {
        self.invalidation.signal(reason);
    }

    pub fn needs_recreate(&self) -> bool {
        self.invalidation.is_pending()
    }

    /// Clears the pending recreate once the swapchain has been rebuilt.
    ///
    /// Recreation idles the device, so every slot is retired too.
    pub fn swapchain_recreated(&mut self) {
        let signals = self.invalidation.signal_count();
        if let Some(reason) = self.invalidation.take() {
            debug!(
                "Swapchain recreated ({:?}, {} signal(s) coalesced)",
                reason, signals
            );
        }
        self.tracker.retire_all();
    }

    /// Waits for every slot's fence.
    pub fn wait_all(&mut self) -> RhiResult<()> {
        for (i, slot) in self.slots.iter().enumerate() {
            if let Err(e) = slot.in_flight.wait(WAIT_FOREVER) {
                warn!("Waiting on frame slot {} failed: {:?}", i, e);
                return Err(e);
            }
            self.tracker.retire(i);
        }
        Ok(())
    }

    /// Command buffer of `ctx`'s slot.
    #[inline]
    pub fn command_buffer(&self, ctx: &FrameContext) -> &CommandBuffer {
        self.slots[ctx.slot].command_buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_manager_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FrameManager>();
        assert_send::<FrameSlot>();
    }

    #[test]
    fn test_outcomes_compare() {
        let ctx = FrameContext {
            slot: 1,
            image_index: 2,
        };
        assert_eq!(FrameOutcome::Ready(ctx), FrameOutcome::Ready(ctx));
        assert_ne!(FrameOutcome::Ready(ctx), FrameOutcome::Recreate);
        assert_ne!(PresentOutcome::Presented, PresentOutcome::Dropped);
    }
}
