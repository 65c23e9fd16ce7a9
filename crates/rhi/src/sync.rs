//! Semaphores and fences.
//!
//! A [`Semaphore`] orders work between queue operations on the GPU (image
//! acquired → render, render complete → present). A [`Fence`] is the only
//! primitive the CPU can wait on; the frame loop blocks on one per slot.

use std::sync::Arc;

use ash::vk;
use tracing::trace;

use crate::device::Device;
use crate::error::RhiResult;

/// Timeout used for fence waits that should never give up.
pub const WAIT_FOREVER: u64 = u64::MAX;

/// Binary semaphore, GPU-side only.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let semaphore = unsafe {
            device
                .handle()
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        trace!("Semaphore created");
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// CPU-observable completion signal.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a fence, optionally already signaled.
    ///
    /// Frame fences start signaled so the first wait on each slot returns
    /// immediately.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence = unsafe {
            device
                .handle()
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)?
        };
        trace!("Fence created (signaled: {})", signaled);
        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until signaled or `timeout` nanoseconds pass.
    ///
    /// A timeout surfaces as `VulkanError(TIMEOUT)`.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout)?;
        }
        Ok(())
    }

    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_forever_is_max() {
        assert_eq!(WAIT_FOREVER, u64::MAX);
    }

    #[test]
    fn test_primitives_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
    }
}
