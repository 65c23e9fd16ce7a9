//! One-shot command submission for resource uploads.

use std::sync::Arc;

use ash::vk;
use tracing::trace;

use crate::command::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::error::RhiResult;
use crate::sync::{Fence, WAIT_FOREVER};

/// Records and submits short-lived transfer work on the graphics queue.
///
/// Every submission blocks until the GPU has finished, so staging resources
/// captured by the recording closure may be dropped right after it returns.
pub struct Uploader {
    device: Arc<Device>,
    pool: CommandPool,
}

impl Uploader {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let pool = CommandPool::new_transient(device.clone(), device.graphics_family())?;
        Ok(Self { device, pool })
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Records `record` into a fresh command buffer, submits it and waits.
    pub fn submit_once<F>(&self, record: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer),
    {
        let handles = self.pool.allocate(1)?;
        let result = self.record_and_submit(&handles, record);
        self.pool.free(&handles);
        result
    }

    fn record_and_submit<F>(&self, handles: &[vk::CommandBuffer], record: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer),
    {
        let cmd = CommandBuffer::from_handle(self.device.clone(), handles[0]);
        cmd.begin()?;
        record(&cmd);
        cmd.end()?;

        let fence = Fence::new(self.device.clone(), false)?;
        let submit = vk::SubmitInfo::default().command_buffers(handles);
        // SAFETY: the buffer is fully recorded and the fence is fresh.
        unsafe {
            self.device
                .submit_graphics(std::slice::from_ref(&submit), fence.handle())?;
        }
        fence.wait(WAIT_FOREVER)?;
        trace!("One-shot upload completed");
        Ok(())
    }
}
