//! GPU buffers backed by `gpu-allocator`.
//!
//! Geometry lives in device-local memory and is filled through a staging
//! copy ([`Buffer::device_local_with_data`]). Uniform and staging buffers are
//! persistently mapped host-visible memory written with [`Buffer::write_data`].

use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::upload::Uploader;

/// What a buffer is used for. Decides usage flags and memory placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
    Staging,
}

impl BufferUsage {
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    pub fn memory_location(self) -> MemoryLocation {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => MemoryLocation::GpuOnly,
            BufferUsage::Uniform | BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    #[inline]
    pub fn is_host_visible(self) -> bool {
        self.memory_location() != MemoryLocation::GpuOnly
    }

    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
        }
    }
}

/// Owned `VkBuffer` plus its allocation.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates an uninitialized buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Zero size, buffer creation failure, or allocation failure. The buffer
    /// handle is destroyed again if allocation or binding fails.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(format!(
                "{} buffer size must be greater than 0",
                usage.name()
            )));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: usage.name(),
                    requirements,
                    location: usage.memory_location(),
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });

        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let mut this = Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        };

        let bind = match this.allocation.as_ref() {
            Some(a) => unsafe {
                this.device
                    .handle()
                    .bind_buffer_memory(buffer, a.memory(), a.offset())
            },
            None => Err(vk::Result::ERROR_UNKNOWN),
        };
        // On failure `this` drops and releases both the allocation and the buffer.
        bind?;

        debug!("Created {} buffer: {} bytes", usage.name(), size);
        Ok(this)
    }

    /// Host-visible buffer initialized with `data`.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Device-local buffer filled through a temporary staging buffer.
    ///
    /// Blocks until the copy has completed; the staging buffer is released
    /// before returning.
    pub fn device_local_with_data(
        device: Arc<Device>,
        uploader: &Uploader,
        usage: BufferUsage,
        data: &[u8],
    ) -> RhiResult<Self> {
        let staging = Self::new_with_data(device.clone(), BufferUsage::Staging, data)?;
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;

        uploader.submit_once(|cmd| {
            cmd.copy_buffer(staging.handle(), buffer.handle(), staging.size());
        })?;

        debug!(
            "Uploaded {} bytes into device-local {} buffer",
            data.len(),
            usage.name()
        );
        Ok(buffer)
    }

    /// Copies `data` into mapped memory at `offset`.
    ///
    /// # Errors
    ///
    /// The write runs past the end, or the buffer is not host-visible.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        if !self.usage.is_host_visible() {
            return Err(RhiError::InvalidHandle(format!(
                "{} buffer is device-local; upload through a staging buffer",
                self.usage.name()
            )));
        }
        check_write_range(offset, data.len(), self.size)?;

        let mapped = self
            .allocation
            .as_ref()
            .and_then(|a| a.mapped_ptr())
            .ok_or_else(|| {
                RhiError::InvalidHandle(format!("{} buffer is not mapped", self.usage.name()))
            })?;

        // SAFETY: range checked above; the mapping stays valid while the allocation lives.
        unsafe {
            let dst = mapped.as_ptr().cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }

    /// Writes one `Pod` value at offset 0.
    pub fn write_pod<T: Pod>(&self, value: &T) -> RhiResult<()> {
        self.write_data(0, bytemuck::bytes_of(value))
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Whole-buffer descriptor info for uniform bindings.
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset: 0,
            range: self.size,
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {} buffer memory: {:?}", self.usage.name(), e);
                    }
                }
                Err(e) => error!("Leaking {} buffer memory: {}", self.usage.name(), e),
            }
        }
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }
    }
}

/// Validates that `len` bytes at `offset` fit inside `size`.
pub fn check_write_range(offset: vk::DeviceSize, len: usize, size: vk::DeviceSize) -> RhiResult<()> {
    let end = offset.checked_add(len as vk::DeviceSize);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(RhiError::InvalidHandle(format!(
            "write of {} bytes at offset {} exceeds buffer size {}",
            len, offset, size
        ))),
    }
}
