//! Samplers and a cache that shares them between textures.

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Identity of a sampler: textures with equal keys share one `VkSampler`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerKey {
    pub filter: vk::Filter,
    pub address_mode: vk::SamplerAddressMode,
}

impl SamplerKey {
    pub const fn new(filter: vk::Filter, address_mode: vk::SamplerAddressMode) -> Self {
        Self {
            filter,
            address_mode,
        }
    }
}

impl Default for SamplerKey {
    /// Linear filtering with repeat addressing.
    fn default() -> Self {
        Self::new(vk::Filter::LINEAR, vk::SamplerAddressMode::REPEAT)
    }
}

/// Owned `VkSampler`.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Creates a sampler with anisotropy at the device maximum.
    pub fn new(device: Arc<Device>, key: SamplerKey) -> RhiResult<Self> {
        let info = vk::SamplerCreateInfo::default()
            .mag_filter(key.filter)
            .min_filter(key.filter)
            .address_mode_u(key.address_mode)
            .address_mode_v(key.address_mode)
            .address_mode_w(key.address_mode)
            .anisotropy_enable(true)
            .max_anisotropy(device.max_sampler_anisotropy())
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = unsafe { device.handle().create_sampler(&info, None)? };
        debug!(
            "Created sampler: {:?} / {:?}",
            key.filter, key.address_mode
        );
        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
    }
}

/// Owns every sampler; textures hold only the raw handle.
///
/// Must outlive every descriptor set that references its samplers.
pub struct SamplerCache {
    device: Arc<Device>,
    samplers: HashMap<SamplerKey, Sampler>,
}

impl SamplerCache {
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            samplers: HashMap::new(),
        }
    }

    /// Returns the sampler for `key`, creating it on first use.
    pub fn get_or_create(&mut self, key: SamplerKey) -> RhiResult<vk::Sampler> {
        if let Some(sampler) = self.samplers.get(&key) {
            return Ok(sampler.handle());
        }
        let sampler = Sampler::new(self.device.clone(), key)?;
        let handle = sampler.handle();
        self.samplers.insert(key, sampler);
        Ok(handle)
    }

    pub fn get(&self, key: &SamplerKey) -> Option<vk::Sampler> {
        self.samplers.get(key).map(Sampler::handle)
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }
}
