//! Descriptor layouts, pools and the [`BindingSet`] built on top of them.
//!
//! A [`BindingSet`] is declared first and allocated later. Bindings and pool
//! requirements accumulate until [`BindingSet::finalize`] creates the layout,
//! the pool and one descriptor set per instance. Only then can sets be
//! written, either one instance at a time or broadcast to all of them.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use vista_rhi::device::Device;
//! # use vista_rhi::descriptor::BindingSet;
//! # use ash::vk;
//! # fn example(device: Arc<Device>, ubo: vk::DescriptorBufferInfo) -> vista_rhi::RhiResult<()> {
//! let mut frame_set = BindingSet::new(device);
//! frame_set.add_binding(vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX, 0, 1);
//! frame_set.add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, 2);
//! frame_set.finalize(2)?;
//! frame_set.broadcast_buffer(0, ubo)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Owned `VkDescriptorSetLayout`.
pub struct DescriptorSetLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Layout handle.
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates a layout from `bindings`.
    ///
    /// # Errors
    ///
    /// Returns an error if `vkCreateDescriptorSetLayout` fails.
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );

        Ok(Self { device, layout })
    }

    /// Raw layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool. Sets allocated from it are released with the pool.
///
/// # Thread Safety
///
/// Allocation from one pool must be externally synchronized. Each
/// [`BindingSet`] owns its own pool and allocates once.
pub struct DescriptorPool {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Pool handle.
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Creates a pool.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `max_sets` - Maximum number of sets that can be allocated
    /// * `pool_sizes` - Descriptor counts per descriptor type
    ///
    /// # Errors
    ///
    /// Returns an error if `vkCreateDescriptorPool` fails.
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            max_sets,
            pool_sizes.len()
        );

        Ok(Self { device, pool })
    }

    /// Allocates one set per entry of `layouts`.
    ///
    /// # Errors
    ///
    /// Returns `ERROR_OUT_OF_POOL_MEMORY` (wrapped) when the pool was sized
    /// too small.
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        Ok(unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? })
    }

    /// Raw pool handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Shorthand for layout binding descriptions.
pub struct DescriptorBindingBuilder;

impl DescriptorBindingBuilder {
    /// One layout binding of `count` descriptors visible to `stage_flags`.
    #[inline]
    pub fn binding(
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        binding: u32,
        count: u32,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(descriptor_type)
            .descriptor_count(count)
            .stage_flags(stage_flags)
    }
}

/// Bindings and pool requirements collected before allocation.
#[derive(Clone, Debug, Default)]
pub struct BindingDeclarations {
    /// Layout bindings in declaration order.
    bindings: Vec<vk::DescriptorSetLayoutBinding<'static>>,
    /// Explicit pool sizes, one entry per descriptor type.
    pool_sizes: Vec<vk::DescriptorPoolSize>,
}

impl BindingDeclarations {
    /// Declares `count` descriptors of `descriptor_type` at `binding`.
    pub fn add_binding(
        &mut self,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        binding: u32,
        count: u32,
    ) {
        self.bindings.push(DescriptorBindingBuilder::binding(
            descriptor_type,
            stage_flags,
            binding,
            count,
        ));
    }

    /// Adds `count` descriptors of `descriptor_type` to the pool, merging with
    /// an earlier entry of the same type.
    pub fn add_pool_size(&mut self, descriptor_type: vk::DescriptorType, count: u32) {
        match self.pool_sizes.iter_mut().find(|s| s.ty == descriptor_type) {
            Some(size) => size.descriptor_count += count,
            None => self.pool_sizes.push(vk::DescriptorPoolSize {
                ty: descriptor_type,
                descriptor_count: count,
            }),
        }
    }

    /// Declared layout bindings.
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding<'static>] {
        &self.bindings
    }

    /// Type declared for `binding`, if any.
    pub fn descriptor_type(&self, binding: u32) -> Option<vk::DescriptorType> {
        self.bindings
            .iter()
            .find(|b| b.binding == binding)
            .map(|b| b.descriptor_type)
    }

    /// Pool sizes for `instance_count` sets.
    ///
    /// Explicit pool sizes win. Without them every binding is reserved once
    /// per instance.
    pub fn pool_sizes(&self, instance_count: u32) -> Vec<vk::DescriptorPoolSize> {
        if !self.pool_sizes.is_empty() {
            return self.pool_sizes.clone();
        }
        let mut derived = BindingDeclarations::default();
        for b in &self.bindings {
            derived.add_pool_size(b.descriptor_type, b.descriptor_count * instance_count);
        }
        derived.pool_sizes
    }
}

struct Allocated {
    sets: Vec<vk::DescriptorSet>,
    // Sets are freed with the pool; the layout goes last.
    _pool: DescriptorPool,
    layout: DescriptorSetLayout,
}

/// Declared-then-finalized group of descriptor sets sharing one layout.
///
/// Writes before [`finalize`](Self::finalize) fail with
/// [`RhiError::BindingSetNotFinalized`] instead of touching null handles.
pub struct BindingSet {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// What `finalize` will create.
    declarations: BindingDeclarations,
    /// Layout, pool and sets, present once finalized.
    allocated: Option<Allocated>,
}

impl BindingSet {
    /// Creates an empty, unfinalized binding set.
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            declarations: BindingDeclarations::default(),
            allocated: None,
        }
    }

    pub fn add_binding(
        &mut self,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        binding: u32,
        count: u32,
    ) -> &mut Self {
        // Declarations after finalize are kept but never reach the layout.
        self.declarations
            .add_binding(descriptor_type, stage_flags, binding, count);
        self
    }

    /// Reserves `count` extra descriptors of `descriptor_type` in the pool.
    pub fn add_pool_size(&mut self, descriptor_type: vk::DescriptorType, count: u32) -> &mut Self {
        self.declarations.add_pool_size(descriptor_type, count);
        self
    }

    /// Creates the layout, the pool and `instance_count` sets.
    ///
    /// # Errors
    ///
    /// Called twice, zero instances, or Vulkan failures.
    pub fn finalize(&mut self, instance_count: u32) -> RhiResult<()> {
        if self.is_finalized() {
            return Err(RhiError::InvalidHandle(
                "binding set already finalized".to_string(),
            ));
        }
        if instance_count == 0 {
            return Err(RhiError::InvalidHandle(
                "binding set needs at least one instance".to_string(),
            ));
        }

        let layout = DescriptorSetLayout::new(self.device.clone(), self.declarations.bindings())?;
        let pool = DescriptorPool::new(
            self.device.clone(),
            instance_count,
            &self.declarations.pool_sizes(instance_count),
        )?;
        let layouts = vec![layout.handle(); instance_count as usize];
        let sets = pool.allocate(&layouts)?;

        debug!(
            "Finalized binding set: {} binding(s) x {} instance(s)",
            self.declarations.bindings().len(),
            instance_count
        );

        self.allocated = Some(Allocated {
            sets,
            _pool: pool,
            layout,
        });
        Ok(())
    }

    /// True once the sets exist.
    pub fn is_finalized(&self) -> bool {
        self.allocated.is_some()
    }

    /// Writes a buffer into `binding` of instance `index`.
    ///
    /// # Errors
    ///
    /// See [`write_target`].
    pub fn write_buffer(
        &self,
        binding: u32,
        index: usize,
        info: vk::DescriptorBufferInfo,
    ) -> RhiResult<()> {
        let (ty, sets) = self.target(binding, Some(index))?;
        let infos = [info];
        let writes: Vec<_> = sets
            .iter()
            .map(|&set| write_for(set, binding, ty).buffer_info(&infos))
            .collect();
        self.update(&writes);
        Ok(())
    }

    /// Writes an image into `binding` of instance `index`.
    ///
    /// # Errors
    ///
    /// See [`write_target`].
    pub fn write_image(
        &self,
        binding: u32,
        index: usize,
        info: vk::DescriptorImageInfo,
    ) -> RhiResult<()> {
        let (ty, sets) = self.target(binding, Some(index))?;
        let infos = [info];
        let writes: Vec<_> = sets
            .iter()
            .map(|&set| write_for(set, binding, ty).image_info(&infos))
            .collect();
        self.update(&writes);
        Ok(())
    }

    /// Writes the same buffer into `binding` of every instance.
    pub fn broadcast_buffer(&self, binding: u32, info: vk::DescriptorBufferInfo) -> RhiResult<()> {
        let (ty, sets) = self.target(binding, None)?;
        let infos = [info];
        let writes: Vec<_> = sets
            .iter()
            .map(|&set| write_for(set, binding, ty).buffer_info(&infos))
            .collect();
        self.update(&writes);
        Ok(())
    }

    /// Writes the same image into `binding` of every instance.
    pub fn broadcast_image(&self, binding: u32, info: vk::DescriptorImageInfo) -> RhiResult<()> {
        let (ty, sets) = self.target(binding, None)?;
        let infos = [info];
        let writes: Vec<_> = sets
            .iter()
            .map(|&set| write_for(set, binding, ty).image_info(&infos))
            .collect();
        self.update(&writes);
        Ok(())
    }

    /// Layout handle, or null before `finalize`.
    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.allocated
            .as_ref()
            .map_or(vk::DescriptorSetLayout::null(), |a| a.layout.handle())
    }

    /// Set of instance `index`, or `None` before `finalize` or out of range.
    pub fn set(&self, index: usize) -> Option<vk::DescriptorSet> {
        self.allocated
            .as_ref()
            .and_then(|a| a.sets.get(index).copied())
    }

    /// Number of allocated sets; zero before `finalize`.
    pub fn instance_count(&self) -> usize {
        self.allocated.as_ref().map_or(0, |a| a.sets.len())
    }

    fn target(
        &self,
        binding: u32,
        index: Option<usize>,
    ) -> RhiResult<(vk::DescriptorType, &[vk::DescriptorSet])> {
        let sets = self.allocated.as_ref().map(|a| a.sets.as_slice());
        write_target(&self.declarations, sets, binding, index)
    }

    fn update(&self, writes: &[vk::WriteDescriptorSet]) {
        if writes.is_empty() {
            return;
        }
        unsafe {
            self.device.handle().update_descriptor_sets(writes, &[]);
        }
    }
}

fn write_for<'a>(
    set: vk::DescriptorSet,
    binding: u32,
    ty: vk::DescriptorType,
) -> vk::WriteDescriptorSet<'a> {
    vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .dst_array_element(0)
        .descriptor_type(ty)
}

/// Resolves the descriptor type and the sets a write goes to.
///
/// `sets` is `None` until the binding set is finalized. `index` selects one
/// instance; `None` targets all of them.
///
/// # Errors
///
/// In this order: not finalized, binding never declared, instance out of
/// range.
pub fn write_target<'a>(
    declarations: &BindingDeclarations,
    sets: Option<&'a [vk::DescriptorSet]>,
    binding: u32,
    index: Option<usize>,
) -> RhiResult<(vk::DescriptorType, &'a [vk::DescriptorSet])> {
    let sets = sets.ok_or(RhiError::BindingSetNotFinalized { binding })?;
    let ty = declarations.descriptor_type(binding).ok_or_else(|| {
        RhiError::InvalidHandle(format!("binding {} was never declared", binding))
    })?;
    match index {
        Some(index) => sets
            .get(index..=index)
            .map(|one| (ty, one))
            .ok_or(RhiError::BindingOutOfRange {
                index,
                count: sets.len(),
            }),
        None => Ok((ty, sets)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_descriptor_binding_builder() {
        let binding = DescriptorBindingBuilder::binding(
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::ShaderStageFlags::FRAGMENT,
            2,
            3,
        );
        assert_eq!(binding.binding, 2);
        assert_eq!(
            binding.descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(binding.descriptor_count, 3);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_pool_sizes_merge_by_type() {
        let mut decl = BindingDeclarations::default();
        decl.add_pool_size(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 3);
        decl.add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, 2);
        decl.add_pool_size(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 3);

        let sizes = decl.pool_sizes(2);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].descriptor_count, 6);
        assert_eq!(sizes[1].descriptor_count, 2);
    }

    #[test]
    fn test_pool_sizes_derived_from_bindings() {
        let mut decl = BindingDeclarations::default();
        for binding in 0..3 {
            decl.add_binding(
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                binding,
                1,
            );
        }
        let sizes = decl.pool_sizes(5);
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].descriptor_count, 15);
        assert_eq!(
            decl.descriptor_type(2),
            Some(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        );
        assert_eq!(decl.descriptor_type(3), None);
    }

    fn uniform_declarations() -> BindingDeclarations {
        let mut decl = BindingDeclarations::default();
        decl.add_binding(
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::ShaderStageFlags::VERTEX,
            0,
            1,
        );
        decl
    }

    fn fake_sets(count: u64) -> Vec<vk::DescriptorSet> {
        (1..=count).map(vk::DescriptorSet::from_raw).collect()
    }

    #[test]
    fn test_write_before_finalize_is_rejected() {
        let decl = uniform_declarations();
        assert!(matches!(
            write_target(&decl, None, 0, Some(0)),
            Err(RhiError::BindingSetNotFinalized { binding: 0 })
        ));
        assert!(matches!(
            write_target(&decl, None, 0, None),
            Err(RhiError::BindingSetNotFinalized { binding: 0 })
        ));
        // Not finalized is reported even for an undeclared binding.
        assert!(matches!(
            write_target(&decl, None, 9, None),
            Err(RhiError::BindingSetNotFinalized { binding: 9 })
        ));
    }

    #[test]
    fn test_write_out_of_range_instance() {
        let decl = uniform_declarations();
        let sets = fake_sets(2);
        assert!(matches!(
            write_target(&decl, Some(&sets), 0, Some(2)),
            Err(RhiError::BindingOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_write_undeclared_binding() {
        let decl = uniform_declarations();
        let sets = fake_sets(2);
        assert!(matches!(
            write_target(&decl, Some(&sets), 1, Some(0)),
            Err(RhiError::InvalidHandle(_))
        ));
    }

    #[test]
    fn test_write_targets_one_or_all_instances() {
        let decl = uniform_declarations();
        let sets = fake_sets(2);

        let (ty, one) = write_target(&decl, Some(&sets), 0, Some(1)).unwrap();
        assert_eq!(ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(one, &sets[1..2]);

        let (_, all) = write_target(&decl, Some(&sets), 0, None).unwrap();
        assert_eq!(all, sets.as_slice());
    }
}
