//! Device memory allocation.
//!
//! This module implements memory-type selection and explicit `VkDeviceMemory`
//! allocation. Selection is deterministic: the first memory type whose bit is
//! set in the requested type filter and whose property flags are a superset of
//! the requested properties wins. There is no fallback policy — on a fixed
//! device the same request always yields the same memory type.

use ash::vk;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Finds the first compatible memory type index.
///
/// # Arguments
///
/// * `memory_properties` - The physical device's memory type table
/// * `type_filter` - Bitmask of acceptable type indices (from
///   `VkMemoryRequirements::memoryTypeBits`)
/// * `required` - Property flags the memory type must include
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableMemoryType`] if no memory type matches.
/// This indicates a device-capability mismatch and is not recoverable.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    required: vk::MemoryPropertyFlags,
) -> RhiResult<u32> {
    let count = memory_properties.memory_type_count as usize;
    for (index, memory_type) in memory_properties.memory_types[..count].iter().enumerate() {
        let in_filter = type_filter & (1 << index) != 0;
        if in_filter && memory_type.property_flags.contains(required) {
            return Ok(index as u32);
        }
    }

    Err(RhiError::NoSuitableMemoryType {
        type_filter,
        properties: required,
    })
}

/// Allocates device memory satisfying the given requirements and properties.
///
/// The returned memory is unbound; the caller binds it to a buffer or image
/// and is responsible for freeing it (normally via the owning RAII wrapper).
///
/// # Errors
///
/// Returns an error if no compatible memory type exists or allocation fails.
pub fn allocate(
    device: &Device,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> RhiResult<vk::DeviceMemory> {
    let memory_type_index = find_memory_type(
        device.memory_properties(),
        requirements.memory_type_bits,
        properties,
    )?;

    let alloc_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    let memory = unsafe { device.handle().allocate_memory(&alloc_info, None)? };
    Ok(memory)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, &flags) in types.iter().enumerate() {
            props.memory_types[i] = vk::MemoryType {
                property_flags: flags,
                heap_index: 0,
            };
        }
        props
    }

    #[test]
    fn first_match_wins() {
        // Two host-visible+coherent types; the lower index must be chosen.
        let props = table(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let index = find_memory_type(
            &props,
            0b111,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn type_filter_excludes_indices() {
        let props = table(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        // Index 0 matches the properties but is masked out of the filter.
        let index =
            find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn property_superset_is_acceptable() {
        // The memory type carries more flags than requested; still a match.
        let props = table(&[vk::MemoryPropertyFlags::HOST_VISIBLE
            | vk::MemoryPropertyFlags::HOST_COHERENT
            | vk::MemoryPropertyFlags::HOST_CACHED]);

        let index =
            find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn no_match_is_an_error() {
        let props = table(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);

        let result = find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(
            result,
            Err(RhiError::NoSuitableMemoryType { type_filter: 0b1, .. })
        ));
    }

    #[test]
    fn ignores_types_beyond_count() {
        // memory_types is a fixed-size array; entries past memory_type_count
        // are stale and must never be considered.
        let mut props = table(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        props.memory_types[1] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE,
            heap_index: 0,
        };

        let result = find_memory_type(&props, 0b11, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(result.is_err());
    }

    #[test]
    fn deterministic_for_fixed_table() {
        let props = table(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let first = find_memory_type(&props, 0b11, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        for _ in 0..8 {
            let again =
                find_memory_type(&props, 0b11, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
            assert_eq!(again, first);
        }
    }
}
