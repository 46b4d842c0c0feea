// src/wgpu_utils/scope.rs
//! Error scopes around resource creation
//!
//! wgpu reports most creation failures asynchronously through error scopes
//! rather than return values. These helpers turn a scope into a `Result`.

use crate::error::GpuError;

/// Runs `create` inside validation and out-of-memory error scopes.
///
/// The value is returned only when neither scope captured an error. On native
/// backends the scope future is already resolved, so `block_on` does not wait.
pub fn checked<T>(
    device: &wgpu::Device,
    label: &'static str,
    create: impl FnOnce() -> T,
) -> Result<T, GpuError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let value = create();

    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());

    match validation.or(out_of_memory) {
        Some(error) => Err(GpuError::ResourceCreation {
            label,
            message: error.to_string(),
        }),
        None => Ok(value),
    }
}

/// Pops a validation scope pushed with [`push_validation`] and reports its error, if any.
pub fn pop_validation(device: &wgpu::Device) -> Option<String> {
    pollster::block_on(device.pop_error_scope()).map(|error| error.to_string())
}

/// Pushes a validation scope.
pub fn push_validation(device: &wgpu::Device) {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wgpu_utils::test_device;

    #[test]
    fn test_checked_returns_value() {
        let Some((device, _queue)) = test_device() else {
            return;
        };
        let buffer = checked(&device, "staging buffer", || {
            crate::wgpu_utils::buffers::create_staging_buffer(&device, "Checked", 64)
        })
        .unwrap();
        assert_eq!(buffer.size(), 64);
    }

    #[test]
    fn test_checked_captures_validation_error() {
        let Some((device, _queue)) = test_device() else {
            return;
        };
        // mappable storage needs a feature the device was not created with
        let result = checked(&device, "invalid buffer", || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Invalid"),
                size: 64,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        });
        assert!(matches!(
            result,
            Err(GpuError::ResourceCreation {
                label: "invalid buffer",
                ..
            })
        ));

        // the scopes were popped, later creation is unaffected
        assert!(checked(&device, "valid buffer", || {
            crate::wgpu_utils::buffers::create_staging_buffer(&device, "Valid", 64)
        })
        .is_ok());
    }
}
