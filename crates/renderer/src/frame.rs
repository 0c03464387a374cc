//! Per-frame command recording and synchronization state.

use std::sync::Arc;

use viewer_rhi::command::{CommandBuffer, CommandPool};
use viewer_rhi::device::Device;
use viewer_rhi::sync::FrameSync;
use viewer_rhi::{RhiError, RhiResult};

/// Command pool, command buffer, and synchronization objects for one frame.
///
/// The viewer runs a single frame in flight, so there is exactly one of
/// these; the in-flight fence gates reuse of the command buffer.
pub struct FrameContext {
    sync: FrameSync,
    // Held for ownership; the command buffer allocates from it.
    _command_pool: CommandPool,
    command_buffer: CommandBuffer,
}

impl FrameContext {
    /// Creates the frame's command pool, command buffer, and sync objects.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;

        let sync = FrameSync::new(device.clone())?;
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        let command_buffer = CommandBuffer::new(device, &command_pool)?;

        Ok(Self {
            sync,
            _command_pool: command_pool,
            command_buffer,
        })
    }

    /// Returns the frame's synchronization objects.
    #[inline]
    pub fn sync(&self) -> &FrameSync {
        &self.sync
    }

    /// Returns the frame's command buffer.
    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }
}

/// Tracks whether the in-flight fence has a submission that will signal it.
///
/// The fence starts signaled and is reset each frame before submit. A wait
/// on a fence that was reset but never handed to the queue blocks forever,
/// so after a failed submit the next frame consults this state and skips
/// its wait instead of deadlocking.
#[derive(Debug)]
pub struct FenceState {
    will_signal: bool,
}

impl FenceState {
    /// Matches a freshly created fence, which starts signaled.
    pub fn new() -> Self {
        Self { will_signal: true }
    }

    /// Whether a wait on the fence can complete.
    #[inline]
    pub fn wait_required(&self) -> bool {
        self.will_signal
    }

    /// Records that the fence was reset to unsignaled.
    pub fn on_reset(&mut self) {
        self.will_signal = false;
    }

    /// Records that a queue submission will signal the fence.
    pub fn on_submit(&mut self) {
        self.will_signal = true;
    }
}

impl Default for FenceState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_fence_state_requires_wait() {
        assert!(FenceState::new().wait_required());
    }

    #[test]
    fn reset_without_submit_skips_wait() {
        let mut state = FenceState::new();
        state.on_reset();
        assert!(!state.wait_required());
    }

    #[test]
    fn submit_after_reset_restores_wait() {
        let mut state = FenceState::new();
        state.on_reset();
        state.on_submit();
        assert!(state.wait_required());
    }
}
