//! Render transfer handle

use crate::audio::format::SampleFormat;

/// Render-buffer transfer capability resolved from an initialized session
///
/// Wraps the engine's render service together with the buffer geometry it
/// was acquired under. Dropping it releases the service.
#[derive(Debug)]
pub struct RenderTransfer<S> {
    service: S,
    buffer_frames: u32,
    format: SampleFormat,
}

impl<S> RenderTransfer<S> {
    pub(crate) fn new(service: S, buffer_frames: u32, format: SampleFormat) -> Self {
        Self {
            service,
            buffer_frames,
            format,
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    pub fn into_inner(self) -> S {
        self.service
    }

    /// Buffer size in frames at acquisition time
    pub fn buffer_frames(&self) -> u32 {
        self.buffer_frames
    }

    /// Format of the frames written through this handle
    pub fn format(&self) -> &SampleFormat {
        &self.format
    }

    /// Bytes per frame of [`Self::format`]
    pub fn frame_bytes(&self) -> usize {
        self.format.block_align() as usize
    }

    /// Frames writable given the session's current padding
    pub fn writable_frames(&self, padding: u32) -> u32 {
        self.buffer_frames.saturating_sub(padding)
    }
}
