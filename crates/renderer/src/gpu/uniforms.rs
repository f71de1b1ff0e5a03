use crate::error::PipelineError;
use crate::link::{UniformBlock, UniformLocation};

use super::scoped;

/// std140 uniform blocks are sized in multiples of 16 bytes.
const BLOCK_ALIGNMENT: u64 = 16;

struct BlockStorage {
    block: UniformBlock,
    buffer: wgpu::Buffer,
    staging: Vec<u8>,
    dirty: bool,
}

/// CPU mirrors of the program's uniform blocks plus their GPU buffers.
pub(crate) struct UniformBlocks {
    storage: Vec<BlockStorage>,
}

impl UniformBlocks {
    pub fn new(device: &wgpu::Device, blocks: &[UniformBlock]) -> Result<Self, PipelineError> {
        let (storage, error) = scoped(device, wgpu::ErrorFilter::OutOfMemory, || {
            blocks
                .iter()
                .map(|block| {
                    let size = padded_size(block.size);
                    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some("uniform block"),
                        size,
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    });
                    BlockStorage {
                        block: *block,
                        buffer,
                        staging: vec![0; size as usize],
                        dirty: true,
                    }
                })
                .collect::<Vec<_>>()
        });
        if let Some(err) = error {
            return Err(PipelineError::resource("uniform buffer", err.to_string()));
        }
        Ok(Self { storage })
    }

    pub fn blocks(&self) -> impl Iterator<Item = (&UniformBlock, &wgpu::Buffer)> {
        self.storage.iter().map(|entry| (&entry.block, &entry.buffer))
    }

    /// Stages `bytes` at `location`; sent to the GPU on the next [`flush`].
    ///
    /// [`flush`]: Self::flush
    pub fn write(&mut self, location: &UniformLocation, bytes: &[u8]) {
        let Some(entry) = self.storage.iter_mut().find(|entry| {
            entry.block.group == location.group && entry.block.binding == location.binding
        }) else {
            tracing::warn!(?location, "uniform location has no backing block");
            return;
        };

        let start = location.offset as usize;
        let len = bytes.len().min(location.kind.size() as usize);
        let Some(slot) = entry.staging.get_mut(start..start + len) else {
            tracing::warn!(?location, "uniform write falls outside its block");
            return;
        };
        if slot != &bytes[..len] {
            slot.copy_from_slice(&bytes[..len]);
            entry.dirty = true;
        }
    }

    pub fn flush(&mut self, queue: &wgpu::Queue) {
        for entry in self.storage.iter_mut().filter(|entry| entry.dirty) {
            queue.write_buffer(&entry.buffer, 0, &entry.staging);
            entry.dirty = false;
        }
    }
}

fn padded_size(size: u32) -> u64 {
    let size = u64::from(size.max(1));
    size.div_ceil(BLOCK_ALIGNMENT) * BLOCK_ALIGNMENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_sizes_round_up_to_sixteen() {
        assert_eq!(padded_size(0), 16);
        assert_eq!(padded_size(16), 16);
        assert_eq!(padded_size(20), 32);
        assert_eq!(padded_size(128), 128);
    }
}
