//! Frame buffers between stages.
//!
//! Each `kotekan_buffer: vis` block becomes a bounded channel holding
//! `num_frames` frames. A buffer must have exactly one producer and one
//! consumer; stages claim their ends while the pipeline is being built.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tracing::debug;

use kotekan_runner_core::frame::{MAX_NUM_ELEMENTS, VisFrame};

use crate::config::{BlockKind, BlockPath, PipelineConfig};
use crate::error::SimError;

const SUPPORTED_BUFFER_TYPE: &str = "vis";
const SUPPORTED_POOL_TYPE: &str = "visMetadata";

/// Frame structure a buffer carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShape {
    pub num_elements: u32,
    pub num_ev: u32,
}

impl FrameShape {
    fn matches(&self, frame: &VisFrame) -> bool {
        frame.metadata.num_elements == self.num_elements && frame.metadata.num_ev == self.num_ev
    }
}

/// Producer end of a buffer.
#[derive(Debug, Clone)]
pub struct FrameSender {
    buffer: String,
    shape: FrameShape,
    tx: mpsc::Sender<VisFrame>,
}

impl FrameSender {
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    /// Send a frame, waiting for space in the buffer.
    pub async fn send(&self, frame: VisFrame) -> Result<(), SimError> {
        if !self.shape.matches(&frame) {
            return Err(SimError::Buffer {
                buffer: self.buffer.clone(),
                reason: format!(
                    "frame shape ({} elements, {} evs) does not match buffer ({} elements, {} evs)",
                    frame.metadata.num_elements,
                    frame.metadata.num_ev,
                    self.shape.num_elements,
                    self.shape.num_ev
                ),
            });
        }
        self.tx.send(frame).await.map_err(|_| SimError::Buffer {
            buffer: self.buffer.clone(),
            reason: "consumer has gone away".to_owned(),
        })
    }
}

/// Consumer end of a buffer.
#[derive(Debug)]
pub struct FrameReceiver {
    buffer: String,
    shape: FrameShape,
    rx: mpsc::Receiver<VisFrame>,
}

impl FrameReceiver {
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    /// Next frame, or `None` once the producer has finished.
    pub async fn recv(&mut self) -> Option<VisFrame> {
        self.rx.recv().await
    }
}

#[derive(Debug)]
struct Slot {
    shape: FrameShape,
    capacity: usize,
    producer: Option<FrameSender>,
    consumer: Option<FrameReceiver>,
}

/// All buffers declared by the document.
#[derive(Debug, Default)]
pub struct BufferRegistry {
    slots: BTreeMap<String, Slot>,
}

impl BufferRegistry {
    /// Create the buffers and check their metadata pools.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, SimError> {
        let blocks = config.blocks()?;
        let pools: Vec<&BlockPath> = blocks
            .iter()
            .filter_map(|b| match &b.kind {
                BlockKind::MetadataPool(kind) if kind == SUPPORTED_POOL_TYPE => Some(&b.path),
                _ => None,
            })
            .collect();

        let mut registry = Self::default();
        for block in &blocks {
            match &block.kind {
                BlockKind::Buffer(kind) => {
                    if kind != SUPPORTED_BUFFER_TYPE {
                        return Err(SimError::Buffer {
                            buffer: block.path.to_string(),
                            reason: format!("unsupported buffer type '{kind}'"),
                        });
                    }
                    registry.declare(config, &block.path, &pools)?;
                }
                BlockKind::MetadataPool(kind) if kind != SUPPORTED_POOL_TYPE => {
                    return Err(SimError::config(
                        block.path.to_string(),
                        "kotekan_metadata_pool",
                        format!("unsupported metadata pool type '{kind}'"),
                    ));
                }
                _ => {}
            }
        }
        Ok(registry)
    }

    fn declare(
        &mut self,
        config: &PipelineConfig,
        path: &BlockPath,
        pools: &[&BlockPath],
    ) -> Result<(), SimError> {
        let name = path.name().to_owned();
        if self.slots.contains_key(&name) {
            return Err(SimError::Buffer {
                buffer: name,
                reason: "declared more than once".to_owned(),
            });
        }

        let pool = config.get_string(path, "metadata_pool")?;
        if !pools.iter().any(|p| p.name() == pool) {
            return Err(SimError::Buffer {
                buffer: name,
                reason: format!("metadata pool '{pool}' is not declared"),
            });
        }

        let capacity = config.get_u64(path, "num_frames")?;
        if capacity == 0 {
            return Err(SimError::config(
                path.to_string(),
                "num_frames",
                "must be greater than 0",
            ));
        }
        let capacity = usize::try_from(capacity).map_err(|_| {
            SimError::config(path.to_string(), "num_frames", "value is too large")
        })?;
        let shape = FrameShape {
            num_elements: to_u32(config, path, "num_elements")?,
            num_ev: to_u32(config, path, "num_ev")?,
        };
        if shape.num_elements == 0 || shape.num_elements > MAX_NUM_ELEMENTS {
            return Err(SimError::config(
                path.to_string(),
                "num_elements",
                format!("must be 1-{MAX_NUM_ELEMENTS}"),
            ));
        }
        if shape.num_ev > shape.num_elements {
            return Err(SimError::config(
                path.to_string(),
                "num_ev",
                "must not exceed num_elements",
            ));
        }

        let (tx, rx) = mpsc::channel(capacity);
        debug!(buffer = %name, capacity, ?shape, "declared buffer");
        self.slots.insert(
            name.clone(),
            Slot {
                shape,
                capacity,
                producer: Some(FrameSender {
                    buffer: name.clone(),
                    shape,
                    tx,
                }),
                consumer: Some(FrameReceiver {
                    buffer: name,
                    shape,
                    rx,
                }),
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn capacity(&self, name: &str) -> Option<usize> {
        self.slots.get(name).map(|s| s.capacity)
    }

    /// Claim the producer end of `name` for `stage`.
    pub fn take_producer(&mut self, name: &str, stage: &str) -> Result<FrameSender, SimError> {
        let slot = self.slot(name)?;
        slot.producer.take().ok_or_else(|| SimError::Buffer {
            buffer: name.to_owned(),
            reason: format!("'{stage}' is a second producer"),
        })
    }

    /// Claim the consumer end of `name` for `stage`.
    pub fn take_consumer(&mut self, name: &str, stage: &str) -> Result<FrameReceiver, SimError> {
        let slot = self.slot(name)?;
        slot.consumer.take().ok_or_else(|| SimError::Buffer {
            buffer: name.to_owned(),
            reason: format!("'{stage}' is a second consumer"),
        })
    }

    pub fn shape(&self, name: &str) -> Option<FrameShape> {
        self.slots.get(name).map(|s| s.shape)
    }

    fn slot(&mut self, name: &str) -> Result<&mut Slot, SimError> {
        self.slots.get_mut(name).ok_or_else(|| SimError::Buffer {
            buffer: name.to_owned(),
            reason: "no such buffer".to_owned(),
        })
    }

    /// Fail if any buffer is missing a producer or a consumer.
    pub fn check_wiring(&self) -> Result<(), SimError> {
        for (name, slot) in &self.slots {
            if slot.producer.is_some() {
                return Err(SimError::Buffer {
                    buffer: name.clone(),
                    reason: "has no producer".to_owned(),
                });
            }
            if slot.consumer.is_some() {
                return Err(SimError::Buffer {
                    buffer: name.clone(),
                    reason: "has no consumer".to_owned(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn to_u32(config: &PipelineConfig, path: &BlockPath, key: &str) -> Result<u32, SimError> {
    let value = config.get_u64(path, key)?;
    u32::try_from(value)
        .map_err(|_| SimError::config(path.to_string(), key, "value does not fit in 32 bits"))
}
