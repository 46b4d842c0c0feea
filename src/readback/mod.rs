//! Non-blocking GPU to host readback

pub mod ring;
pub mod slots;
pub mod staging;

pub use ring::{ReadbackRing, RingStats};
pub use slots::{SlotState, SlotTable};
pub use staging::{GpuStagingBuffer, StagingBuffer};
