mod input;
mod loop_runner;
mod scene;

pub use input::{ButtonState, InputAction, InputCollector, InputSnapshot};
pub use loop_runner::{FixedStepLoop, FrameReport, LoopConfig};
pub use scene::{
    Entity, EntityId, EntityIdAllocator, Item, Scene, SceneCommand, SceneWorld, Transform, Vec3,
};
