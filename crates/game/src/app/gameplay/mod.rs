mod console;
mod lamp;
mod scene;
mod timeline;

pub(crate) use scene::{DemoLog, DemoScene};
pub(crate) use timeline::Timeline;
