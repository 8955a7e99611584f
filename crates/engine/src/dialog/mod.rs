mod library;
mod script;
mod shuffle;

pub use library::DialogLibrary;
pub use script::{DialogCursor, DialogScript, Message, NextLine};
pub use shuffle::ShuffleBag;
