mod compiler;
mod database;
mod discovery;
mod types;

pub use compiler::{
    compile_dialog_database, ContentCompileError, ContentErrorCode, SourceLocation,
};
pub use database::{DialogDatabase, DialogDef, DialogDefId};
pub use types::{ContentPlanError, ContentRequest};
