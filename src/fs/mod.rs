pub use file::AioFile;
pub use open_options::{AioOpenMode, AioOpenOptionsExt};

mod file;
mod open_options;
