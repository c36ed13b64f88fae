pub mod analysis;
pub mod asr;
pub mod audio;
pub mod config;
pub mod decode;
pub mod feedback;
pub mod pipeline;
pub mod sink;
pub mod summary;
pub mod util;
