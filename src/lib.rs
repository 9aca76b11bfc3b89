pub mod audio_worker;
pub mod cli;
pub mod domain;
pub mod error;
pub mod logging;
pub mod settings;
