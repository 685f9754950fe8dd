pub mod runner;

pub use runner::{ProgressSender, ProgressUpdate, TaskHandle, TaskRunner};
