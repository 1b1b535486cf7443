pub mod capture;
pub mod vault;

pub use capture::{AudioClip, CaptureSource, WavFileCaptureSource};
pub use vault::AudioVault;
