pub mod capture_device;
pub mod media_delegate;
pub mod platform;
pub mod playback;
