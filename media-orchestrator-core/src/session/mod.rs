pub mod audio_playback;
pub mod orchestrator;
pub mod recording;
pub mod video_playback;
