pub mod converter;
pub mod wav_format;
