pub mod metadata;
pub mod take_writer;
