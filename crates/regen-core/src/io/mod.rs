pub mod channel_reader;
pub mod image_io;
