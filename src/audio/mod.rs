pub mod cover_art;
pub mod discovery;
pub mod encoder;
pub mod metadata;
