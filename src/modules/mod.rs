pub mod conversion;
pub mod media;
pub mod notification;
