//! Channel abstraction for message I/O.

pub mod channel;
pub mod cli;
pub mod render;
pub mod telegram;

pub use channel::*;
pub use cli::CliChannel;
pub use render::render;
pub use telegram::TelegramChannel;
