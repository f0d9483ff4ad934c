use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("option buffer full: {needed} bytes needed, {available} available")]
    BufferFull { needed: usize, available: usize },

    #[error("link closed")]
    LinkClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
