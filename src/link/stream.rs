//! Byte stream link driver

use super::LinkDriver;
use crate::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default read-ahead size
const CHUNK_SIZE: usize = 4096;

/// Link over any async byte stream (TCP, pty, duplex pipe)
///
/// Reads ahead in chunks; whatever the caller's buffer could not take is
/// reported by [`LinkDriver::recv_available`] and handed out by the next
/// [`LinkDriver::recv`] without touching the stream.
#[derive(Debug)]
pub struct StreamLink<T> {
    io: T,
    rx: Vec<u8>,
    rx_pos: usize,
    chunk: usize,
    closed: bool,
}

impl<T> StreamLink<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(io: T) -> Self {
        Self::with_chunk_size(io, CHUNK_SIZE)
    }

    pub fn with_chunk_size(io: T, chunk: usize) -> Self {
        Self {
            io,
            rx: Vec::with_capacity(chunk),
            rx_pos: 0,
            chunk: chunk.max(1),
            closed: false,
        }
    }

    pub fn into_inner(self) -> T {
        self.io
    }

    fn take_buffered(&mut self, buf: &mut [u8]) -> usize {
        let n = (self.rx.len() - self.rx_pos).min(buf.len());
        buf[..n].copy_from_slice(&self.rx[self.rx_pos..self.rx_pos + n]);
        self.rx_pos += n;
        n
    }
}

impl<T> LinkDriver for StreamLink<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::LinkClosed);
        }
        self.io.write_all(frame).await?;
        self.io.flush().await?;
        Ok(())
    }

    fn recv_available(&self) -> usize {
        self.rx.len() - self.rx_pos
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.recv_available() > 0 {
            return Ok(self.take_buffered(buf));
        }
        if self.closed || buf.is_empty() {
            return Ok(0);
        }

        // read_buf only grows rx by what arrived, so a cancelled read
        // leaves nothing behind
        self.rx.clear();
        self.rx_pos = 0;
        self.rx.reserve(self.chunk);
        let n = self.io.read_buf(&mut self.rx).await?;
        if n == 0 {
            self.closed = true;
            return Ok(0);
        }
        Ok(self.take_buffered(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_send_and_recv() {
        let (a, b) = duplex(64);
        let mut left = StreamLink::new(a);
        let mut right = StreamLink::new(b);

        left.send(&[0x7e, 0x01, 0x02, 0x7e]).await.unwrap();
        let mut buf = [0u8; 16];
        let n = right.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x7e, 0x01, 0x02, 0x7e]);
        assert_eq!(right.recv_available(), 0);
    }

    #[tokio::test]
    async fn test_read_ahead_is_buffered() {
        let (a, b) = duplex(64);
        let mut left = StreamLink::new(a);
        let mut right = StreamLink::new(b);

        left.send(&[1, 2, 3, 4, 5, 6]).await.unwrap();
        let mut buf = [0u8; 4];
        let n = right.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3, 4]);
        assert_eq!(right.recv_available(), 2);

        let n = right.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[5, 6]);
        assert_eq!(right.recv_available(), 0);
    }

    #[tokio::test]
    async fn test_eof_is_link_down() {
        let (a, b) = duplex(64);
        let mut right = StreamLink::new(b);
        drop(a);

        let mut buf = [0u8; 4];
        assert_eq!(right.recv(&mut buf).await.unwrap(), 0);
        assert!(matches!(right.send(&[1]).await, Err(Error::LinkClosed)));
    }
}
