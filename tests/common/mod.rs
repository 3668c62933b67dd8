use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use p2000::sink::SinkTarget;
use tokio::io::AsyncWrite;

/// In-memory sink target that accepts `budget` bytes and then fails like a full disk.
#[derive(Debug)]
pub struct FlakyTarget {
    data: Arc<Mutex<Vec<u8>>>,
    budget: usize,
}

impl FlakyTarget {
    /// Returns the target and a handle to the bytes it holds.
    pub fn new(budget: usize) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let data = Arc::new(Mutex::new(Vec::new()));
        let target = Self {
            data: data.clone(),
            budget,
        };
        (target, data)
    }
}

pub fn contents(data: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(data.lock().unwrap().clone()).unwrap()
}

impl AsyncWrite for FlakyTarget {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.budget == 0 {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "no space left")));
        }
        // Short writes, so a page can land half on "disk" before the failure.
        let n = buf.len().min(self.budget).min(16);
        self.data.lock().unwrap().extend_from_slice(&buf[..n]);
        self.budget -= n;
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl SinkTarget for FlakyTarget {
    async fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn rollback_to(&mut self, len: u64) -> io::Result<()> {
        self.data.lock().unwrap().truncate(len as usize);
        Ok(())
    }
}
