//! Operator input.
//!
//! Reading stdin blocks a thread until a line or end of input arrives, and
//! that read cannot be cancelled. [`OperatorInput`] does the read on its own
//! detached thread, so an interrupt can end the session and the process can
//! exit while a read is still pending.

use std::io::{self, BufRead, BufReader, Read};
use std::thread;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::mpsc;
use tracing::debug;

/// Lines buffered between the reader thread and the controller.
const LINE_BUFFER: usize = 16;

/// A source of operator input lines.
#[async_trait]
pub trait LineSource: Send {
    /// Next line without its terminator, or `None` at end of input.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

#[async_trait]
impl<R> LineSource for Lines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Lines::next_line(self).await
    }
}

/// Lines read from a blocking reader on a dedicated thread.
#[derive(Debug)]
pub struct OperatorInput {
    lines: mpsc::Receiver<io::Result<String>>,
}

impl OperatorInput {
    /// Read the process's standard input.
    pub fn stdin() -> io::Result<Self> {
        Self::spawn(io::stdin())
    }

    /// Read `reader` line by line on a new thread.
    ///
    /// The thread is never joined. It stops at end of input, after a read
    /// error, or once this value is dropped and the next line arrives.
    pub fn spawn<R>(reader: R) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        let _ = thread::Builder::new()
            .name("operator-input".into())
            .spawn(move || forward_lines(BufReader::new(reader), &tx))?;
        Ok(Self { lines: rx })
    }
}

impl From<mpsc::Receiver<io::Result<String>>> for OperatorInput {
    fn from(lines: mpsc::Receiver<io::Result<String>>) -> Self {
        Self { lines }
    }
}

#[async_trait]
impl LineSource for OperatorInput {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.recv().await.transpose()
    }
}

fn forward_lines<R: BufRead>(reader: R, tx: &mpsc::Sender<io::Result<String>>) {
    for line in reader.lines() {
        let failed = line.is_err();
        if tx.blocking_send(line).is_err() {
            debug!("input receiver dropped, reader thread exiting");
            return;
        }
        if failed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::mpsc as std_mpsc;
    use std::time::{Duration, Instant};

    use super::*;

    /// Blocks every read until its sender is dropped.
    struct Stalled(std_mpsc::Receiver<()>);

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[tokio::test]
    async fn lines_arrive_in_order_then_end() {
        let mut input = OperatorInput::spawn(Cursor::new(b"status\r\nquit\n".to_vec())).unwrap();
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("status"));
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("quit"));
        assert_eq!(input.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn dropped_sender_is_end_of_input() {
        let (tx, rx) = mpsc::channel(1);
        let mut input = OperatorInput::from(rx);
        tx.send(Ok("hello".to_string())).await.unwrap();
        drop(tx);
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(input.next_line().await.unwrap(), None);
    }

    #[test]
    fn pending_read_does_not_hold_the_runtime() {
        let (release, stalled) = std_mpsc::channel::<()>();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let mut input = OperatorInput::spawn(Stalled(stalled)).unwrap();
            let waited = tokio::time::timeout(Duration::from_millis(50), input.next_line()).await;
            assert!(waited.is_err());
        });

        let started = Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(release);
    }
}
