use std::io::{self, Read, Write};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

enum Message {
    Data(Vec<u8>),
    /// The writing stage failed. Whatever was sent before is incomplete.
    Abort,
}

/// Creates an unbuffered, blocking, in-memory pipe.
///
/// Every write blocks until the reader has taken the bytes. Dropping the
/// writer closes the pipe: the reader sees end-of-file once it has drained
/// everything. Dropping the reader makes further writes fail with
/// [`io::ErrorKind::BrokenPipe`].
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = sync_channel(0);
    let reader = PipeReader { rx, buf: Vec::new(), pos: 0, state: State::Open };
    (PipeWriter { tx }, reader)
}

pub struct PipeWriter {
    tx: SyncSender<Message>,
}

pub struct PipeReader {
    rx: Receiver<Message>,
    buf: Vec<u8>,
    pos: usize,
    state: State,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum State {
    Open,
    Closed,
    Aborted,
}

impl PipeWriter {
    /// Closes the pipe so that the reader fails with
    /// [`io::ErrorKind::ConnectionAborted`] instead of seeing end-of-file.
    pub fn abort(self) {
        let _ = self.tx.send(Message::Abort);
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        self.tx.send(Message::Data(buf.to_vec()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "downstream stage went away"))?;

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        while self.pos >= self.buf.len() {
            match self.state {
                State::Closed => return Ok(0),
                State::Aborted => return Err(aborted()),
                State::Open => match self.rx.recv() {
                    Ok(Message::Data(data)) => {
                        self.buf = data;
                        self.pos = 0;
                    }
                    Ok(Message::Abort) => self.state = State::Aborted,
                    Err(_) => self.state = State::Closed,
                }
            }
        }

        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn aborted() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "upstream stage failed")
}
