//! Streaming rewriters applied to rendered output before it's published.
//!
//! A [`Chain`] runs each of its stages on its own scoped thread, connected
//! back to back by rendezvous [`pipe`]s. A stage that fails aborts its output
//! pipe, which fails the next stage's reads, and so on down the chain. A
//! stage whose output goes away sees a broken pipe. Either way every worker
//! finishes, and [`Chain::stream()`] reports the first failure that isn't
//! merely a neighbour disconnecting.

mod pipe;
mod markup;
mod absurl;
mod nav;

use std::io::{self, Read, Write};

use crate::error::{Error, ErrorKind, Result};

pub use pipe::{pipe, PipeReader, PipeWriter};
pub use absurl::AbsUrl;
pub use nav::NavActive;

/// Consumes a byte stream and produces a rewritten byte stream.
pub trait Transformer: Send + Sync {
    fn apply(&self, input: &mut (dyn Read + Send), output: &mut (dyn Write + Send)) -> Result<()>;
}

/// An ordered composition of [`Transformer`]s.
#[derive(Default)]
pub struct Chain {
    stages: Vec<Box<dyn Transformer>>,
}

impl Chain {
    pub fn new() -> Self {
        Chain { stages: vec![] }
    }

    pub fn stage<T: Transformer + 'static>(mut self, stage: T) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs `produce` into the head of the chain and `consume` on the tail.
    ///
    /// `produce` and every stage run on scoped threads. `consume` runs on
    /// the calling thread. Returns once all of them have finished.
    pub fn stream<P, C>(&self, produce: P, consume: C) -> Result<()>
        where P: FnOnce(&mut PipeWriter) -> Result<()> + Send,
              C: FnOnce(&mut PipeReader) -> Result<()>,
    {
        std::thread::scope(|scope| {
            let (writer, mut reader) = pipe();
            let mut workers = Vec::with_capacity(self.stages.len() + 1);
            workers.push(scope.spawn(move || run_stage(writer, produce)));

            for stage in &self.stages {
                let (writer, next) = pipe();
                let mut input = std::mem::replace(&mut reader, next);
                workers.push(scope.spawn(move || {
                    run_stage(writer, |output| stage.apply(&mut input, output))
                }));
            }

            let consumed = consume(&mut reader);
            drop(reader);

            let mut results: Vec<Result<()>> = workers.into_iter()
                .map(|worker| worker.join().unwrap_or_else(|_| {
                    Err(error!("transform stage panicked").with_kind(ErrorKind::Transform))
                }))
                .collect();

            results.push(consumed);
            Error::first_cause(results)
        })
    }
}

/// Runs one stage and closes its output exactly once: normally on success,
/// by aborting on failure.
fn run_stage<F>(mut output: PipeWriter, stage: F) -> Result<()>
    where F: FnOnce(&mut PipeWriter) -> Result<()>
{
    let result = stage(&mut output);
    match result {
        Ok(()) => drop(output),
        Err(_) => output.abort(),
    }

    result
}

impl Transformer for Chain {
    fn apply(&self, input: &mut (dyn Read + Send), output: &mut (dyn Write + Send)) -> Result<()> {
        self.stream(
            |head| copy(input, head),
            |tail| copy(tail, output),
        )
    }
}

pub(crate) fn copy<R, W>(input: &mut R, output: &mut W) -> Result<()>
    where R: Read + ?Sized, W: Write + ?Sized
{
    io::copy(input, output)?;
    output.flush()?;
    Ok(())
}
