// This module prefetches BGZF blocks to parallelize decompression.
use super::block::Block;
use super::util::{fetch_block, inflate_block, RawBlock};
use super::VirtualPosition;
use crate::error::{Error, Result};

use flume::{Receiver, Sender};
use std::cmp::{Ord, Ordering, PartialEq, PartialOrd};
use std::collections::BinaryHeap;
use std::io::{self, BufRead, Read};

#[allow(clippy::upper_case_acronyms)]
enum Status {
    Success(Block),
    Failed(Error),
    EOF,
}

struct Task(usize, Status);

impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        // Smallest go first.
        other.0.cmp(&self.0)
    }
}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for Task {}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// Prefetches and inflates BGZF blocks on a thread pool.
///
/// One thread reads raw members in stream order, the pool inflates them, and
/// an ordering thread hands them out in the original order. At most
/// `thread_num` blocks are in flight. Dropping the `Readahead` stops the
/// reading thread, which then drops the underlying reader.
struct Readahead {
    used_block_sender: Sender<Block>,
    ready_to_processing_rx: Receiver<Status>,
}

impl Readahead {
    fn new(thread_num: usize, mut reader: Box<dyn Read + Send + 'static>) -> Result<Self> {
        // The reading and ordering threads occupy one worker each for their
        // whole lifetime, so at least one more is needed for inflating.
        let thread_num = std::cmp::max(thread_num, 3);
        // Buffers circulate between the consumer and the workers, so their
        // number bounds the memory in flight.
        let (read_bufs_send, read_bufs_recv) = flume::unbounded();
        let (used_block_sender, used_block_receiver) = flume::unbounded();
        let (completed_task_tx, sorting_blocks_rx) = flume::bounded::<Task>(thread_num);
        let (ready_tasks_tx, ready_to_processing_rx) = flume::bounded(thread_num);
        for _ in 0..thread_num {
            let _ = read_bufs_send.send(RawBlock::default());
            let _ = used_block_sender.send(Block::default());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_num)
            .thread_name(|i| format!("bgzf-readahead-{}", i))
            .build()
            .map_err(|e| Error::from(io::Error::new(io::ErrorKind::Other, e)))?;

        // Ordering thread.
        pool.spawn(move || {
            // Blocks are not necessarily inflated in stream order.
            let mut block_heap = BinaryHeap::<Task>::new();
            let mut cur_block_num = 0;
            while let Ok(work_unit) = sorting_blocks_rx.recv() {
                block_heap.push(work_unit);
                while block_heap
                    .peek()
                    .map_or(false, |task| task.0 == cur_block_num)
                {
                    if let Some(Task(_, status)) = block_heap.pop() {
                        if ready_tasks_tx.send(status).is_err() {
                            // Consumer is gone.
                            return;
                        }
                    }
                    cur_block_num += 1;
                }
            }
        });

        // Reading thread. The pool handle is moved in so inflating tasks can
        // be spawned on it.
        let inflate_pool = std::sync::Arc::new(pool);
        let reading_pool = inflate_pool.clone();
        reading_pool.spawn(move || {
            let mut cur_task: usize = 0;
            let mut position = 0u64;
            while let Ok(mut block) = used_block_receiver.recv() {
                let mut raw = match read_bufs_recv.recv() {
                    Ok(raw) => raw,
                    Err(_) => return,
                };
                let status = match fetch_block(&mut reader, position, &mut raw) {
                    Ok(true) => None,
                    Ok(false) => Some(Status::EOF),
                    Err(e) => Some(Status::Failed(e)),
                };
                if let Some(status) = status {
                    let _ = completed_task_tx.send(Task(cur_task, status));
                    return;
                }
                position += raw.size;

                let task_ready_to_sort_tx = completed_task_tx.clone();
                let read_buf_sender = read_bufs_send.clone();
                let task_num = cur_task;
                inflate_pool.spawn(move || {
                    let status = match inflate_block(&raw, &mut block) {
                        Ok(()) => Status::Success(block),
                        Err(e) => Status::Failed(e),
                    };
                    let _ = task_ready_to_sort_tx.send(Task(task_num, status));
                    let _ = read_buf_sender.send(raw);
                });

                cur_task += 1;
            }
            log::debug!("readahead stopped after {} blocks", cur_task);
        });

        Ok(Self {
            used_block_sender,
            ready_to_processing_rx,
        })
    }

    /// Returns `old_buf` to the pool and receives the next block in stream
    /// order. Blocks until a block is ready. `Ok(None)` means end of stream.
    fn get_block(&mut self, old_buf: Block) -> Result<Option<Block>> {
        // The reading thread may already have finished; then the send fails
        // and the buffer is simply dropped.
        let _ = self.used_block_sender.send(old_buf);
        match self.ready_to_processing_rx.recv() {
            Ok(Status::Success(block)) => Ok(Some(block)),
            Ok(Status::Failed(e)) => Err(e),
            Ok(Status::EOF) | Err(_) => Ok(None),
        }
    }
}

/// BGZF reader that inflates blocks ahead of the consumer on a thread pool.
///
/// Presents the same flat stream as [`super::Reader`] but cannot seek.
pub struct MultithreadedReader {
    readahead: Readahead,
    block: Block,
    saw_eof_marker: bool,
    done: bool,
}

impl MultithreadedReader {
    /// Uses one worker per logical CPU.
    pub fn new<R: Read + Send + 'static>(inner: R) -> Result<Self> {
        Self::with_threads(num_cpus::get(), inner)
    }

    pub fn with_threads<R: Read + Send + 'static>(thread_num: usize, inner: R) -> Result<Self> {
        Ok(Self {
            readahead: Readahead::new(thread_num, Box::new(inner))?,
            block: Block::default(),
            saw_eof_marker: false,
            done: false,
        })
    }

    /// Virtual position of the next byte `read` would return.
    pub fn virtual_position(&self) -> VirtualPosition {
        self.block.virtual_position()
    }

    fn next_block(&mut self) -> Result<bool> {
        loop {
            let old = std::mem::take(&mut self.block);
            match self.readahead.get_block(old)? {
                Some(block) if block.is_empty() => {
                    self.saw_eof_marker = true;
                    self.block = block;
                }
                Some(block) => {
                    self.saw_eof_marker = false;
                    self.block = block;
                    return Ok(true);
                }
                None => {
                    if !self.saw_eof_marker {
                        log::warn!("BGZF stream ended without an EOF marker block");
                    }
                    return Ok(false);
                }
            }
        }
    }
}

impl Read for MultithreadedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let src = self.fill_buf()?;
        let amt = src.len().min(buf.len());
        buf[..amt].copy_from_slice(&src[..amt]);
        self.consume(amt);
        Ok(amt)
    }
}

impl BufRead for MultithreadedReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.block.remaining() == 0 && !self.done {
            match self.next_block() {
                Ok(true) => {}
                Ok(false) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Err(e.into_io());
                }
            }
        }
        Ok(self.block.remaining_slice())
    }

    fn consume(&mut self, amt: usize) {
        self.block.consume(amt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgzf::Writer;
    use crate::error::BgzfError;
    use std::io::Write;

    fn compressed(len: usize) -> (Vec<u8>, Vec<u8>) {
        let input: Vec<u8> = (0..len).map(|i| (i % 97) as u8).collect();
        let mut writer = Writer::new(Vec::new());
        for chunk in input.chunks(1000) {
            writer.write_all(chunk).unwrap();
            writer.flush().unwrap();
        }
        (input, writer.finish().unwrap())
    }

    #[test]
    fn preserves_block_order() {
        let (input, data) = compressed(150_000);
        let mut reader = MultithreadedReader::with_threads(4, std::io::Cursor::new(data)).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn reports_truncation() {
        let (_, mut data) = compressed(5_000);
        data.truncate(data.len() - 40);
        let mut reader = MultithreadedReader::with_threads(3, std::io::Cursor::new(data)).unwrap();
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert!(matches!(
            Error::from(err),
            Error::Bgzf(BgzfError::Truncated { .. })
        ));
    }

    #[test]
    fn dropping_early_does_not_hang() {
        let (_, data) = compressed(100_000);
        let mut reader = MultithreadedReader::with_threads(3, std::io::Cursor::new(data)).unwrap();
        let mut buf = [0; 10];
        reader.read_exact(&mut buf).unwrap();
        drop(reader);
    }
}
