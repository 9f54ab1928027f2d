use std::io::Read;

use super::record::Record;
use super::Reader;
use crate::error::Result;

/// An iterator over records of a BAM reader.
///
/// This is created by calling [`Reader::records`]. It stops for good after
/// the first error.
pub struct Records<'a, R> {
    reader: &'a mut Reader<R>,
    record: Record,
    done: bool,
}

impl<'a, R: Read> Records<'a, R> {
    pub(crate) fn new(reader: &'a mut Reader<R>) -> Records<'a, R> {
        Self {
            reader,
            record: Record::default(),
            done: false,
        }
    }

    /// Like `next` but lends the internal record instead of cloning it.
    pub fn next_rec(&mut self) -> Option<Result<&Record>> {
        if self.done {
            return None;
        }
        match self.reader.read_record(&mut self.record) {
            Ok(true) => Some(Ok(&self.record)),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<'a, R: Read> Iterator for Records<'a, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut record = Record::default();
        match self.reader.read_record(&mut record) {
            Ok(true) => Some(Ok(record)),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
