use crate::capture::Record;

/// A single pass over the records of a capture.
pub trait Analyzer {
    fn process(&mut self, record: &Record);
    fn finish(&mut self);

    /// Feeds every record in order, then finishes.
    fn process_all(&mut self, records: &[Record]) {
        for record in records {
            self.process(record);
        }
        self.finish();
    }
}
