/// Query progress counters streamed by the server between data blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Progress {
    pub rows: u64,
    pub bytes: u64,
    pub total_rows: u64,
}

impl Progress {
    pub fn accumulate(&mut self, other: &Progress) {
        self.rows += other.rows;
        self.bytes += other.bytes;
        self.total_rows = self.total_rows.max(other.total_rows);
    }
}
