//! Incremental Server-Sent-Events frame assembly.

/// One complete SSE message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if the provider sent one.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

/// Assembles [`SseFrame`]s from arbitrarily split byte chunks.
///
/// Bytes are buffered until a full line is available and lines are collected until
/// the blank line that terminates a frame, so a frame is only produced once it is
/// complete no matter where the transport split the body. Lines end in `\n`,
/// `\r\n` or a bare `\r`. Comment lines (`:` keep alives), `id:` and `retry:`
/// fields are dropped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Unterminated tail of the last chunk.
    buffer: Vec<u8>,
    /// The last chunk ended in `\r`; a leading `\n` in the next one belongs to it.
    skip_lf: bool,
    event: Option<String>,
    data_lines: Vec<Vec<u8>>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every frame completed by it, in order.
    pub fn feed(&mut self, mut chunk: &[u8]) -> Vec<SseFrame> {
        if self.skip_lf && !chunk.is_empty() {
            self.skip_lf = false;
            if chunk[0] == b'\n' {
                chunk = &chunk[1..];
            }
        }
        // the buffered tail holds no line terminator, so scanning resumes after it
        let mut scan = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[scan..]
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r')
        {
            let end = scan + offset;
            let line = self.buffer[start..end].to_vec();
            start = end + 1;
            if self.buffer[end] == b'\r' {
                match self.buffer.get(start) {
                    Some(&b'\n') => start += 1,
                    Some(_) => {}
                    None => self.skip_lf = true,
                }
            }
            scan = start;
            if line.is_empty() {
                frames.extend(self.flush_frame());
            } else {
                self.handle_line(line);
            }
        }
        self.buffer.drain(..start);
        frames
    }

    /// Flushes whatever is left once the body ended.
    ///
    /// A trailing line without a newline and an unterminated frame are still
    /// delivered: several providers close the connection right after the last
    /// `data:` line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        self.skip_lf = false;
        let line = std::mem::take(&mut self.buffer);
        if !line.is_empty() {
            self.handle_line(line);
        }
        self.flush_frame()
    }

    fn handle_line(&mut self, line: Vec<u8>) {
        if line.first() == Some(&b':') {
            return;
        }
        let (field, value) = match line.iter().position(|b| *b == b':') {
            Some(pos) => {
                let mut value = &line[pos + 1..];
                if value.first() == Some(&b' ') {
                    value = &value[1..];
                }
                (&line[..pos], value.to_vec())
            }
            None => (&line[..], Vec::new()),
        };
        match field {
            b"data" => self.data_lines.push(value),
            b"event" => self.event = Some(String::from_utf8_lossy(&value).into_owned()),
            _ => {}
        }
    }

    fn flush_frame(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data_lines.is_empty() {
            return None;
        }
        let mut joined = Vec::new();
        for (idx, mut segment) in self.data_lines.drain(..).enumerate() {
            if idx > 0 {
                joined.push(b'\n');
            }
            joined.append(&mut segment);
        }
        Some(SseFrame {
            event,
            data: String::from_utf8_lossy(&joined).into_owned(),
        })
    }
}
