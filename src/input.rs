//! Line reader feeding the session from a background thread

use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{self, BufRead};
use std::thread;

/// One step of local input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// A line (or a capacity-sized piece of one), newline kept if present
    Line(String),
    /// Input was closed
    Eof,
    /// Reading failed for a reason other than end of input
    Failed(io::ErrorKind),
}

/// Read `reader` line by line on a new thread
///
/// Lines longer than `max_len` bytes are split into several events, the way
/// `fgets` with a fixed buffer would return them. Bytes that are not UTF-8
/// are carried as U+FFFD rather than ending the input.
pub fn spawn_reader<R>(reader: R, max_len: usize) -> std::io::Result<Receiver<InputEvent>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = bounded(1);
    thread::Builder::new()
        .name("chat-input".into())
        .spawn(move || read_lines(reader, max_len, tx))?;
    Ok(rx)
}

fn read_lines<R: BufRead>(mut reader: R, max_len: usize, tx: Sender<InputEvent>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                for piece in split_line(&line, max_len) {
                    if tx.send(InputEvent::Line(piece.to_string())).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::error!("failed to read input: {}", e);
                let _ = tx.send(InputEvent::Failed(e.kind()));
                return;
            }
        }
    }
    let _ = tx.send(InputEvent::Eof);
}

fn split_line(line: &str, max_len: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = line;
    while rest.len() > max_len {
        let mut end = max_len;
        while end > 0 && !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // max_len is narrower than one char; take the char whole
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        pieces.push(&rest[..end]);
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces
}
