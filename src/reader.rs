//! Line assembly from a byte stream that may stop mid-line.

use crate::error::Result;
use crate::output::{LineSink, TailEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Reads until the source is drained, emitting every complete line.
///
/// `fragment` holds bytes read on a previous pass that have not yet seen a
/// newline. It prefixes the first completed line and is then cleared; an
/// unterminated tail at the end of this pass becomes the new fragment.
/// Reaching the end of currently available data is reported as
/// [`TailEvent::EndOfCurrentData`], not as an error.
///
/// Returns the number of lines emitted.
pub(crate) async fn drain_lines<R>(
    reader: &mut R,
    fragment: &mut Vec<u8>,
    sink: &LineSink,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut emitted = 0;
    let mut chunk = Vec::new();

    loop {
        chunk.clear();
        let bytes_read = match reader.read_until(b'\n', &mut chunk).await {
            Ok(bytes_read) => bytes_read,
            Err(err) => {
                // Bytes consumed before the failure still belong to the fragment
                fragment.extend_from_slice(&chunk);
                return Err(err.into());
            }
        };
        if bytes_read == 0 {
            sink.send_event(TailEvent::EndOfCurrentData).await?;
            return Ok(emitted);
        }

        fragment.extend_from_slice(&chunk);
        if let Some(complete) = take_complete_line(fragment) {
            sink.send_line(decode_line(complete)).await?;
            emitted += 1;
        }
    }
}

/// Splits off a newline-terminated line, leaving `fragment` empty.
fn take_complete_line(fragment: &mut Vec<u8>) -> Option<Vec<u8>> {
    if fragment.last() != Some(&b'\n') {
        return None;
    }
    let mut line = std::mem::take(fragment);
    line.pop();
    Some(line)
}

/// Turns raw line bytes into a `String`, replacing invalid UTF-8.
pub(crate) fn decode_line(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}
