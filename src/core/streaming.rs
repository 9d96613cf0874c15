//! UTF-8 safe incremental decoding for token-by-token output.
//!
//! A byte-level token can end in the middle of a multi-byte character, so
//! decoding ids one at a time with [`Decoder::decode`] would produce U+FFFD
//! at every split. [`StreamingDecoder`] holds back an incomplete tail until
//! the bytes that complete it arrive.

use super::decoder::Decoder;
use super::vocab::TokenId;

/// Stateful decoder that only emits complete UTF-8.
///
/// Unknown ids and special tokens follow the wrapped [`Decoder`]'s options.
/// Bytes that can never become valid UTF-8 are emitted as U+FFFD right away;
/// only a possibly-incomplete tail is buffered.
///
/// ```ignore
/// let mut stream = tokenizer.streaming_decoder();
/// for id in ids {
///     if let Some(text) = stream.add_token(id) {
///         print!("{text}");
///     }
/// }
/// print!("{}", stream.flush());
/// ```
#[derive(Debug, Clone)]
pub struct StreamingDecoder {
    decoder: Decoder,
    buffer: Vec<u8>,
}

impl StreamingDecoder {
    pub fn new(decoder: Decoder) -> Self {
        Self {
            decoder,
            buffer: Vec::with_capacity(16),
        }
    }

    /// Add one token; returns whatever text is now complete.
    pub fn add_token(&mut self, id: TokenId) -> Option<String> {
        self.decoder.append_id(id, &mut self.buffer);
        self.take_complete()
    }

    pub fn add_tokens(&mut self, ids: &[TokenId]) -> Option<String> {
        for &id in ids {
            self.decoder.append_id(id, &mut self.buffer);
        }
        self.take_complete()
    }

    /// Emit everything buffered, replacing an incomplete tail with U+FFFD.
    pub fn flush(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        text
    }

    /// Discard buffered bytes.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn take_complete(&mut self) -> Option<String> {
        let mut text = String::new();
        let mut consumed = 0;

        loop {
            let rest = &self.buffer[consumed..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    consumed = self.buffer.len();
                    break;
                }
                Err(e) => {
                    let (valid, _) = rest.split_at(e.valid_up_to());
                    if let Ok(valid) = std::str::from_utf8(valid) {
                        text.push_str(valid);
                    }
                    match e.error_len() {
                        // Invalid sequence: it will never complete.
                        Some(bad) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            consumed += e.valid_up_to() + bad;
                        }
                        // Truncated sequence at the end: wait for more bytes.
                        None => {
                            consumed += e.valid_up_to();
                            break;
                        }
                    }
                }
            }
        }

        self.buffer.drain(..consumed);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}
