//! Streaming feed parser.
//!
//! Turns the raw bytes of the app feed into an ordered list of [`AppRecord`]s in a single
//! pass over the reader's events. Only four child elements of `entry` are looked at:
//!
//! | element     | record field  |
//! |-------------|---------------|
//! | `id`        | `detail_url`  |
//! | `im:name`   | `name`        |
//! | `im:image`  | `icon_url`    |
//! | `im:artist` | `artist`      |
//!
//! Everything else is skipped. Text is trimmed of surrounding whitespace and newlines.

use crate::error::ParseError;
use crate::types::AppRecord;
use quick_xml::Reader;
use quick_xml::events::Event;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const ENTRY: &[u8] = b"entry";

/// Child elements of `entry` that carry record data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Id,
    Name,
    Image,
    Artist,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"id" => Some(Field::Id),
            b"im:name" => Some(Field::Name),
            b"im:image" => Some(Field::Image),
            b"im:artist" => Some(Field::Artist),
            _ => None,
        }
    }

    fn assign(self, record: &mut AppRecord, value: String) {
        match self {
            Field::Id => record.detail_url = Some(value),
            Field::Name => record.name = Some(value),
            Field::Image => record.icon_url = Some(value),
            Field::Artist => record.artist = Some(value),
        }
    }
}

/// How a parse run ended without error
#[derive(Debug, PartialEq)]
pub enum ParseOutcome {
    /// Every record in document order
    Completed(Vec<AppRecord>),
    /// Cancelled before the end of the document; nothing is exposed
    Cancelled,
}

/// Single-use streaming parser
#[derive(Debug, Default)]
pub struct FeedParser {
    records: Vec<AppRecord>,
    current: Option<AppRecord>,
    accumulating: bool,
    text: String,
    depth: usize,
    saw_root: bool,
}

impl FeedParser {
    /// Create a parser with empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a complete feed document
    ///
    /// The cancellation token is checked before every reader event. Malformed XML stops
    /// the run at the first error and no records are returned.
    pub fn parse(
        mut self,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> Result<ParseOutcome, ParseError> {
        let mut reader = Reader::from_reader(data);
        let mut buf = Vec::with_capacity(4096);

        loop {
            if cancel.is_cancelled() {
                return Ok(ParseOutcome::Cancelled);
            }

            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    self.depth += 1;
                    self.saw_root = true;
                    self.start_element(e.name().as_ref());
                }
                Ok(Event::Empty(ref e)) => {
                    self.saw_root = true;
                    let name = e.name();
                    self.start_element(name.as_ref());
                    self.end_element(name.as_ref());
                }
                Ok(Event::End(ref e)) => {
                    self.depth = self.depth.saturating_sub(1);
                    self.end_element(e.name().as_ref());
                }
                Ok(Event::Text(ref e)) => {
                    if self.accumulating {
                        let text = e.unescape().map_err(|err| {
                            ParseError::new(err.to_string(), reader.buffer_position() as u64)
                        })?;
                        self.text.push_str(&text);
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if self.accumulating {
                        self.text.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(ParseError::new(
                        e.to_string(),
                        reader.buffer_position() as u64,
                    ));
                }
            }
            buf.clear();
        }

        let position = reader.buffer_position() as u64;
        if !self.saw_root {
            return Err(ParseError::new("document has no root element", position));
        }
        if self.depth > 0 {
            return Err(ParseError::new(
                format!(
                    "unexpected end of document with {} unclosed element(s)",
                    self.depth
                ),
                position,
            ));
        }

        Ok(ParseOutcome::Completed(self.records))
    }

    fn start_element(&mut self, name: &[u8]) {
        if name == ENTRY {
            self.current = Some(AppRecord::default());
        }

        self.accumulating = Field::from_name(name).is_some();
        if self.accumulating {
            self.text.clear();
        }
    }

    fn end_element(&mut self, name: &[u8]) {
        let Some(current) = self.current.as_mut() else {
            return;
        };

        if let Some(field) = Field::from_name(name) {
            field.assign(current, self.text.trim().to_string());
            self.text.clear();
            self.accumulating = false;
        } else if name == ENTRY
            && let Some(record) = self.current.take()
        {
            self.records.push(record);
        }
    }
}

/// Background parse of one feed document
///
/// Runs on the blocking pool and reports exactly one terminal result (records or a parse
/// error) through a oneshot channel. A cancelled run reports nothing.
pub struct ParseOperation {
    cancel: CancellationToken,
    result: oneshot::Receiver<Result<Vec<AppRecord>, ParseError>>,
}

impl ParseOperation {
    /// Start parsing `data` in the background
    pub fn spawn(data: Vec<u8>) -> Self {
        Self::spawn_with_token(data, CancellationToken::new())
    }

    /// Start parsing `data`, stopping early when `cancel` fires
    pub fn spawn_with_token(data: Vec<u8>, cancel: CancellationToken) -> Self {
        let (tx, rx) = oneshot::channel();
        let token = cancel.clone();

        tokio::task::spawn_blocking(move || {
            let outcome = FeedParser::new().parse(&data, &token);
            if let Some(result) = settle(outcome, &token) {
                tx.send(result).ok();
            }
        });

        Self { cancel, result: rx }
    }

    /// Request cooperative cancellation
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this operation
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the terminal result
    ///
    /// Returns `None` if the operation was cancelled.
    pub async fn finished(self) -> Option<Result<Vec<AppRecord>, ParseError>> {
        self.result.await.ok()
    }
}

/// Terminal message for a finished parse run, or `None` once cancelled
///
/// Cancellation wins over both records and errors, even when it lands after the parser's
/// last check.
fn settle(
    outcome: Result<ParseOutcome, ParseError>,
    token: &CancellationToken,
) -> Option<Result<Vec<AppRecord>, ParseError>> {
    if token.is_cancelled() {
        debug!("Feed parse cancelled, discarding result");
        return None;
    }
    match outcome {
        Ok(ParseOutcome::Completed(records)) => {
            info!(records = records.len(), "Feed parsed");
            Some(Ok(records))
        }
        Ok(ParseOutcome::Cancelled) => None,
        Err(e) => {
            warn!(error = %e, "Feed parse failed");
            Some(Err(e))
        }
    }
}
