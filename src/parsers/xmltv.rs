use chrono::{FixedOffset, NaiveDateTime, TimeZone, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::BufRead;
use std::sync::Arc;
use tracing::trace;

use super::{EpgParser, EventStream, ParseStep};
use crate::channels::ChannelMap;
use crate::errors::{ImportError, ImportResult};
use crate::models::{EventData, ProgramEvent};
use crate::utils::xml_text::{decode_text, resolve_reference};

/// Generic XMLTV parser
///
/// Streams `<programme>` elements one at a time; the document is never
/// held in memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmltvParser;

impl XmltvParser {
    pub fn new() -> Self {
        Self
    }
}

impl EpgParser for XmltvParser {
    fn iterator(
        &self,
        input: Box<dyn BufRead + Send>,
        channels: Arc<ChannelMap>,
    ) -> ImportResult<EventStream> {
        Ok(Box::new(XmltvEvents {
            reader: Reader::from_reader(input),
            buf: Vec::new(),
            channels,
            finished: false,
        }))
    }
}

/// Child elements of `<programme>` that feed the event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    SubTitle,
    Desc,
    Category,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"title" => Some(Self::Title),
            b"sub-title" => Some(Self::SubTitle),
            b"desc" => Some(Self::Desc),
            b"category" => Some(Self::Category),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Programme {
    channel: String,
    start: String,
    stop: String,
    title: Option<String>,
    subtitle: Option<String>,
    desc: Option<String>,
    category: Option<String>,
}

impl Programme {
    fn from_element(element: &BytesStart<'_>) -> Result<Self, String> {
        let mut programme = Self::default();
        for attr in element.attributes() {
            let attr = attr.map_err(|e| format!("bad attribute: {e}"))?;
            let value = decode_text(&attr.value)?;
            match attr.key.as_ref() {
                b"channel" => programme.channel = value,
                b"start" => programme.start = value,
                b"stop" => programme.stop = value,
                _ => {}
            }
        }
        Ok(programme)
    }

    /// First occurrence wins for repeated children
    fn set(&mut self, field: Field, text: String) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::SubTitle => &mut self.subtitle,
            Field::Desc => &mut self.desc,
            Field::Category => &mut self.category,
        };
        if slot.is_none() {
            *slot = Some(text);
        }
    }

    fn into_step(self, channels: &ChannelMap) -> ParseStep {
        let Some(services) = channels.services(&self.channel) else {
            trace!("Skipping programme for unmapped channel '{}'", self.channel);
            return ParseStep::Pending;
        };

        let (Some(start), Some(stop)) = (parse_xmltv_time(&self.start), parse_xmltv_time(&self.stop))
        else {
            trace!(
                "Skipping programme on '{}' with bad times '{}' - '{}'",
                self.channel, self.start, self.stop
            );
            return ParseStep::Pending;
        };
        if stop <= start {
            return ParseStep::Pending;
        }

        ParseStep::Event(ProgramEvent::new(
            services.to_vec(),
            EventData {
                start,
                duration: stop - start,
                title: self.title.unwrap_or_default(),
                subtitle: self.subtitle.unwrap_or_default(),
                long_description: self.desc.unwrap_or_default(),
                genre: self.category,
            },
        ))
    }
}

struct XmltvEvents {
    reader: Reader<Box<dyn BufRead + Send>>,
    buf: Vec<u8>,
    channels: Arc<ChannelMap>,
    finished: bool,
}

impl XmltvEvents {
    fn parse_error(&self, err: impl std::fmt::Display) -> ImportError {
        ImportError::parse(
            "xmltv",
            format!("at position {}: {}", self.reader.buffer_position(), err),
        )
    }

    /// Read until the next `<programme>` has been consumed, `None` at EOF
    fn next_programme(&mut self) -> ImportResult<Option<Programme>> {
        let mut current: Option<Programme> = None;
        let mut field: Option<Field> = None;
        let mut text = String::new();

        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_event_into(&mut self.buf)
                .map(|event| event.into_owned());
            let event = match read {
                Ok(event) => event,
                Err(e) => return Err(self.parse_error(e)),
            };

            match event {
                Event::Start(e) if e.name().as_ref() == b"programme" => {
                    current = Some(Programme::from_element(&e).map_err(|m| self.parse_error(m))?);
                }
                Event::Empty(e) if e.name().as_ref() == b"programme" => {
                    return Programme::from_element(&e)
                        .map(Some)
                        .map_err(|m| self.parse_error(m));
                }
                Event::Start(e) if current.is_some() => {
                    field = Field::from_tag(e.name().as_ref());
                    text.clear();
                }
                Event::Text(e) if field.is_some() => {
                    text.push_str(&decode_text(&e).map_err(|m| self.parse_error(m))?);
                }
                Event::CData(e) if field.is_some() => {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
                Event::GeneralRef(e) if field.is_some() => {
                    text.push_str(&resolve_reference(&e));
                }
                Event::End(e) if e.name().as_ref() == b"programme" => {
                    if current.is_some() {
                        return Ok(current);
                    }
                }
                Event::End(_) => {
                    if let (Some(programme), Some(done)) = (current.as_mut(), field.take()) {
                        programme.set(done, text.trim().to_string());
                    }
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

impl Iterator for XmltvEvents {
    type Item = ImportResult<ParseStep>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_programme() {
            Ok(Some(programme)) => Some(Ok(programme.into_step(&self.channels))),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Parse an XMLTV timestamp (`20240101193000 +0100`) into unix seconds
///
/// Timestamps without an offset are UTC; seconds may be omitted.
pub fn parse_xmltv_time(value: &str) -> Option<i64> {
    let value = value.trim();
    let digits_end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, rest) = value.split_at(digits_end);

    let naive = match digits.len() {
        14 => NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S").ok()?,
        12 => NaiveDateTime::parse_from_str(&format!("{digits}00"), "%Y%m%d%H%M%S").ok()?,
        _ => return None,
    };

    let offset = match rest.trim() {
        "" => FixedOffset::east_opt(0)?,
        zone => parse_offset(zone)?,
    };

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc).timestamp())
}

/// `+hhmm`, `-hh:mm` or `Z`
fn parse_offset(zone: &str) -> Option<FixedOffset> {
    if zone.eq_ignore_ascii_case("z") || zone.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let sign = match zone.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits: String = zone[1..].chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
