use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc};

use crate::asn1::{Asn1Error, Asn1Result, Encoder, Reader, Tlv, tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeKind {
    UtcTime,
    GeneralizedTime,
}

/// A UTCTime or GeneralizedTime value, normalised to UTC.
///
/// The original text is kept so the value re-encodes to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asn1Time {
    kind: TimeKind,
    text: String,
    at: DateTime<Utc>,
}

impl Asn1Time {
    /// DER time for `at`: UTCTime for years 1950 to 2049, GeneralizedTime otherwise.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let at = at.with_nanosecond(0).unwrap_or(at);
        let (kind, text) = if (1950..2050).contains(&at.year()) {
            (TimeKind::UtcTime, at.format("%y%m%d%H%M%SZ").to_string())
        } else {
            (
                TimeKind::GeneralizedTime,
                at.format("%Y%m%d%H%M%SZ").to_string(),
            )
        };
        Self { kind, text, at }
    }

    pub fn decode(tlv: &Tlv<'_>, field: &'static str) -> Asn1Result<Self> {
        let kind = match tlv.tag {
            tag::UTC_TIME => TimeKind::UtcTime,
            tag::GENERALIZED_TIME => TimeKind::GeneralizedTime,
            other => {
                return Err(Asn1Error::malformed(
                    field,
                    format!("Expected UTCTime or GeneralizedTime, found 0x{other:02X}"),
                ));
            }
        };
        if !tlv.value.is_ascii() {
            return Err(Asn1Error::malformed(field, "Time is not ASCII"));
        }
        let text = String::from_utf8_lossy(tlv.value).into_owned();
        let at = parse_time(kind, &text)
            .ok_or_else(|| Asn1Error::malformed(field, format!("Invalid time '{text}'")))?;
        Ok(Self { kind, text, at })
    }

    pub(crate) fn read(reader: &mut Reader<'_>, field: &'static str) -> Asn1Result<Self> {
        let tlv = reader.read_any(field)?;
        Self::decode(&tlv, field)
    }

    /// True when the next element of `reader` is a time value
    pub(crate) fn is_next(reader: &Reader<'_>) -> bool {
        matches!(
            reader.peek_tag(),
            Some(tag::UTC_TIME | tag::GENERALIZED_TIME)
        )
    }

    pub fn encode(&self, enc: &mut Encoder) {
        let time_tag = match self.kind {
            TimeKind::UtcTime => tag::UTC_TIME,
            TimeKind::GeneralizedTime => tag::GENERALIZED_TIME,
        };
        enc.tlv(time_tag, self.text.as_bytes());
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    pub fn kind(&self) -> TimeKind {
        self.kind
    }

    pub fn as_text(&self) -> &str {
        &self.text
    }
}

impl From<DateTime<Utc>> for Asn1Time {
    fn from(at: DateTime<Utc>) -> Self {
        Self::from_datetime(at)
    }
}

/// Certificate validity window, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validity {
    pub not_before: Asn1Time,
    pub not_after: Asn1Time,
}

impl Validity {
    pub fn new(not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        Self {
            not_before: not_before.into(),
            not_after: not_after.into(),
        }
    }

    pub(crate) fn read(reader: &mut Reader<'_>, field: &'static str) -> Asn1Result<Self> {
        let mut seq = reader.sequence(field)?;
        let not_before = Asn1Time::read(&mut seq, field)?;
        let not_after = Asn1Time::read(&mut seq, field)?;
        seq.finish()?;
        Ok(Self {
            not_before,
            not_after,
        })
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.constructed(tag::SEQUENCE, |seq| {
            self.not_before.encode(seq);
            self.not_after.encode(seq);
        });
    }

    /// `not_before <= date <= not_after`
    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        self.not_before.at <= date && date <= self.not_after.at
    }
}

fn parse_time(kind: TimeKind, text: &str) -> Option<DateTime<Utc>> {
    let (body, offset_secs) = split_zone(text, kind)?;

    let (date_part, fraction) = match body.split_once(['.', ',']) {
        Some((date_part, fraction)) if kind == TimeKind::GeneralizedTime => {
            (date_part, Some(fraction))
        }
        Some(_) => return None,
        None => (body, None),
    };
    if !date_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (year, rest) = match kind {
        TimeKind::UtcTime => {
            let yy: i32 = date_part.get(..2)?.parse().ok()?;
            (if yy < 50 { 2000 + yy } else { 1900 + yy }, &date_part[2..])
        }
        TimeKind::GeneralizedTime => (date_part.get(..4)?.parse().ok()?, &date_part[4..]),
    };

    let field = |range: std::ops::Range<usize>| -> Option<u32> { rest.get(range)?.parse().ok() };
    let (month, day, hour) = (field(0..2)?, field(2..4)?, field(4..6)?);
    let (minute, second) = match (kind, rest.len()) {
        (TimeKind::UtcTime, 8) => (field(6..8)?, 0),
        (TimeKind::UtcTime, 10) => (field(6..8)?, field(8..10)?),
        (TimeKind::GeneralizedTime, 6) => (0, 0),
        (TimeKind::GeneralizedTime, 8) => (field(6..8)?, 0),
        (TimeKind::GeneralizedTime, 10) => (field(6..8)?, field(8..10)?),
        _ => return None,
    };

    let nanos = match fraction {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            let padded = format!("{:0<9}", &digits[..digits.len().min(9)]);
            padded.parse().ok()?
        }
        Some(_) => return None,
        None => 0,
    };

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_nano_opt(
        hour, minute, second, nanos,
    )?;
    let offset = FixedOffset::east_opt(offset_secs)?;
    let local = naive.and_local_timezone(offset).single()?;
    Some(local.with_timezone(&Utc))
}

// Strip the time zone designator. GeneralizedTime without one is read as UTC.
fn split_zone(text: &str, kind: TimeKind) -> Option<(&str, i32)> {
    if let Some(body) = text.strip_suffix('Z') {
        return Some((body, 0));
    }
    if text.len() > 5 {
        let (body, zone) = text.split_at(text.len() - 5);
        let sign = match zone.as_bytes()[0] {
            b'+' => 1,
            b'-' => -1,
            _ => return no_zone(text, kind),
        };
        let hours: i32 = zone.get(1..3)?.parse().ok()?;
        let minutes: i32 = zone.get(3..5)?.parse().ok()?;
        return Some((body, sign * (hours * 3600 + minutes * 60)));
    }
    no_zone(text, kind)
}

fn no_zone(text: &str, kind: TimeKind) -> Option<(&str, i32)> {
    match kind {
        TimeKind::GeneralizedTime => Some((text, 0)),
        TimeKind::UtcTime => None,
    }
}
