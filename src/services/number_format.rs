//! Шаблоны номеров документов: `INV-{{SEQUENCE:6}}`, `{{SERIES}}{{DELIMITER}}{{DATE_FORMAT:Y}}{{DELIMITER}}{{SEQUENCE:4}}` и т.п.
//!
//! Шаблон разбирается один раз в [`NumberFormat`]; из него же строится
//! регулярка для обратного разбора номера в порядковый номер.

use chrono::DateTime;
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;

use crate::database::types::DocumentType;
use crate::errors::AppError;
use crate::services::lifecycle::RELEASE_TAG;

const DEFAULT_WIDTH: usize = 6;
const MAX_WIDTH: usize = 20;
const MAX_VALUE_LEN: usize = 20;
const DEFAULT_CUSTOMER_SERIES: &str = "CST";
const DEFAULT_DELIMITER: &str = "-";
const DEFAULT_DATE_FORMAT: &str = "Y";

lazy_static::lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{\{([A-Z_]+)(?::([^{}]*))?\}\}").unwrap();
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("template is empty")]
    Empty,
    #[error("malformed placeholder near `{0}`")]
    Malformed(String),
    #[error("unknown placeholder `{0}`")]
    UnknownPlaceholder(String),
    #[error("placeholder `{name}` has invalid width `{value}` (expected 1..=20)")]
    InvalidWidth { name: String, value: String },
    #[error("placeholder `{0}` value is longer than 20 characters")]
    ValueTooLong(String),
    #[error("unsupported date letter `{0}` in DATE_FORMAT")]
    InvalidDateLetter(char),
    #[error("template must contain exactly one SEQUENCE placeholder, found {0}")]
    SequenceCount(usize),
    #[error("SEQUENCE must be separated from neighbouring digits or variable parts")]
    AmbiguousSequence,
    #[error("template must not contain the release tag `_DEL_`")]
    ReservedTag,
    #[error("cannot build number decoder: {0}")]
    Decoder(String),
}

impl From<FormatError> for AppError {
    fn from(err: FormatError) -> Self {
        AppError::InvalidFormatTemplate(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Sequence { width: usize },
    CustomerSequence { width: usize },
    CustomerSeries,
    /// `None` — серия по типу документа (INV/EST/PAY)
    Series(Option<String>),
    Delimiter(String),
    /// Уже переведённый в синтаксис `chrono` формат
    DateFormat(String),
    RandomSequence { len: usize },
}

impl Segment {
    /// Сегменты, чьё значение меняется от номера к номеру.
    fn is_variable(&self) -> bool {
        matches!(
            self,
            Segment::CustomerSequence { .. }
                | Segment::CustomerSeries
                | Segment::DateFormat(_)
                | Segment::RandomSequence { .. }
        )
    }

    fn fixed_text(&self) -> Option<&str> {
        match self {
            Segment::Literal(text) | Segment::Delimiter(text) => Some(text.as_str()),
            Segment::Series(Some(text)) => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Всё, что нужно для рендера одного номера.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub document_type: DocumentType,
    pub sequence: i64,
    pub customer_sequence: Option<i64>,
    pub customer_series: Option<&'a str>,
    pub issued_at: DateTime<Tz>,
}

#[derive(Debug, Clone)]
pub struct NumberFormat {
    template: String,
    segments: Vec<Segment>,
    decoder: Regex,
    /// Сколько групп `seriesN` в регулярке проверяются по типу документа
    series_groups: usize,
}

impl NumberFormat {
    pub fn parse(template: &str) -> Result<Self, FormatError> {
        if template.trim().is_empty() {
            return Err(FormatError::Empty);
        }

        let mut segments = Vec::new();
        let mut cursor = 0;
        for caps in PLACEHOLDER_RE.captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            push_literal(&mut segments, &template[cursor..whole.start()])?;
            let name = &caps[1];
            let value = caps.get(2).map(|m| m.as_str()).filter(|v| !v.is_empty());
            segments.push(parse_placeholder(name, value)?);
            cursor = whole.end();
        }
        push_literal(&mut segments, &template[cursor..])?;

        let sequences = segments
            .iter()
            .filter(|s| matches!(s, Segment::Sequence { .. }))
            .count();
        if sequences != 1 {
            return Err(FormatError::SequenceCount(sequences));
        }
        check_sequence_boundaries(&segments)?;
        check_release_tag(&segments)?;

        let (decoder, series_groups) = build_decoder(&segments)?;
        Ok(Self {
            template: template.to_string(),
            segments,
            decoder,
            series_groups,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn requires_customer(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::CustomerSequence { .. }))
    }

    pub fn render(&self, ctx: &RenderContext<'_>) -> String {
        let mut out = String::with_capacity(self.template.len() + 8);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) | Segment::Delimiter(text) => out.push_str(text),
                Segment::Sequence { width } => {
                    out.push_str(&format!("{:0width$}", ctx.sequence, width = *width))
                }
                Segment::CustomerSequence { width } => out.push_str(&format!(
                    "{:0width$}",
                    ctx.customer_sequence.unwrap_or(1),
                    width = *width
                )),
                Segment::CustomerSeries => out.push_str(
                    ctx.customer_series
                        .filter(|s| !s.is_empty())
                        .unwrap_or(DEFAULT_CUSTOMER_SERIES),
                ),
                Segment::Series(series) => out.push_str(
                    series
                        .as_deref()
                        .unwrap_or(ctx.document_type.default_series()),
                ),
                Segment::DateFormat(fmt) => out.push_str(&ctx.issued_at.format(fmt).to_string()),
                Segment::RandomSequence { len } => out.push_str(&random_hex(*len)),
            }
        }
        out
    }

    /// Достаёт значение SEQUENCE из готового номера. `None`, если номер не
    /// соответствует шаблону или серия по умолчанию принадлежит другому типу.
    pub fn decode_sequence(&self, number: &str, document_type: DocumentType) -> Option<i64> {
        let caps = self.decoder.captures(number)?;
        let series_match = (0..self.series_groups).all(|i| {
            caps.name(&format!("series{}", i))
                .is_some_and(|m| m.as_str() == document_type.default_series())
        });
        if !series_match {
            return None;
        }
        caps.name("sequence")?.as_str().parse().ok()
    }
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) -> Result<(), FormatError> {
    if text.is_empty() {
        return Ok(());
    }
    if let Some(pos) = text.find("{{").or_else(|| text.find("}}")) {
        let snippet: String = text[pos..].chars().take(16).collect();
        return Err(FormatError::Malformed(snippet));
    }
    segments.push(Segment::Literal(text.to_string()));
    Ok(())
}

fn parse_placeholder(name: &str, value: Option<&str>) -> Result<Segment, FormatError> {
    if let Some(v) = value {
        if v.chars().count() > MAX_VALUE_LEN {
            return Err(FormatError::ValueTooLong(name.to_string()));
        }
    }

    let segment = match name {
        "SEQUENCE" => Segment::Sequence {
            width: parse_width(name, value)?,
        },
        "CUSTOMER_SEQUENCE" => Segment::CustomerSequence {
            width: parse_width(name, value)?,
        },
        "RANDOM_SEQUENCE" => Segment::RandomSequence {
            len: parse_width(name, value)?,
        },
        "CUSTOMER_SERIES" => Segment::CustomerSeries,
        "SERIES" => Segment::Series(value.map(str::to_string)),
        "DELIMITER" => Segment::Delimiter(value.unwrap_or(DEFAULT_DELIMITER).to_string()),
        "DATE_FORMAT" => Segment::DateFormat(to_chrono_format(
            value.unwrap_or(DEFAULT_DATE_FORMAT),
        )?),
        other => return Err(FormatError::UnknownPlaceholder(other.to_string())),
    };
    Ok(segment)
}

fn parse_width(name: &str, value: Option<&str>) -> Result<usize, FormatError> {
    let Some(raw) = value else {
        return Ok(DEFAULT_WIDTH);
    };
    match raw.parse::<usize>() {
        Ok(width) if (1..=MAX_WIDTH).contains(&width) => Ok(width),
        _ => Err(FormatError::InvalidWidth {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Буквы даты в стиле `Y-m-d` -> формат `chrono`.
fn to_chrono_format(value: &str) -> Result<String, FormatError> {
    let mut fmt = String::new();
    for c in value.chars() {
        match c {
            'Y' => fmt.push_str("%Y"),
            'y' => fmt.push_str("%y"),
            'm' => fmt.push_str("%m"),
            'n' => fmt.push_str("%-m"),
            'd' => fmt.push_str("%d"),
            'j' => fmt.push_str("%-d"),
            'M' => fmt.push_str("%b"),
            '%' => fmt.push_str("%%"),
            c if c.is_alphanumeric() => return Err(FormatError::InvalidDateLetter(c)),
            c => fmt.push(c),
        }
    }
    Ok(fmt)
}

fn check_sequence_boundaries(segments: &[Segment]) -> Result<(), FormatError> {
    let Some(idx) = segments
        .iter()
        .position(|s| matches!(s, Segment::Sequence { .. }))
    else {
        return Ok(());
    };

    let before = idx.checked_sub(1).and_then(|i| segments.get(i));
    let after = segments.get(idx + 1);

    let clashes = |neighbour: Option<&Segment>, edge: fn(&str) -> Option<char>| match neighbour {
        None => false,
        Some(seg) if seg.is_variable() => true,
        Some(seg) => seg
            .fixed_text()
            .and_then(edge)
            .is_some_and(|c| c.is_ascii_digit()),
    };

    if clashes(before, last_char) || clashes(after, first_char) {
        return Err(FormatError::AmbiguousSequence);
    }
    Ok(())
}

fn first_char(text: &str) -> Option<char> {
    text.chars().next()
}

fn last_char(text: &str) -> Option<char> {
    text.chars().last()
}

/// Фиксированный текст, идущий подряд, не должен складываться в `_DEL_`,
/// иначе номер неотличим от освобождённого.
fn check_release_tag(segments: &[Segment]) -> Result<(), FormatError> {
    let mut run = String::new();
    for segment in segments {
        match segment.fixed_text() {
            Some(text) => run.push_str(text),
            None => {
                if run.contains(RELEASE_TAG) {
                    return Err(FormatError::ReservedTag);
                }
                run.clear();
            }
        }
    }
    if run.contains(RELEASE_TAG) {
        return Err(FormatError::ReservedTag);
    }
    Ok(())
}

fn build_decoder(segments: &[Segment]) -> Result<(Regex, usize), FormatError> {
    let mut pattern = String::from("^");
    let mut series_groups = 0;
    for segment in segments {
        match segment {
            Segment::Literal(text) | Segment::Delimiter(text) | Segment::Series(Some(text)) => {
                pattern.push_str(&regex::escape(text))
            }
            Segment::Series(None) => {
                let series: Vec<String> = DocumentType::ALL
                    .iter()
                    .map(|t| regex::escape(t.default_series()))
                    .collect();
                pattern.push_str(&format!("(?P<series{}>{})", series_groups, series.join("|")));
                series_groups += 1;
            }
            Segment::Sequence { .. } => pattern.push_str("(?P<sequence>[0-9]+)"),
            Segment::CustomerSequence { .. } => pattern.push_str("[0-9]+"),
            Segment::CustomerSeries | Segment::DateFormat(_) => pattern.push_str(".+?"),
            Segment::RandomSequence { len } => pattern.push_str(&format!("[0-9a-f]{{{}}}", len)),
        }
    }
    pattern.push('$');
    let decoder = Regex::new(&pattern).map_err(|e| FormatError::Decoder(e.to_string()))?;
    Ok((decoder, series_groups))
}

fn random_hex(len: usize) -> String {
    (0..len)
        .map(|_| char::from_digit(fastrand::u32(0..16), 16).unwrap_or('0'))
        .collect()
}
