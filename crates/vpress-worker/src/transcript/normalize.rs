//! Caption format parsing and text normalization.

use std::borrow::Cow;
use std::sync::LazyLock;

use quick_xml::escape::{resolve_predefined_entity, unescape_with};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::debug;
use vpress_models::collapse_whitespace;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex"));

static VTT_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{2}:)?\d{2}:\d{2}\.\d{3}\s+-->").expect("static regex")
});

fn resolve_entity(name: &str) -> Option<&'static str> {
    resolve_predefined_entity(name).or(match name {
        "nbsp" => Some(" "),
        _ => None,
    })
}

/// Decode the entities caption payloads use. Text with an unknown or
/// malformed entity is returned as is.
pub fn decode_entities(text: &str) -> String {
    unescape_with(text, resolve_entity)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| text.to_string())
}

/// Segments of a timedtext XML caption track, one per `text` or `s`
/// element.
///
/// Payloads are sometimes escaped twice (`&amp;#39;`), so the element text
/// is decoded again after the reader unescapes it. Parsing stops at the
/// first malformed event, keeping the segments read so far.
pub fn parse_timedtext(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"text" | b"s" => current = Some(String::new()),
                _ => {
                    if let Some(buf) = current.as_mut() {
                        buf.push(' ');
                    }
                }
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"text" | b"s" => {
                    if let Some(raw) = current.take() {
                        let decoded = decode_entities(&raw);
                        let text = collapse_whitespace(&TAG.replace_all(&decoded, " "));
                        if !text.is_empty() {
                            segments.push(text);
                        }
                    }
                }
                _ => {
                    if let Some(buf) = current.as_mut() {
                        buf.push(' ');
                    }
                }
            },
            Ok(Event::Text(e)) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&e.decode().unwrap_or_default());
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some(buf) = current.as_mut() {
                    match e.resolve_char_ref() {
                        Ok(Some(ch)) => buf.push(ch),
                        _ => {
                            let name = e.decode().unwrap_or_default();
                            match resolve_entity(&name) {
                                Some(value) => buf.push_str(value),
                                None => {
                                    buf.push('&');
                                    buf.push_str(&name);
                                    buf.push(';');
                                }
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!("Timedtext parse stopped at byte {}: {}", reader.buffer_position(), e);
                break;
            }
            _ => {}
        }
    }

    segments
}

/// Cue text of a WebVTT file, without timings, cue numbers or styling.
///
/// Auto-generated subtitles roll: each cue repeats the previous line, so
/// a line equal to the one before it is dropped.
pub fn parse_vtt(content: &str) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    let mut in_header = true;

    for line in content.lines() {
        let line = line.trim();

        if in_header {
            // Header block runs until the first blank line
            if line.is_empty() {
                in_header = false;
            }
            continue;
        }

        if line.is_empty()
            || VTT_TIMING.is_match(line)
            || line.chars().all(|c| c.is_ascii_digit())
            || line.starts_with("NOTE")
        {
            continue;
        }

        let text = collapse_whitespace(&decode_entities(&TAG.replace_all(line, "")));
        if text.is_empty() || segments.last() == Some(&text) {
            continue;
        }
        segments.push(text);
    }

    segments
}

/// Join segments into one whitespace-normalized transcript, dropping
/// consecutive duplicates.
pub fn normalize_text<S: AsRef<str>>(segments: &[S]) -> String {
    let mut joined = String::new();
    let mut previous: Option<&str> = None;

    for segment in segments {
        let segment = segment.as_ref().trim();
        if segment.is_empty() || previous == Some(segment) {
            continue;
        }
        joined.push_str(segment);
        joined.push(' ');
        previous = Some(segment);
    }

    collapse_whitespace(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("it&#39;s &amp; &quot;ok&quot;"), "it's & \"ok\"");
        assert_eq!(decode_entities("&#x645;&#1585;"), "مر");
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_parse_timedtext() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript>
            <text start="0.5" dur="2.1">Hello &amp;amp; welcome</text>
            <text start="2.6" dur="1.0">it&amp;#39;s
            <font color="red">live</font></text>
            <text start="4.0" dur="1.0">   </text>
        </transcript>"#;

        assert_eq!(parse_timedtext(xml), vec!["Hello & welcome", "it's live"]);
    }

    #[test]
    fn test_parse_timedtext_srv3_words() {
        let xml = r#"<timedtext format="3"><body>
            <p t="0" d="1500"><s>we&#39;re</s><s t="400"> back</s></p>
            <p t="1500" d="900"><s>&lt;i&gt;music&lt;/i&gt;</s></p>
        </body></timedtext>"#;

        assert_eq!(parse_timedtext(xml), vec!["we're", "back", "music"]);
    }

    #[test]
    fn test_parse_timedtext_keeps_segments_before_malformed_markup() {
        let xml = r#"<transcript><text start="0">first</text><text start="1">second</oops></transcript>"#;
        assert_eq!(parse_timedtext(xml), vec!["first"]);
    }

    #[test]
    fn test_parse_vtt_drops_timings_and_rolling_duplicates() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: ar\n\n\
                   1\n00:00:00.000 --> 00:00:02.000 align:start\n<c>مرحبا</c> بكم\n\n\
                   2\n00:00:02.000 --> 00:00:04.000\nمرحبا بكم\n\n\
                   00:04.000 --> 00:06.000\nفي البرنامج\n";

        assert_eq!(parse_vtt(vtt), vec!["مرحبا بكم", "في البرنامج"]);
    }

    #[test]
    fn test_normalize_text() {
        let segments = ["  first\nline ", "first\nline", "", "second   part"];
        assert_eq!(normalize_text(&segments), "first line second part");
        assert_eq!(normalize_text::<&str>(&[]), "");
    }
}
