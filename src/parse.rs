//! XML corpus parsing.
//!
//! Converts a "Gesetze im Internet" norm XML document into per-section
//! NDJSON records. The walk is event-based: for every `<norm>` with a
//! `<metadaten>` block whose `<enbez>` starts with `§`, the section
//! metadata and the concatenated text of `<textdaten><text>` become one
//! [`Section`] record. Everything else (table of contents, chapter
//! headings, footnote-only norms) is skipped.

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Write;
use std::path::Path;

use crate::models::Section;

/// Counters reported after a parse run.
#[derive(Debug, Default)]
pub struct ParseSummary {
    /// `<norm>` elements seen in the document.
    pub norms_seen: usize,
    /// Sections written to the output.
    pub sections_written: usize,
}

/// In-flight state for the `<norm>` element currently being read.
#[derive(Default)]
struct NormState {
    has_metadaten: bool,
    jurabk: String,
    enbez: String,
    titel: String,
    body: String,
}

/// Parse the XML at `input` and write one JSON record per section to `output`.
pub fn run_parse(input: &Path, output: &Path) -> Result<ParseSummary> {
    let xml = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read XML file: {}", input.display()))?;

    let source_uri = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    let sections = parse_sections(&xml, &source_uri)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = std::io::BufWriter::new(
        std::fs::File::create(output)
            .with_context(|| format!("Failed to create output file: {}", output.display()))?,
    );

    let mut summary = ParseSummary {
        norms_seen: sections.norms_seen,
        sections_written: 0,
    };

    for section in &sections.sections {
        let line = serde_json::to_string(section)?;
        writeln!(out, "{}", line)?;
        summary.sections_written += 1;
    }
    out.flush()?;

    Ok(summary)
}

pub struct ParsedCorpus {
    pub norms_seen: usize,
    pub sections: Vec<Section>,
}

/// Walk the document and collect all `§`-sections.
pub fn parse_sections(xml: &str, source_uri: &str) -> Result<ParsedCorpus> {
    let mut reader = Reader::from_reader(xml.as_bytes());

    let mut sections = Vec::new();
    let mut norms_seen = 0usize;

    let mut norm: Option<NormState> = None;
    // Element nesting flags; text events are routed by whichever is active.
    let mut in_metadaten = false;
    let mut in_jurabk = false;
    let mut in_enbez = false;
    let mut titel_depth = 0u32;
    let mut text_depth = 0u32;
    let mut in_textdaten = false;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"norm" => {
                        norms_seen += 1;
                        norm = Some(NormState::default());
                    }
                    b"metadaten" if norm.is_some() => {
                        in_metadaten = true;
                        if let Some(n) = norm.as_mut() {
                            n.has_metadaten = true;
                        }
                    }
                    b"jurabk" if in_metadaten => in_jurabk = true,
                    b"enbez" if in_metadaten => in_enbez = true,
                    b"titel" if in_metadaten => titel_depth += 1,
                    b"textdaten" if norm.is_some() => in_textdaten = true,
                    b"text" if in_textdaten => text_depth += 1,
                    _ => {
                        // Markup nested inside <titel> or <text> keeps the
                        // surrounding capture active.
                        if titel_depth > 0 {
                            titel_depth += 1;
                        }
                        if text_depth > 0 {
                            text_depth += 1;
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"norm" => {
                        if let Some(state) = norm.take() {
                            if let Some(section) = finish_norm(state, source_uri) {
                                sections.push(section);
                            }
                        }
                        in_metadaten = false;
                        in_textdaten = false;
                        titel_depth = 0;
                        text_depth = 0;
                    }
                    b"metadaten" => in_metadaten = false,
                    b"jurabk" => in_jurabk = false,
                    b"enbez" => in_enbez = false,
                    b"textdaten" => in_textdaten = false,
                    _ => {
                        if titel_depth > 0 {
                            titel_depth -= 1;
                        }
                        if text_depth > 0 {
                            text_depth -= 1;
                        }
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(n) = norm.as_mut() {
                    let text = t.unescape().unwrap_or_default();
                    capture(n, &text, in_jurabk, in_enbez, titel_depth, text_depth);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(n) = norm.as_mut() {
                    let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    capture(n, &text, in_jurabk, in_enbez, titel_depth, text_depth);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => anyhow::bail!("XML parse error at byte {}: {}", reader.buffer_position(), e),
        }
        buf.clear();
    }

    Ok(ParsedCorpus {
        norms_seen,
        sections,
    })
}

/// Route character data into whichever metadata or body buffer is active.
fn capture(
    n: &mut NormState,
    text: &str,
    in_jurabk: bool,
    in_enbez: bool,
    titel_depth: u32,
    text_depth: u32,
) {
    if in_jurabk {
        n.jurabk.push_str(text);
    } else if in_enbez {
        n.enbez.push_str(text);
    } else if titel_depth > 0 {
        n.titel.push_str(text);
    } else if text_depth > 0 {
        n.body.push_str(text);
    }
}

/// Turn a finished `<norm>` into a [`Section`], or `None` if it is not a `§`-section.
fn finish_norm(state: NormState, source_uri: &str) -> Option<Section> {
    if !state.has_metadaten {
        return None;
    }

    let enbez = state.enbez.trim();
    if !enbez.starts_with('§') {
        return None;
    }

    let section_number = enbez.trim_start_matches('§').trim().to_string();
    let section_title = state.titel.trim().to_string();
    let body = clean(&state.body);

    // Keep the § header in the text to help embedding semantics.
    let full_text = clean(&format!(
        "§ {} {}\n\n{}",
        section_number, section_title, body
    ));

    let law_abbr = {
        let j = state.jurabk.trim();
        if j.is_empty() {
            "StGB".to_string()
        } else {
            j.to_string()
        }
    };

    Some(Section {
        law_abbr,
        section_number,
        section_title,
        full_text,
        source_uri: source_uri.to_string(),
        lang: "de".to_string(),
    })
}

/// Normalize whitespace: NBSP becomes a space, runs of spaces/tabs collapse
/// to one space, any whitespace run containing a newline collapses to a
/// single `\n`, and the ends are trimmed.
pub fn clean(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut ws_run = false;
    let mut run_has_newline = false;

    for c in s.chars() {
        let c = if c == '\u{00A0}' { ' ' } else { c };
        if c.is_whitespace() {
            ws_run = true;
            if c == '\n' || c == '\r' {
                run_has_newline = true;
            }
        } else {
            if ws_run {
                out.push(if run_has_newline { '\n' } else { ' ' });
                ws_run = false;
                run_has_newline = false;
            }
            out.push(c);
        }
    }

    out.trim().to_string()
}
