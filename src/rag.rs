//! Retrieval-augmented answering.
//!
//! Ties the pipeline together at query time: retrieve the nearest sections,
//! build a bounded prompt context, and ask the chat model for a grounded
//! answer with `(§ Nummer – Titel)` citations.

use anyhow::Result;

use crate::chat;
use crate::config::Config;
use crate::models::{Citation, RetrievedSection};
use crate::search;

/// Appended by the HTTP API so callers cannot mistake output for legal advice.
pub const DISCLAIMER: &str =
    "*Hinweis: Keine Rechtsberatung. Angaben ohne Gewähr; prüfen Sie stets den Gesetzestext.*";

const SYSTEM_PROMPT: &str = "Du bist ein vorsichtiger juristischer Assistent (DE). \
Antworte präzise in Deutsch und zitiere immer die relevanten Paragraphen \
aus dem Kontext als (§ Nummer – Titel). Antworte nicht außerhalb des Kontextes; \
wenn der Kontext nicht reicht, sage knapp, was fehlt.";

/// The model's answer plus the sections it was grounded on.
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Full RAG flow: retrieve → context → completion.
pub async fn answer(config: &Config, question: &str, k: i64, law: &str) -> Result<Answer> {
    let docs = search::retrieve(config, question, k, law).await?;

    let context = build_context(
        &docs,
        config.retrieval.snippet_chars,
        config.retrieval.context_chars,
    );

    let user = format!(
        "Frage:\n{}\n\nKontextauszüge (deutsche Gesetzestexte):\n{}\n\n\
         Anweisung: Gib eine kurze, sachliche Antwort mit Zitaten in Klammern, \
         z.B. (§ 242 – Diebstahl).",
        question, context
    );

    let text = chat::complete(&config.azure, &config.chat, SYSTEM_PROMPT, &user).await?;

    let citations = docs.iter().map(Citation::from).collect();

    Ok(Answer { text, citations })
}

/// Build the prompt context: one `§ header + snippet` block per section,
/// joined with separators, stopping before the character budget is exceeded.
pub fn build_context(docs: &[RetrievedSection], snippet_chars: usize, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut used = 0usize;

    for d in docs {
        let header = format!("§ {} {}", d.section_number, d.section_title)
            .trim_end()
            .to_string();
        let snippet = shorten(&d.full_text, snippet_chars);
        let block = format!("{}\n{}", header, snippet);

        let block_len = block.chars().count();
        if used + block_len > max_chars {
            break;
        }
        used += block_len;
        parts.push(block);
    }

    parts.join("\n\n---\n\n")
}

/// Collapse whitespace and shorten to `width` characters at a word
/// boundary, appending ` …` when text was dropped.
pub fn shorten(text: &str, width: usize) -> String {
    const PLACEHOLDER: &str = " …";

    let words: Vec<&str> = text.split_whitespace().collect();
    let collapsed = words.join(" ");

    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(PLACEHOLDER.chars().count());
    let mut out = String::new();
    let mut used = 0usize;

    for word in &words {
        let word_len = word.chars().count();
        let sep = if out.is_empty() { 0 } else { 1 };
        if used + sep + word_len > budget {
            break;
        }
        if sep == 1 {
            out.push(' ');
        }
        out.push_str(word);
        used += sep + word_len;
    }

    out.push_str(PLACEHOLDER);
    out
}

/// CLI entry point: answer and print with the citation list.
pub async fn run_ask(config: &Config, question: &str, k: Option<i64>, law: Option<String>) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.top_k);
    let law = law.unwrap_or_else(|| config.retrieval.law.clone());

    let result = answer(config, question, k, &law).await?;

    println!("Antwort:");
    println!("{}", result.text);
    println!();
    println!("Kontext-Quellen (Top-{}):", result.citations.len());
    for c in &result.citations {
        println!(" - § {} {}  (similarity {:.3})", c.section_number, c.section_title, c.similarity);
    }

    Ok(())
}
