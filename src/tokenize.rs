//! Tokenization pipeline transforms. Each step is a pure function over the
//! evolving token sequence; the interpreter facade drives them in order:
//! time merge (positions still refer to the original sentence), unknown-word
//! synthesis, position renumbering, then the bucketed conversion.

use std::collections::HashMap;

use crate::datetime::{parse_rfc3339, TimeBoundValue, TimeSpan};
use crate::node::{TimeBound, TimeNode, UnknownNode};
use crate::token::{FastToken, Token};

/// Merge recognized time spans into the lexical token stream. Valid spans,
/// sorted by start offset, walk against the tokens in position order: a span
/// ending before the current token's position is inserted as a Time token; a
/// span reaching the token's position is dropped (the lexical token wins);
/// otherwise the token is kept and the walk advances. Spans left over after
/// the tokens are exhausted are appended.
pub fn merge_time_spans(toks: Vec<Token>, spans: &[TimeSpan]) -> Vec<Token> {
    let mut valid: Vec<&TimeSpan> = spans.iter().filter(|s| s.is_valid()).collect();
    valid.sort_by_key(|s| s.start);
    if valid.is_empty() {
        return toks;
    }

    let mut merged = Vec::with_capacity(toks.len() + valid.len());
    let (mut i, mut j) = (0usize, 0usize);
    while i < valid.len() && j < toks.len() {
        let span = valid[i];
        if span.end < toks[j].pos {
            merged.push(time_token(span, i));
            i += 1;
        } else if span.start <= toks[j].pos {
            i += 1;
        } else {
            merged.push(toks[j].clone());
            j += 1;
        }
    }
    while j < toks.len() {
        merged.push(toks[j].clone());
        j += 1;
    }
    while i < valid.len() {
        merged.push(time_token(valid[i], i));
        i += 1;
    }
    merged
}

fn time_token(span: &TimeSpan, index: usize) -> Token {
    let from = bound(&span.value.from);
    let node = TimeNode {
        uid: format!("T{index}"),
        word: span.body.clone(),
        time: parse_rfc3339(&span.value.value).or_else(|| from.as_ref().map(|b| b.time)),
        grain: span.value.grain.clone(),
        from,
        to: bound(&span.value.to),
        resolved: false,
    };
    Token::new(span.start, span.body.clone(), vec![node.into()])
}

fn bound(b: &Option<TimeBoundValue>) -> Option<TimeBound> {
    let b = b.as_ref()?;
    parse_rfc3339(&b.value).map(|time| TimeBound { time, grain: b.grain.clone() })
}

/// Cover the whole sentence: runs of chars not claimed by a matched token are
/// split on whitespace, and each non-empty fragment becomes a token of its
/// own. A fragment that exactly matches a known token's word reuses that
/// token's candidates; otherwise it carries a single Unknown candidate. A
/// matched token whose position was already consumed by an earlier
/// overlapping match is skipped.
pub fn synthesize_unknowns(sentence: &str, toks: Vec<Token>) -> Vec<Token> {
    let chars: Vec<char> = sentence.chars().collect();
    let mut known: HashMap<String, Token> = HashMap::new();
    for t in &toks {
        known.insert(t.word.clone(), t.clone());
    }

    let mut out: Vec<Token> = Vec::new();
    let mut cursor = 0usize;
    for tok in toks {
        if tok.pos < cursor {
            continue;
        }
        if tok.pos > cursor {
            emit_fragments(&chars, cursor, tok.pos, &known, &mut out);
        }
        cursor = tok.pos + tok.word.chars().count();
        out.push(tok);
    }
    if cursor < chars.len() {
        let end = chars.len();
        emit_fragments(&chars, cursor, end, &known, &mut out);
    }
    out
}

fn emit_fragments(
    chars: &[char],
    start: usize,
    end: usize,
    known: &HashMap<String, Token>,
    out: &mut Vec<Token>,
) {
    let end = end.min(chars.len());
    let mut frag = String::new();
    let mut frag_start = start;
    for (idx, ch) in chars[start..end].iter().enumerate() {
        if ch.is_whitespace() {
            flush_fragment(frag_start, &mut frag, known, out);
        } else {
            if frag.is_empty() {
                frag_start = start + idx;
            }
            frag.push(*ch);
        }
    }
    flush_fragment(frag_start, &mut frag, known, out);
}

fn flush_fragment(pos: usize, frag: &mut String, known: &HashMap<String, Token>, out: &mut Vec<Token>) {
    if frag.is_empty() {
        return;
    }
    let word = std::mem::take(frag);
    match known.get(&word) {
        Some(template) => out.push(Token { pos, word, nodes: template.nodes.clone() }),
        None => {
            // Ids follow the token's slot in the assembled stream.
            let node = UnknownNode { uid: format!("U{}", out.len()), word: word.clone(), resolved: false };
            out.push(Token::new(pos, word, vec![node.into()]));
        }
    }
}

/// Positions become dense ordinals once all merging is done.
pub fn renumber(toks: &mut [Token]) {
    for (i, t) in toks.iter_mut().enumerate() {
        t.pos = i;
    }
}

pub fn fast_tokens(toks: &[Token]) -> Vec<FastToken> {
    toks.iter().map(Token::fast).collect()
}

#[cfg(test)]
#[path = "tokenize_tests.rs"]
mod tokenize_tests;
