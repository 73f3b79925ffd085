// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structured field parser — turns recognized certificate text into a
// `ClaimsRecord`.

use regex::Regex;
use tracing::{debug, instrument};
use valid8_core::error::{Result, Valid8Error};
use valid8_core::types::{CertificateType, ClaimField, ClaimsRecord, FieldProvenance};

use super::rules::{
    default_rules, Span, ACRONYM_MAX_LEN, BOUNDARY_WORDS, CONNECTORS, HONORIFIC_PATTERN,
    INSTITUTION_NOUNS, NAME_STOP_WORDS, TYPE_KEYWORDS, YEAR_RANGE,
};

struct CompiledRule {
    id: &'static str,
    field: ClaimField,
    span: Span,
    regex: Regex,
}

/// Compiled rule tables. Build once and share; parsing is pure.
pub struct FieldParser {
    rules: Vec<CompiledRule>,
    type_patterns: Vec<(CertificateType, Regex)>,
    honorific: Regex,
    disallowed: Regex,
    whitespace: Regex,
}

impl FieldParser {
    /// Compile the default rule tables.
    ///
    /// # Errors
    ///
    /// [`Valid8Error::ProcessingError`] if a built-in pattern fails to compile.
    pub fn new() -> Result<Self> {
        let rules = default_rules()
            .into_iter()
            .map(|rule| {
                Ok(CompiledRule {
                    id: rule.id,
                    field: rule.field,
                    span: rule.span,
                    regex: compile(&rule.pattern, rule.id)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let type_patterns = TYPE_KEYWORDS
            .iter()
            .map(|(kind, keywords)| {
                let alternation = keywords
                    .iter()
                    .map(|kw| regex::escape(kw))
                    .collect::<Vec<_>>()
                    .join("|");
                let pattern = format!(r"(?i)\b(?:{alternation})\b");
                Ok((*kind, compile(&pattern, kind.as_str())?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            type_patterns,
            honorific: compile(HONORIFIC_PATTERN, "honorific")?,
            disallowed: compile(r"[^A-Za-z0-9.,()\- ]", "disallowed")?,
            whitespace: compile(r"\s+", "whitespace")?,
        })
    }

    /// Parse `text` into claims. Deterministic; `confidence` is left at 0 for
    /// the caller to fill from the extractor.
    #[instrument(skip_all, fields(chars = text.len()))]
    pub fn parse(&self, text: &str) -> ClaimsRecord {
        let normalized = self.normalize(text);
        let cased = is_mixed_case(&normalized);
        let mut claims = ClaimsRecord::default();

        for field in ClaimField::ALL {
            let Some((rule, value)) = self.first_match(field, &normalized, cased) else {
                continue;
            };
            let value = post_process(field, &value, cased);
            if value.is_empty() {
                continue;
            }
            *claims.field_mut(field) = value;
            claims.provenance.push(FieldProvenance {
                field,
                rule: rule.to_owned(),
            });
        }

        claims.certificate_type = self.classify(&normalized);
        debug!(
            fields = claims.provenance.len(),
            certificate_type = claims.certificate_type.as_str(),
            cased,
            "claims parsed"
        );
        claims
    }

    /// Collapse whitespace and drop characters outside `[A-Za-z0-9.,()\- ]`.
    /// Idempotent.
    pub fn normalize(&self, text: &str) -> String {
        let spaced = self.whitespace.replace_all(text, " ");
        let stripped = self.disallowed.replace_all(&spaced, "");
        self.whitespace
            .replace_all(&stripped, " ")
            .trim()
            .to_owned()
    }

    /// Certificate type by keyword, highest priority first.
    pub fn classify(&self, normalized: &str) -> CertificateType {
        self.type_patterns
            .iter()
            .find(|(_, regex)| regex.is_match(normalized))
            .map(|(kind, _)| *kind)
            .unwrap_or(CertificateType::Unknown)
    }

    /// The first rule whose capture is non-blank once cut to its span.
    fn first_match(
        &self,
        field: ClaimField,
        text: &str,
        cased: bool,
    ) -> Option<(&'static str, String)> {
        self.rules
            .iter()
            .filter(|rule| rule.field == field)
            .find_map(|rule| {
                let captures = rule.regex.captures(text)?;
                captures
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|m| self.cut(rule.span, m.as_str(), cased))
                    .find(|value| !value.trim().is_empty())
                    .map(|value| (rule.id, value))
            })
    }

    fn cut(&self, span: Span, value: &str, cased: bool) -> String {
        let value = value.trim();
        match span {
            Span::Exact => value.to_owned(),
            Span::Person => {
                let stripped = self.honorific.replace(value, "");
                stripped
                    .split_whitespace()
                    .take_while(|word| is_name_word(word, cased))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            Span::Phrase => phrase_words(value.split_whitespace(), cased),
            Span::Institution => {
                let words: Vec<&str> = value.split_whitespace().collect();
                let Some(noun) = words.iter().position(|word| is_institution_noun(word)) else {
                    return String::new();
                };
                let start = words[..noun]
                    .iter()
                    .rposition(|word| !is_lead_word(word, cased))
                    .map_or(0, |index| index + 1);
                phrase_words(words[start..].iter().copied(), cased)
            }
        }
    }
}

fn post_process(field: ClaimField, value: &str, cased: bool) -> String {
    let value = value.trim().trim_end_matches(['.', ',']);
    match field {
        // Names keep their casing unless the text carries none.
        ClaimField::StudentName if cased => value.to_owned(),
        ClaimField::StudentName | ClaimField::Institution | ClaimField::Course => title_case(value),
        ClaimField::Year => {
            let in_range = value
                .parse::<u32>()
                .map(|year| value.len() == 4 && YEAR_RANGE.contains(&year))
                .unwrap_or(false);
            if in_range { value.to_owned() } else { String::new() }
        }
        ClaimField::Grade if value.contains(' ') => title_case(value),
        ClaimField::Grade => value.to_uppercase(),
    }
}

fn compile(pattern: &str, name: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|err| Valid8Error::ProcessingError(format!("invalid field rule {name}: {err}")))
}

/// Text with both upper- and lower-case letters, where a lowercase word
/// start marks the end of a name.
fn is_mixed_case(text: &str) -> bool {
    text.bytes().any(|b| b.is_ascii_lowercase()) && text.bytes().any(|b| b.is_ascii_uppercase())
}

fn bare(word: &str) -> String {
    word.trim_end_matches(['.', ',']).to_ascii_lowercase()
}

fn starts_upper(word: &str) -> bool {
    word.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn is_boundary(word: &str) -> bool {
    BOUNDARY_WORDS.contains(&bare(word).as_str())
}

fn is_connector(word: &str) -> bool {
    CONNECTORS.contains(&bare(word).as_str())
}

fn is_institution_noun(word: &str) -> bool {
    INSTITUTION_NOUNS.contains(&bare(word).as_str())
}

fn is_name_word(word: &str, cased: bool) -> bool {
    !is_boundary(word)
        && !is_connector(word)
        && !NAME_STOP_WORDS.contains(&bare(word).as_str())
        && (!cased || starts_upper(word))
}

/// A word that may precede an institution noun. `the` is allowed so
/// `The Open University` survives; other connectors end the lead.
fn is_lead_word(word: &str, cased: bool) -> bool {
    if bare(word) == "the" {
        return true;
    }
    !is_boundary(word) && !is_connector(word) && (!cased || starts_upper(word))
}

/// Words up to the first boundary (or, in mixed-case text, the first
/// lowercase word that is not a connector), without trailing connectors.
fn phrase_words<'a>(words: impl Iterator<Item = &'a str>, cased: bool) -> String {
    let mut kept: Vec<&str> = words
        .take_while(|word| !is_boundary(word) && (!cased || is_connector(word) || starts_upper(word)))
        .collect();
    while kept.last().is_some_and(|word| is_connector(word)) {
        kept.pop();
    }
    kept.join(" ")
}

/// Capitalize each word and keep connectors lowercase (except in first
/// position). In a value that has lowercase letters, short all-caps words
/// are acronyms and stay as written. Trailing connectors are dropped.
fn title_case(value: &str) -> String {
    let mixed = value.bytes().any(|b| b.is_ascii_lowercase());
    let mut words: Vec<String> = value
        .split_whitespace()
        .enumerate()
        .map(|(index, word)| {
            let lower = word.to_lowercase();
            let acronym = word.len() > 1
                && word.len() <= ACRONYM_MAX_LEN
                && word.chars().all(|c| c.is_ascii_uppercase());
            if index > 0 && CONNECTORS.contains(&lower.as_str()) {
                lower
            } else if mixed && acronym {
                word.to_owned()
            } else {
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect();

    while words
        .last()
        .is_some_and(|w| CONNECTORS.contains(&w.to_lowercase().as_str()))
    {
        words.pop();
    }
    words.join(" ")
}
