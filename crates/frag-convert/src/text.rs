//! Text-family conversion rules.
//!
//! Every rule takes the decoded source text and returns the rendered target
//! text. Dispatch is by `(source, target)` pair; the caller has already
//! checked the pair against the registry.

use std::sync::LazyLock;

use frag_types::MediaKind::{self, *};
use pulldown_cmark::{html, Event, Options, Parser, TagEnd};
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{ConvertError, ConvertResult};

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("space pattern"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank-line pattern"));

/// Convert `data` from one text kind to another.
pub(crate) fn convert(data: &[u8], from: MediaKind, to: MediaKind) -> ConvertResult<Vec<u8>> {
    let text = std::str::from_utf8(data).map_err(|e| ConvertError::malformed(from, e))?;

    let rendered = match (from, to) {
        (TextMarkdown, TextHtml) => markdown_to_html(text),
        (TextMarkdown, TextPlain) => markdown_to_plain(text),
        (TextMarkdown, ApplicationJson) | (TextPlain, ApplicationJson) => content_json(text),
        (TextMarkdown, TextCsv) => content_csv(text),

        (TextHtml, TextMarkdown) => strip_tags(text),
        (TextHtml, TextPlain) => html_to_plain(text),
        (TextHtml, TextCsv) => html_to_csv(text),

        (ApplicationJson, _) => {
            let value: Value =
                serde_json::from_str(text).map_err(|e| ConvertError::malformed(from, e))?;
            render_value(&value, from, to)?
        }
        (ApplicationYaml, _) => {
            let value: Value =
                serde_yaml::from_str(text).map_err(|e| ConvertError::malformed(from, e))?;
            render_value(&value, from, to)?
        }

        (TextCsv, ApplicationJson) => csv_to_json(text),
        (TextCsv, TextHtml) => csv_to_html(text),

        (TextPlain, TextHtml) => text.replace('\n', "<br>"),
        (TextPlain, TextMarkdown) => text.to_string(),

        _ => return Err(ConvertError::unsupported(from, to)),
    };

    Ok(rendered.into_bytes())
}

/// `true` if a text rule exists for the pair. Identity pairs are handled by
/// the caller and are not listed here.
pub(crate) fn has_rule(from: MediaKind, to: MediaKind) -> bool {
    matches!(
        (from, to),
        (TextMarkdown, TextHtml | TextPlain | ApplicationJson | TextCsv)
            | (TextHtml, TextMarkdown | TextPlain | TextCsv)
            | (ApplicationJson, TextPlain | TextCsv | TextHtml | TextMarkdown | ApplicationYaml)
            | (ApplicationYaml, TextPlain | ApplicationJson | TextHtml | TextMarkdown)
            | (TextCsv, ApplicationJson | TextHtml)
            | (TextPlain, TextHtml | TextMarkdown | ApplicationJson)
    )
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

fn markdown_to_html(text: &str) -> String {
    let parser = Parser::new_ext(text, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Keep the text of every block, one block per line. Header hashes,
/// emphasis markers, code ticks, link targets and list or quote markers
/// disappear because they are syntax, not text events.
fn markdown_to_plain(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for event in Parser::new(text) {
        match event {
            Event::Text(t) | Event::Code(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock) => {
                out.push('\n')
            }
            _ => {}
        }
    }
    let collapsed = BLANK_RUNS.replace_all(&out, "\n\n");
    collapsed.trim_end().to_string()
}

fn content_json(text: &str) -> String {
    let mut map = Map::new();
    map.insert("content".into(), Value::String(text.to_string()));
    Value::Object(map).to_string()
}

fn content_csv(text: &str) -> String {
    format!("content\n{}", quote_field(text))
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

fn strip_tags(text: &str) -> String {
    TAG.replace_all(text, "").into_owned()
}

fn html_to_plain(text: &str) -> String {
    let stripped = strip_tags(text);
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

fn html_to_csv(text: &str) -> String {
    let stripped = strip_tags(text);
    let mut out = String::from("content");
    for line in stripped.lines() {
        let line = WHITESPACE.replace_all(line, " ");
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        out.push('\n');
        out.push_str(&quote_field(line));
    }
    out
}

// ---------------------------------------------------------------------------
// JSON / YAML values
// ---------------------------------------------------------------------------

fn render_value(value: &Value, from: MediaKind, to: MediaKind) -> ConvertResult<String> {
    let pretty = || serde_json::to_string_pretty(value).map_err(|e| ConvertError::failed(to, e));
    match to {
        TextPlain => pretty(),
        TextHtml => Ok(format!("<pre>{}</pre>", escape_html(&pretty()?))),
        TextMarkdown => Ok(format!("```json\n{}\n```", pretty()?)),
        ApplicationJson => Ok(value.to_string()),
        ApplicationYaml => serde_yaml::to_string(value).map_err(|e| ConvertError::failed(to, e)),
        TextCsv => json_to_csv(value, from),
        _ => Err(ConvertError::unsupported(from, to)),
    }
}

/// Render a JSON object, or an array of objects, as CSV.
///
/// Columns are the keys of the first row. A field containing a comma is
/// wrapped in quotes, but embedded quotes are not escaped, so such output is
/// not always valid CSV.
fn json_to_csv(value: &Value, from: MediaKind) -> ConvertResult<String> {
    let rows: Vec<&Map<String, Value>> = match value {
        Value::Object(map) => vec![map],
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_object()
                    .ok_or_else(|| ConvertError::malformed(from, "array elements must be objects"))
            })
            .collect::<ConvertResult<_>>()?,
        _ => {
            return Err(ConvertError::malformed(
                from,
                "expected an object or an array of objects",
            ))
        }
    };

    let Some(first) = rows.first() else {
        return Ok(String::new());
    };
    let columns: Vec<&String> = first.keys().collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        columns
            .iter()
            .map(|c| comma_quoted(c))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in &rows {
        let fields: Vec<String> = columns
            .iter()
            .map(|c| comma_quoted(&cell_text(row.get(c.as_str()))))
            .collect();
        lines.push(fields.join(","));
    }
    Ok(lines.join("\n"))
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn comma_quoted(field: &str) -> String {
    if field.contains(',') {
        format!("\"{field}\"")
    } else {
        field.to_string()
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn csv_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|l| !l.trim().is_empty()).collect()
}

fn split_row(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

/// Header row keys every following row; short rows are padded with empty
/// strings and extra fields are dropped.
fn csv_to_json(text: &str) -> String {
    let lines = csv_lines(text);
    if lines.len() < 2 {
        return "[]".to_string();
    }
    let headers = split_row(lines[0]);
    let rows: Vec<Value> = lines[1..]
        .iter()
        .map(|line| {
            let values = split_row(line);
            let map: Map<String, Value> = headers
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    let v = values.get(i).copied().unwrap_or_default();
                    (h.to_string(), Value::String(v.to_string()))
                })
                .collect();
            Value::Object(map)
        })
        .collect();
    Value::Array(rows).to_string()
}

fn csv_to_html(text: &str) -> String {
    let lines = csv_lines(text);
    let mut out = String::from("<table>");
    if let Some((header, body)) = lines.split_first() {
        out.push_str("<thead><tr>");
        for cell in split_row(header) {
            out.push_str(&format!("<th>{}</th>", escape_html(cell)));
        }
        out.push_str("</tr></thead><tbody>");
        for line in body {
            out.push_str("<tr>");
            for cell in split_row(line) {
                out.push_str(&format!("<td>{}</td>", escape_html(cell)));
            }
            out.push_str("</tr>");
        }
        out.push_str("</tbody>");
    }
    out.push_str("</table>");
    out
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// RFC 4180 quoting: wrap in quotes and double embedded quotes.
fn quote_field(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
