//! In-place edits of YAML source text.
//!
//! Serializing a parsed document again drops comments, anchors, quoting and
//! empty values (`push:` comes back as `push: null`). [`replace_value`]
//! instead finds the value a [`KeyChain`] names in the block-style source and
//! swaps only that byte range, leaving every other byte as it was.
//!
//! Only what can be placed with certainty is edited. Index segments, flow
//! collections on the way to the value, anchors, aliases, tags and
//! multi-line scalars on the value itself all yield `None`; the caller then
//! decides how to write the document instead.

use std::ops::Range;

use serde_yaml::{Mapping, Value as YamlValue};

use crate::keychain::{KeyChain, PathSegment};

/// One line of the source, without its line terminator.
struct Line<'a> {
    start: usize,
    text: &'a str,
}

impl<'a> Line<'a> {
    fn end(&self) -> usize {
        self.start + self.text.len()
    }

    fn indent(&self) -> usize {
        self.text.len() - self.text.trim_start_matches(' ').len()
    }

    /// Text after the indentation, without comment or trailing whitespace.
    fn content(&self) -> &'a str {
        strip_comment(&self.text[self.indent()..]).trim_end()
    }

    fn is_blank(&self) -> bool {
        self.content().is_empty() || is_document_marker(self.text)
    }

    fn is_sequence_item(&self) -> bool {
        let content = self.content();
        content == "-" || content.starts_with("- ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Layout {
    /// Scalar or flow collection on the key's line; an empty range means
    /// the key has no value at all
    Inline,
    /// Block collection on the lines below the key
    Block { indent: usize },
}

/// Where the value of a key sits in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ValueSpan {
    /// Position right after the key's `:`
    key_end: usize,
    range: Range<usize>,
    layout: Layout,
}

/// Replace the value at `chain` in `source` with `value`.
///
/// Returns the edited text, or `None` if the value could not be located
/// unambiguously or `value` cannot be written in the layout found there.
pub fn replace_value(source: &str, chain: &KeyChain, value: &YamlValue) -> Option<String> {
    let span = locate(source, chain)?;
    let (range, text) = match span.layout {
        Layout::Block { indent } => match render_block(value, indent) {
            Some(text) => (span.range, text),
            None => (span.key_end..span.range.end, format!(" {}", render_flow(value)?)),
        },
        Layout::Inline if span.range.is_empty() => {
            (span.range, format!(" {}", render_flow(value)?))
        }
        Layout::Inline => (span.range, render_flow(value)?),
    };

    let mut out = String::with_capacity(source.len() + text.len());
    out.push_str(&source[..range.start]);
    out.push_str(&text);
    out.push_str(&source[range.end..]);
    Some(out)
}

fn locate(source: &str, chain: &KeyChain) -> Option<ValueSpan> {
    let lines = split_lines(source);
    let (last, parents) = chain.segments().split_last()?;

    let mut scope = 0..lines.len();
    for segment in parents {
        let PathSegment::Key(key) = segment else {
            return None;
        };
        let row = scope.start + find_key(&lines[scope.clone()], key)?;
        let (_, _, inline) = value_after_key(&lines[row])?;
        if !inline.is_empty() && !is_anchor(inline) {
            return None;
        }
        scope = row + 1..block_end(&lines, row, scope.end);
    }

    let PathSegment::Key(key) = last else {
        return None;
    };
    let row = scope.start + find_key(&lines[scope.clone()], key)?;
    let (key_end, value_start, inline) = value_after_key(&lines[row])?;
    let body: Vec<&Line<'_>> = lines[row + 1..block_end(&lines, row, scope.end)]
        .iter()
        .filter(|line| !line.is_blank())
        .collect();

    if inline.is_empty() {
        let span = match (body.first(), body.last()) {
            (Some(first), Some(last)) => ValueSpan {
                key_end,
                range: first.start..last.end(),
                layout: Layout::Block {
                    indent: first.indent(),
                },
            },
            _ => ValueSpan {
                key_end,
                range: key_end..key_end,
                layout: Layout::Inline,
            },
        };
        return Some(span);
    }

    let value_end = match inline.as_bytes()[0] {
        b'[' | b'{' => {
            let end = flow_end(source, value_start)?;
            let rest = source[end..].split('\n').next().unwrap_or_default();
            if !strip_comment(rest).trim().is_empty() {
                return None;
            }
            end
        }
        b'&' | b'*' | b'!' | b'|' | b'>' => return None,
        quote @ (b'"' | b'\'') => {
            closing_quote(&inline[1..], quote)?;
            value_start + inline.len()
        }
        _ if !body.is_empty() => return None,
        _ => value_start + inline.len(),
    };

    Some(ValueSpan {
        key_end,
        range: value_start..value_end,
        layout: Layout::Inline,
    })
}

fn split_lines(source: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for raw in source.split_inclusive('\n') {
        let text = raw.trim_end_matches('\n').trim_end_matches('\r');
        lines.push(Line { start, text });
        start += raw.len();
    }
    lines
}

fn is_document_marker(text: &str) -> bool {
    let text = text.trim_end();
    text == "---" || text == "..." || text.starts_with("--- ") || text.starts_with('%')
}

fn is_anchor(inline: &str) -> bool {
    inline.starts_with('&') && !inline.contains(char::is_whitespace)
}

fn starts_token(prev: u8) -> bool {
    matches!(prev, b' ' | b'\t' | b'\n' | b'[' | b'{' | b',')
}

/// Cut a trailing `# comment` from a single line, skipping quoted text.
fn strip_comment(text: &str) -> &str {
    let bytes = text.as_bytes();
    let mut prev: Option<u8> = None;
    let mut pos = 0;
    while pos < bytes.len() {
        let byte = bytes[pos];
        match byte {
            b'"' | b'\'' if prev.map_or(true, starts_token) => {
                match closing_quote(&text[pos + 1..], byte) {
                    Some(len) => {
                        pos += len + 2;
                        prev = Some(byte);
                        continue;
                    }
                    None => return text,
                }
            }
            b'#' if prev.map_or(true, |p| p == b' ' || p == b'\t') => return &text[..pos],
            _ => {}
        }
        prev = Some(byte);
        pos += 1;
    }
    text
}

/// Offset of the quote closing a scalar whose opening quote precedes `rest`.
fn closing_quote(rest: &str, quote: u8) -> Option<usize> {
    let bytes = rest.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' if quote == b'"' => pos += 2,
            b'\'' if quote == b'\'' && bytes.get(pos + 1) == Some(&b'\'') => pos += 2,
            byte if byte == quote => return Some(pos),
            _ => pos += 1,
        }
    }
    None
}

/// Position right after the bracket closing the flow collection at `start`.
fn flow_end(source: &str, start: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut prev = b' ';
    let mut pos = start;
    while pos < bytes.len() {
        let byte = bytes[pos];
        match byte {
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(pos + 1);
                }
            }
            b'"' | b'\'' if starts_token(prev) => {
                pos += closing_quote(&source[pos + 1..], byte)? + 2;
                prev = byte;
                continue;
            }
            b'#' if prev == b' ' || prev == b'\t' => {
                pos += source[pos..].find('\n')?;
                continue;
            }
            _ => {}
        }
        prev = byte;
        pos += 1;
    }
    None
}

/// Split a mapping entry into its key and the offset right after the `:`.
fn split_key(content: &str) -> Option<(String, usize)> {
    let first = *content.as_bytes().first()?;
    match first {
        b'"' | b'\'' => {
            let close = closing_quote(&content[1..], first)? + 1;
            let rest = &content[close + 1..];
            let colon = close + 1 + rest.len() - rest.trim_start_matches(' ').len();
            if !is_value_indicator(content, colon) {
                return None;
            }
            let key = serde_yaml::from_str::<String>(&content[..=close]).ok()?;
            Some((key, colon + 1))
        }
        b'-' if content.len() == 1 || content[1..].starts_with([' ', '\t']) => None,
        b'?' | b'[' | b'{' | b'&' | b'*' | b'!' | b'|' | b'>' | b'#' => None,
        _ => content
            .match_indices(':')
            .map(|(idx, _)| idx)
            .find(|&idx| is_value_indicator(content, idx))
            .map(|idx| (content[..idx].trim_end().to_string(), idx + 1)),
    }
}

fn is_value_indicator(content: &str, idx: usize) -> bool {
    content[idx..].starts_with(':')
        && (content.len() == idx + 1 || content[idx + 1..].starts_with([' ', '\t']))
}

/// Key end, value start and the inline value text of a mapping entry line.
fn value_after_key<'a>(line: &Line<'a>) -> Option<(usize, usize, &'a str)> {
    let content = line.content();
    let (_, colon_end) = split_key(content)?;
    let rest = &content[colon_end..];
    let inline = rest.trim_start();
    let base = line.start + line.indent();
    Some((
        base + colon_end,
        base + colon_end + rest.len() - inline.len(),
        inline,
    ))
}

/// Row of `wanted` among the entries of the mapping that starts `lines`.
fn find_key(lines: &[Line<'_>], wanted: &str) -> Option<usize> {
    let mut indent = None;
    for (row, line) in lines.iter().enumerate() {
        if line.is_blank() {
            continue;
        }
        let here = line.indent();
        let mapping_indent = *indent.get_or_insert(here);
        if here < mapping_indent {
            return None;
        }
        // nested content, or a sequence written at the same indent as its key
        if here > mapping_indent || line.is_sequence_item() {
            continue;
        }
        let (key, _) = split_key(line.content())?;
        if key == wanted {
            return Some(row);
        }
    }
    None
}

/// End (exclusive) of the rows belonging to the value of the key at `row`.
fn block_end(lines: &[Line<'_>], row: usize, scope_end: usize) -> usize {
    let indent = lines[row].indent();
    let mut end = row + 1;
    for (offset, line) in lines[row + 1..scope_end].iter().enumerate() {
        if line.is_blank() {
            continue;
        }
        if line.indent() > indent || (line.indent() == indent && line.is_sequence_item()) {
            end = row + 2 + offset;
        } else {
            break;
        }
    }
    end
}

fn render_flow(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::Sequence(items) => {
            let items = items.iter().map(render_flow).collect::<Option<Vec<_>>>()?;
            Some(format!("[{}]", items.join(", ")))
        }
        YamlValue::Mapping(map) => Some(format!("{{{}}}", render_entries(map, ", ")?)),
        YamlValue::Tagged(_) => None,
        YamlValue::String(text) => {
            let plain = serde_yaml::to_string(value).ok()?;
            let plain = plain.trim_end();
            let quoted = plain.starts_with(['\'', '"']);
            if plain.contains('\n') || (!quoted && plain.contains([',', '[', ']', '{', '}', '#'])) {
                serde_json::to_string(text).ok()
            } else {
                Some(plain.to_string())
            }
        }
        scalar => Some(serde_yaml::to_string(scalar).ok()?.trim_end().to_string()),
    }
}

fn render_entries(map: &Mapping, separator: &str) -> Option<String> {
    let entries = map
        .iter()
        .map(|(key, value)| Some(format!("{}: {}", render_flow(key)?, render_flow(value)?)))
        .collect::<Option<Vec<_>>>()?;
    Some(entries.join(separator))
}

/// Block layout with flow-style leaves, e.g. `- PACKAGE: [a, b]`.
///
/// Empty collections and scalars have no block form and yield `None`.
fn render_block(value: &YamlValue, indent: usize) -> Option<String> {
    let pad = " ".repeat(indent);
    match value {
        YamlValue::Sequence(items) if !items.is_empty() => {
            let items = items
                .iter()
                .map(|item| {
                    let body = match item {
                        YamlValue::Mapping(map) if !map.is_empty() => {
                            render_entries(map, &format!("\n{pad}  "))?
                        }
                        other => render_flow(other)?,
                    };
                    Some(format!("{pad}- {body}"))
                })
                .collect::<Option<Vec<_>>>()?;
            Some(items.join("\n"))
        }
        YamlValue::Mapping(map) if !map.is_empty() => {
            Some(format!("{pad}{}", render_entries(map, &format!("\n{pad}"))?))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> YamlValue {
        serde_yaml::from_str(text).unwrap()
    }

    fn names(items: &[&str]) -> YamlValue {
        YamlValue::Sequence(items.iter().map(|s| YamlValue::from(*s)).collect())
    }

    fn pkg_chain() -> KeyChain {
        KeyChain::new(["jobs", "build-package", "strategy", "matrix", "PACKAGE"])
    }

    fn gitlab_chain() -> KeyChain {
        KeyChain::new(["nix:build:nixosConfiguration", "parallel", "matrix"])
    }

    fn gitlab_value(items: &[&str]) -> YamlValue {
        yaml(&format!("- NIXOS_CONFIGURATION: {}", render_flow(&names(items)).unwrap()))
    }

    #[test]
    fn test_inline_flow_value_keeps_comment() {
        let source = r#"# Nix builds
name: nix
on:
  push:
jobs:
  build-package:
    runs-on: nix
    strategy:
      matrix:
        PACKAGE: [old] # from packages.x86_64-linux
    steps:
      - run: nix build .#${{ matrix.PACKAGE }}
"#;
        let edited = replace_value(source, &pkg_chain(), &names(&["a", "b"])).unwrap();
        assert_eq!(edited, source.replace("[old]", "[a, b]"));
    }

    #[test]
    fn test_block_sequence_keeps_surroundings() {
        let source = r#"# Build every flake output
.nix: &nix
  image: nixos/nix

nix:build:nixosConfiguration:
  <<: *nix
  parallel:
    matrix:
      # keep sorted
      - NIXOS_CONFIGURATION:
          - old
          - older

  script: nix build
"#;
        let edited = replace_value(source, &gitlab_chain(), &gitlab_value(&["a", "b"])).unwrap();
        let expected = source.replace(
            "      - NIXOS_CONFIGURATION:\n          - old\n          - older",
            "      - NIXOS_CONFIGURATION: [a, b]",
        );
        assert_eq!(edited, expected);
    }

    #[test]
    fn test_sequence_at_key_indent() {
        let source = "nix:build:nixosConfiguration:\n  parallel:\n    matrix:\n    - NIXOS_CONFIGURATION: [old]\n  script: nix build\n";
        let edited = replace_value(source, &gitlab_chain(), &gitlab_value(&["a"])).unwrap();
        assert_eq!(
            edited,
            "nix:build:nixosConfiguration:\n  parallel:\n    matrix:\n    - NIXOS_CONFIGURATION: [a]\n  script: nix build\n"
        );
    }

    #[test]
    fn test_only_the_named_job_is_edited() {
        let source = r#"jobs:
  build-other:
    strategy:
      matrix:
        PACKAGE: [x]
  build-package:
    strategy:
      matrix:
        PACKAGE: [old]
"#;
        let edited = replace_value(source, &pkg_chain(), &names(&["a"])).unwrap();
        assert_eq!(edited, source.replace("[old]", "[a]"));
        assert!(edited.contains("PACKAGE: [x]"));
    }

    #[test]
    fn test_quoted_keys() {
        let source = "\"jobs\":\n  'build-package':\n    strategy:\n      matrix:\n        \"PACKAGE\": [old]\n";
        let edited = replace_value(source, &pkg_chain(), &names(&["a"])).unwrap();
        assert_eq!(edited, source.replace("[old]", "[a]"));
    }

    #[test]
    fn test_missing_value_is_filled_in() {
        let chain = KeyChain::new(["matrix", "PACKAGE"]);
        assert_eq!(
            replace_value("matrix:\n  PACKAGE:\n", &chain, &names(&["a"])).unwrap(),
            "matrix:\n  PACKAGE: [a]\n"
        );
        assert_eq!(
            replace_value("matrix:\n  PACKAGE: # none yet\n", &chain, &names(&["a"])).unwrap(),
            "matrix:\n  PACKAGE: [a] # none yet\n"
        );
    }

    #[test]
    fn test_scalar_and_quoted_values_are_replaced() {
        let chain = KeyChain::new(["a"]);
        assert_eq!(replace_value("a: ~\nb: 1\n", &chain, &names(&[])).unwrap(), "a: []\nb: 1\n");
        assert_eq!(
            replace_value("a: \"x # y\" # z\n", &chain, &names(&["b"])).unwrap(),
            "a: [b] # z\n"
        );
    }

    #[test]
    fn test_empty_list_replaces_block() {
        let edited =
            replace_value("matrix:\n  - A: [x]\nnext: 1\n", &KeyChain::new(["matrix"]), &names(&[]))
                .unwrap();
        assert_eq!(edited, "matrix: []\nnext: 1\n");
    }

    #[test]
    fn test_awkward_strings_are_quoted() {
        let edited = replace_value("a: []\n", &KeyChain::new(["a"]), &names(&["x,y", "p[0]", "plain"]))
            .unwrap();
        assert_eq!(yaml(&edited)["a"], names(&["x,y", "p[0]", "plain"]));
    }

    #[test]
    fn test_document_start_marker() {
        let edited =
            replace_value("---\njobs:\n  x: [old]\n", &KeyChain::new(["jobs", "x"]), &names(&["a"]))
                .unwrap();
        assert_eq!(edited, "---\njobs:\n  x: [a]\n");
    }

    #[test]
    fn test_anchored_parent_is_followed() {
        let source = ".matrix: &m\n  PACKAGE: [old]\n";
        let edited =
            replace_value(source, &KeyChain::new([".matrix", "PACKAGE"]), &names(&["a"])).unwrap();
        assert_eq!(edited, ".matrix: &m\n  PACKAGE: [a]\n");
    }

    #[test]
    fn test_uncertain_locations_are_refused() {
        let value = names(&["a"]);
        let cases = [
            // flow parent
            ("matrix: {PACKAGE: [old]}\n", KeyChain::new(["matrix", "PACKAGE"])),
            // anchor, alias and block scalar on the value
            ("PACKAGE: &p [old]\n", KeyChain::new(["PACKAGE"])),
            ("PACKAGE: *p\n", KeyChain::new(["PACKAGE"])),
            ("PACKAGE: |\n  old\n", KeyChain::new(["PACKAGE"])),
            // multi-line plain scalar
            ("PACKAGE: one\n  two\n", KeyChain::new(["PACKAGE"])),
            // missing key
            ("matrix:\n  OTHER: [x]\n", KeyChain::new(["matrix", "PACKAGE"])),
            // index segment
            ("list:\n  - [old]\n", KeyChain::new([PathSegment::from("list"), PathSegment::Index(0)])),
            // trailing content after a flow value
            ("PACKAGE: [old] extra\n", KeyChain::new(["PACKAGE"])),
        ];
        for (source, chain) in cases {
            assert_eq!(replace_value(source, &chain, &value), None, "{source}");
        }
        assert_eq!(replace_value("a: 1\n", &KeyChain::default(), &value), None);
    }

    #[test]
    fn test_nested_keys_are_not_mistaken_for_siblings() {
        // `PACKAGE` under `other` sits deeper than the mapping being searched
        let source = "matrix:\n  other:\n    PACKAGE: [x]\nPACKAGE: [old]\n";
        let edited = replace_value(source, &KeyChain::new(["PACKAGE"]), &names(&["a"])).unwrap();
        assert_eq!(edited, "matrix:\n  other:\n    PACKAGE: [x]\nPACKAGE: [a]\n");
        assert_eq!(
            replace_value(source, &KeyChain::new(["matrix", "PACKAGE"]), &names(&["a"])),
            None
        );
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("a: b # c"), "a: b ");
        assert_eq!(strip_comment(r#"a: "b # c" # d"#), r#"a: "b # c" "#);
        assert_eq!(strip_comment("a: it's # c"), "a: it's ");
        let step = "run: nix build .#${{ matrix.PACKAGE }}";
        assert_eq!(strip_comment(step), step);
        assert_eq!(strip_comment("# only"), "");
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("nix:build:package:"), Some(("nix:build:package".to_string(), 18)));
        assert_eq!(split_key("image: nixos/nix:latest"), Some(("image".to_string(), 6)));
        assert_eq!(split_key("'a b' : c"), Some(("a b".to_string(), 7)));
        assert_eq!(split_key("- run: x"), None);
        assert_eq!(split_key("plain scalar"), None);
    }
}
