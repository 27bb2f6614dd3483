//! Normalization of common mistakes in engine configuration text.
//!
//! Fixes applied, in order:
//! - leading UTF-8 byte order mark removed
//! - CRLF and lone CR line endings become LF
//! - tabs in indentation become two spaces each
//! - trailing whitespace removed
//! - underscore spellings of hyphenated top-level keys corrected
//!
//! Lines inside `|` and `>` block scalars are copied verbatim, so scalar
//! values are never changed. Applying the pass twice gives the same text as
//! applying it once.

/// Top-level keys the engine spells with hyphens.
const HYPHENATED_KEYS: &[(&str, &str)] = &[
    ("allow_lan", "allow-lan"),
    ("external_controller", "external-controller"),
    ("external_ui", "external-ui"),
    ("log_level", "log-level"),
    ("mixed_port", "mixed-port"),
    ("proxy_groups", "proxy-groups"),
    ("proxy_providers", "proxy-providers"),
    ("redir_port", "redir-port"),
    ("rule_providers", "rule-providers"),
    ("socks_port", "socks-port"),
    ("tproxy_port", "tproxy-port"),
];

/// Return `text` with the known mistakes corrected.
pub fn autofix(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(text.len());
    // Indentation of the line that opened the current block scalar.
    let mut block_parent: Option<usize> = None;

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }

        if let Some(parent) = block_parent {
            if line.trim().is_empty() || indent_width(line) > parent {
                out.push_str(line);
                continue;
            }
            block_parent = None;
        }

        let line = fix_top_level_key(&expand_indent_tabs(line.trim_end()));
        if opens_block_scalar(&line) {
            block_parent = Some(indent_width(&line));
        }
        out.push_str(&line);
    }
    out
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Whether the line ends in a block scalar header such as `|`, `>-` or `|2+`.
fn opens_block_scalar(line: &str) -> bool {
    let line = line.trim_end();
    let (before, header) = match line.rsplit_once([' ', '\t']) {
        Some(split) => split,
        None => return false,
    };
    let before = before.trim_end();
    if !(before.ends_with(':') || before.ends_with('-') && before.trim_start() == "-") {
        return false;
    }

    let mut chars = header.chars();
    if !matches!(chars.next(), Some('|' | '>')) {
        return false;
    }
    let rest: Vec<char> = chars.collect();
    rest.len() <= 2
        && rest.iter().filter(|c| matches!(c, '+' | '-')).count() <= 1
        && rest.iter().all(|c| matches!(c, '+' | '-' | '1'..='9'))
}

fn expand_indent_tabs(line: &str) -> String {
    let body = line.trim_start_matches([' ', '\t']);
    let indent = &line[..line.len() - body.len()];
    if !indent.contains('\t') {
        return line.to_string();
    }

    let mut fixed = String::with_capacity(line.len() + indent.len());
    for c in indent.chars() {
        match c {
            '\t' => fixed.push_str("  "),
            other => fixed.push(other),
        }
    }
    fixed.push_str(body);
    fixed
}

fn fix_top_level_key(line: &str) -> String {
    for (wrong, right) in HYPHENATED_KEYS {
        if let Some(rest) = line.strip_prefix(wrong) {
            if rest.starts_with(':') {
                return format!("{right}{rest}");
            }
        }
    }
    line.to_string()
}
