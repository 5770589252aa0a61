use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Change counts plus the unified diff they were computed from. Attached to
/// audit records and events; never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffReport {
    pub unified: String,
    pub added: usize,
    pub removed: usize,
}

impl DiffReport {
    /// Diff two JSON snapshots into a report.
    pub fn between(before: &[u8], after: &[u8]) -> Self {
        let (unified, added, removed) = unified_diff(before, after);
        Self {
            unified,
            added,
            removed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unified.is_empty()
    }
}

/// Re-serialize a JSON document so diffs are stable: object keys sorted
/// lexicographically, arrays left in order, two-space indentation, trailing
/// newline stripped. Input that does not parse as JSON is diffed as-is
/// instead of being rejected.
pub fn canonicalize_json(input: &[u8]) -> String {
    let value: Value = match serde_json::from_slice(input) {
        Ok(v) => v,
        Err(_) => return String::from_utf8_lossy(input).into_owned(),
    };
    let sorted = sort_keys(value);
    let mut text = serde_json::to_string_pretty(&sorted).unwrap_or_default();
    while text.ends_with('\n') {
        text.pop();
    }
    text
}

// Explicit rebuild rather than relying on the map backing: the result must
// stay sorted even if some other dependency turns on serde_json's
// preserve_order feature.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = serde_json::Map::new();
            for (k, v) in entries {
                sorted.insert(k, sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Unified diff of two JSON byte snapshots after canonicalization, plus
/// added/removed line counts. Structurally identical documents (including
/// ones differing only in key order) yield `("", 0, 0)`.
pub fn unified_diff(before: &[u8], after: &[u8]) -> (String, usize, usize) {
    let a_text = canonicalize_json(before);
    let b_text = canonicalize_json(after);
    if a_text == b_text {
        return (String::new(), 0, 0);
    }
    let a: Vec<&str> = a_text.split('\n').collect();
    let b: Vec<&str> = b_text.split('\n').collect();
    let unified = render_unified(&a, &b, "before", "after", 3);
    let (added, removed) = count_changes(&unified);
    (unified, added, removed)
}

/// Count changed lines in a unified diff: `+` lines (except the `+++` header)
/// are added, `-` lines (except `---`) removed.
pub fn count_changes(unified: &str) -> (usize, usize) {
    let mut added = 0;
    let mut removed = 0;
    for line in unified.lines() {
        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }
        if line.starts_with('+') {
            added += 1;
        } else if line.starts_with('-') {
            removed += 1;
        }
    }
    (added, removed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Equal,
    Delete,
    Insert,
}

/// Half-open spans into both sequences; for Equal the spans have equal
/// length, Delete has an empty b span, Insert an empty a span.
#[derive(Debug, Clone, Copy)]
struct OpCode {
    tag: Tag,
    a1: usize,
    a2: usize,
    b1: usize,
    b2: usize,
}

fn render_unified(a: &[&str], b: &[&str], from_label: &str, to_label: &str, context: usize) -> String {
    let groups = grouped_opcodes(&opcodes(a, b), context);
    if groups.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    out.push_str(&format!("--- {}\n", from_label));
    out.push_str(&format!("+++ {}\n", to_label));

    for group in groups {
        let first = group[0];
        let last = group[group.len() - 1];
        out.push_str(&format!(
            "@@ -{} +{} @@\n",
            format_range(first.a1, last.a2),
            format_range(first.b1, last.b2)
        ));
        for op in group {
            match op.tag {
                Tag::Equal => {
                    for line in &a[op.a1..op.a2] {
                        out.push_str(&format!(" {}\n", line));
                    }
                }
                Tag::Delete => {
                    for line in &a[op.a1..op.a2] {
                        out.push_str(&format!("-{}\n", line));
                    }
                }
                Tag::Insert => {
                    for line in &b[op.b1..op.b2] {
                        out.push_str(&format!("+{}\n", line));
                    }
                }
            }
        }
    }
    out
}

/// 1-based "start,length" range in unified-diff header form.
fn format_range(start: usize, stop: usize) -> String {
    let length = stop - start;
    if length == 1 {
        return format!("{}", start + 1);
    }
    let beginning = if length == 0 { start } else { start + 1 };
    format!("{},{}", beginning, length)
}

/// Longest-common-subsequence opcodes over two line slices. At each
/// divergence deletions are emitted before insertions, so a replaced block
/// renders as its `-` lines followed by its `+` lines.
fn opcodes(a: &[&str], b: &[&str]) -> Vec<OpCode> {
    let n = a.len();
    let m = b.len();
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops: Vec<OpCode> = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    while i < n || j < m {
        if i < n && j < m && a[i] == b[j] {
            let (a1, b1) = (i, j);
            while i < n && j < m && a[i] == b[j] {
                i += 1;
                j += 1;
            }
            ops.push(OpCode {
                tag: Tag::Equal,
                a1,
                a2: i,
                b1,
                b2: j,
            });
            continue;
        }
        let a1 = i;
        while i < n && (j == m || (a[i] != b[j] && lcs[i + 1][j] >= lcs[i][j + 1])) {
            i += 1;
        }
        if i > a1 {
            ops.push(OpCode {
                tag: Tag::Delete,
                a1,
                a2: i,
                b1: j,
                b2: j,
            });
        }
        let b1 = j;
        while j < m && (i == n || (a[i] != b[j] && lcs[i][j + 1] > lcs[i + 1][j])) {
            j += 1;
        }
        if j > b1 {
            ops.push(OpCode {
                tag: Tag::Insert,
                a1: i,
                a2: i,
                b1,
                b2: j,
            });
        }
    }
    ops
}

/// Group opcodes into hunks with up to `context` equal lines on each side,
/// splitting wherever an equal run exceeds twice the context.
fn grouped_opcodes(codes: &[OpCode], context: usize) -> Vec<Vec<OpCode>> {
    let mut codes: Vec<OpCode> = codes.to_vec();
    if codes.iter().all(|c| c.tag == Tag::Equal) {
        return Vec::new();
    }

    if let Some(first) = codes.first_mut() {
        if first.tag == Tag::Equal {
            first.a1 = first.a1.max(first.a2.saturating_sub(context));
            first.b1 = first.b1.max(first.b2.saturating_sub(context));
        }
    }
    if let Some(last) = codes.last_mut() {
        if last.tag == Tag::Equal {
            last.a2 = last.a2.min(last.a1 + context);
            last.b2 = last.b2.min(last.b1 + context);
        }
    }

    let mut groups: Vec<Vec<OpCode>> = Vec::new();
    let mut group: Vec<OpCode> = Vec::new();
    for op in codes {
        if op.tag == Tag::Equal && op.a2 - op.a1 > 2 * context {
            group.push(OpCode {
                a2: (op.a1 + context).min(op.a2),
                b2: (op.b1 + context).min(op.b2),
                ..op
            });
            groups.push(group);
            group = vec![OpCode {
                a1: op.a1.max(op.a2.saturating_sub(context)),
                b1: op.b1.max(op.b2.saturating_sub(context)),
                ..op
            }];
            continue;
        }
        group.push(op);
    }
    if !(group.is_empty() || (group.len() == 1 && group[0].tag == Tag::Equal)) {
        groups.push(group);
    }
    groups
}
