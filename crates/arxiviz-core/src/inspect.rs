//! Best-effort inspection of generated Manim source.
//!
//! Everything here is pattern matching over text, not parsing. The
//! functions are pure, work without an LLM or renderer, and are allowed to
//! miss constructs they do not recognize (false negatives), but should not
//! report constructs that are not there.
//!
//! Pattern sets:
//! - import: a line `from manim import ...`
//! - scene class: `class Name(<Base>Scene):`, optional module prefix on the base
//! - narration block: `with self.voiceover(text="...") as tracker:` and the
//!   legacy positional form `with self.voiceover("...") as tracker:`, with
//!   single or double quotes
//! - beat label: a comment line `# Beat <n>...`
//! - placements: `.move_to(<coords>)`, `.shift(<direction expr>)` and
//!   `np.array([x, y(, z)])` literals passed straight to a positioning call
//!   or point-taking mobject (`Dot(...)`, `Line(...)`, `.next_to(...)`)

use std::sync::LazyLock;

use regex::Regex;

/// Scene name used when no scene class can be detected.
pub const FALLBACK_SCENE_NAME: &str = "GeneratedScene";

/// Import line inserted when generated code forgets it.
pub const MANIM_IMPORT: &str = "from manim import *";

static IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*from\s+manim\s+import\b").expect("static regex"));

static SCENE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"class\s+(\w+)\s*\(\s*(?:\w+\.)?(\w*Scene)\s*\)").expect("static regex")
});

static NARRATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"with\s+self\.voiceover\s*\(\s*(text\s*=\s*)?(?:"([^"]+)"|'([^']+)')\s*\)\s+as\s+tracker\s*:"#,
    )
    .expect("static regex")
});

static BEAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^#\s*Beat\s*\d+").expect("static regex"));

static PLACEMENT_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(move_to|shift)\(").expect("static regex"));

static ARRAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:np\.)?array\(\s*\[\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*(?:,\s*-?\d+(?:\.\d+)?\s*)?\]\s*\)",
    )
    .expect("static regex")
});

/// Callees whose array arguments are positions on the frame.
const POSITIONAL_CALLEES: &[&str] = &[
    "Dot",
    "Dot3D",
    "Line",
    "DashedLine",
    "Arrow",
    "DoubleArrow",
    "Vector",
    "Polygon",
    "Elbow",
    "next_to",
    "align_to",
    "set_x_y",
    "arc_center",
    "point",
    "start",
    "end",
];

static LIST_COORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*(?:,\s*-?\d+(?:\.\d+)?\s*)?\]$")
        .expect("static regex")
});

/// Whether the source imports from `manim`.
pub fn has_manim_import(code: &str) -> bool {
    IMPORT_RE.is_match(code)
}

/// Prepend the Manim star import when missing. Returns the code and whether it changed.
pub fn ensure_manim_import(code: &str) -> (String, bool) {
    if has_manim_import(code) {
        (code.to_string(), false)
    } else {
        (format!("{MANIM_IMPORT}\n\n{}", code.trim_start()), true)
    }
}

/// Name of the first class deriving from a `*Scene` base, or [`FALLBACK_SCENE_NAME`].
pub fn extract_scene_class_name(code: &str) -> String {
    SCENE_CLASS_RE
        .captures(code)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| FALLBACK_SCENE_NAME.to_string())
}

/// Base classes of every scene class in the source, in order.
pub fn scene_base_classes(code: &str) -> Vec<String> {
    SCENE_CLASS_RE
        .captures_iter(code)
        .filter_map(|c| c.get(2).map(|m| m.as_str().to_string()))
        .collect()
}

/// CamelCase class name for a concept (`"Scaled Dot-Product"` -> `ScaledDotproduct`).
pub fn scene_class_name_for(concept: &str) -> String {
    let cleaned: String = concept
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    let mut name: String = cleaned
        .split_whitespace()
        .map(|word| {
            let lower = word.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();

    if name.is_empty() {
        return "Visualization".to_string();
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name.insert_str(0, "Viz");
    }
    name
}

/// One recognized narration block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationBlock {
    pub text: String,
    /// `true` for the legacy positional form.
    pub positional: bool,
}

/// All narration blocks, in source order.
pub fn narration_blocks(code: &str) -> Vec<NarrationBlock> {
    NARRATION_RE
        .captures_iter(code)
        .filter_map(|c| {
            let text = c.get(2).or_else(|| c.get(3))?.as_str().to_string();
            Some(NarrationBlock {
                text,
                positional: c.get(1).is_none(),
            })
        })
        .collect()
}

/// Narration texts in source order, trimmed, whitespace-only entries dropped.
///
/// Keyword-form blocks win; positional blocks are only read when the
/// source has no keyword-form block at all.
pub fn extract_narration_lines(code: &str) -> Vec<String> {
    let blocks = narration_blocks(code);
    let keyword_present = blocks.iter().any(|b| !b.positional);
    blocks
        .into_iter()
        .filter(|b| b.positional != keyword_present)
        .map(|b| b.text.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// `# Beat N` comment lines, trimmed, in source order.
pub fn extract_beat_labels(code: &str) -> Vec<String> {
    code.lines()
        .map(str::trim)
        .filter(|l| BEAT_RE.is_match(l))
        .map(str::to_string)
        .collect()
}

/// Unit vector (x, y) for a Manim direction constant.
fn direction_vector(name: &str) -> Option<(f64, f64)> {
    let v = match name {
        "RIGHT" => (1.0, 0.0),
        "LEFT" => (-1.0, 0.0),
        "UP" => (0.0, 1.0),
        "DOWN" => (0.0, -1.0),
        "UR" => (1.0, 1.0),
        "UL" => (-1.0, 1.0),
        "DR" => (1.0, -1.0),
        "DL" => (-1.0, -1.0),
        "ORIGIN" | "OUT" | "IN" => (0.0, 0.0),
        _ => return None,
    };
    Some(v)
}

fn split_terms(expr: &str) -> Vec<(f64, &str)> {
    let bytes = expr.as_bytes();
    let mut terms = Vec::new();
    let mut start = 0;
    let mut sign = 1.0;

    for i in 0..bytes.len() {
        let b = bytes[i];
        if (b == b'+' || b == b'-') && i > 0 && bytes[i - 1] != b'*' {
            terms.push((sign, &expr[start..i]));
            sign = if b == b'-' { -1.0 } else { 1.0 };
            start = i + 1;
        }
    }
    terms.push((sign, &expr[start..]));
    terms
}

fn parse_term(term: &str) -> Option<(f64, f64)> {
    let (sign, body) = match term.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, term.strip_prefix('+').unwrap_or(term)),
    };
    if body.is_empty() {
        return None;
    }

    let mut scale = sign;
    let mut direction = None;
    for factor in body.split('*') {
        if let Some(v) = direction_vector(factor) {
            if direction.is_some() {
                return None;
            }
            direction = Some(v);
        } else {
            scale *= factor.parse::<f64>().ok()?;
        }
    }

    direction.map(|(x, y)| (x * scale, y * scale))
}

/// Evaluate a sum of `k * DIR` terms (e.g. `RIGHT * 3 + 2 * UP`).
///
/// Returns `None` for anything that is not made only of numeric literals
/// and direction constants.
pub fn parse_direction_expr(expr: &str) -> Option<(f64, f64)> {
    let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let mut total = (0.0, 0.0);
    for (sign, term) in split_terms(&compact) {
        let (x, y) = parse_term(term)?;
        total.0 += sign * x;
        total.1 += sign * y;
    }
    Some(total)
}

/// How a coordinate was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementKind {
    /// Absolute position (`move_to`, array literal).
    Absolute,
    /// Offset from wherever the object was (`shift`).
    Relative,
}

/// A literal or near-literal coordinate found in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// 1-based source line.
    pub line: usize,
    pub kind: PlacementKind,
    /// The construct as written, e.g. `move_to(RIGHT * 8)`.
    pub construct: String,
    pub x: f64,
    pub y: f64,
}

/// Drop a trailing `#` comment, ignoring `#` inside string literals.
pub fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '#') => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Name of the call (or keyword argument) that directly encloses byte `pos`.
///
/// `Dot(point=np.array(..))` yields `point`, `Line(np.array(..), ..)` yields `Line`.
fn enclosing_callee(line: &str, pos: usize) -> Option<&str> {
    let before = &line[..pos];
    let trimmed = before.trim_end();
    if let Some(head) = trimmed.strip_suffix('=') {
        if !head.ends_with(['=', '!', '<', '>']) {
            let head = head.trim_end();
            let start = head
                .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
                .map_or(0, |i| i + 1);
            let name = &head[start..];
            let keyword_in_call = head[..start].trim_end().ends_with([',', '(']);
            if keyword_in_call && !name.is_empty() {
                return Some(name);
            }
            return None;
        }
    }

    let mut depth = 0usize;
    for (i, c) in before.char_indices().rev() {
        match c {
            ')' | ']' | '}' => depth += 1,
            '[' | '{' if depth == 0 => return None,
            '(' if depth == 0 => {
                let head = &before[..i];
                let start = head
                    .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .map_or(0, |j| j + 1);
                let name = &head[start..];
                return (!name.is_empty()).then_some(name);
            }
            '(' | '[' | '{' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Byte index of the `)` closing the call whose `(` ends right before `open`.
fn closing_paren(line: &str, open: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in line[open..].char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_coordinate_arg(arg: &str) -> Option<(f64, f64)> {
    let arg = arg.trim();
    if let Some(c) = ARRAY_RE.captures(arg) {
        if c.get(0).map(|m| m.as_str().len()) == Some(arg.len()) {
            return Some((c[1].parse().ok()?, c[2].parse().ok()?));
        }
    }
    if let Some(c) = LIST_COORD_RE.captures(arg) {
        return Some((c[1].parse().ok()?, c[2].parse().ok()?));
    }
    parse_direction_expr(arg)
}

/// Literal placements in source order.
///
/// Only single-line constructs with fully literal arguments are reported;
/// anything computed is skipped.
pub fn extract_placements(code: &str) -> Vec<Placement> {
    let mut placements = Vec::new();

    for (idx, raw) in code.lines().enumerate() {
        let line = strip_comment(raw);
        let mut consumed: Vec<(usize, usize)> = Vec::new();

        for m in PLACEMENT_CALL_RE.captures_iter(line) {
            let (Some(whole), Some(name)) = (m.get(0), m.get(1)) else {
                continue;
            };
            let open = whole.end();
            let Some(close) = closing_paren(line, open) else {
                continue;
            };
            consumed.push((open, close));
            let arg = &line[open..close];
            if let Some((x, y)) = parse_coordinate_arg(arg) {
                let kind = if name.as_str() == "shift" {
                    PlacementKind::Relative
                } else {
                    PlacementKind::Absolute
                };
                placements.push(Placement {
                    line: idx + 1,
                    kind,
                    construct: format!("{}({})", name.as_str(), arg.trim()),
                    x,
                    y,
                });
            }
        }

        for m in ARRAY_RE.captures_iter(line) {
            let Some(whole) = m.get(0) else { continue };
            if consumed.iter().any(|(s, e)| whole.start() >= *s && whole.start() < *e) {
                continue;
            }
            if !enclosing_callee(line, whole.start())
                .is_some_and(|name| POSITIONAL_CALLEES.contains(&name))
            {
                continue;
            }
            if let (Ok(x), Ok(y)) = (m[1].parse::<f64>(), m[2].parse::<f64>()) {
                placements.push(Placement {
                    line: idx + 1,
                    kind: PlacementKind::Absolute,
                    construct: whole.as_str().to_string(),
                    x,
                    y,
                });
            }
        }
    }

    placements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_detection_and_insertion() {
        assert!(has_manim_import("from manim import *\nclass A(Scene): pass"));
        assert!(!has_manim_import("import numpy as np\n"));

        let (fixed, changed) = ensure_manim_import("class A(Scene):\n    pass\n");
        assert!(changed);
        assert!(fixed.starts_with("from manim import *\n\n"));

        let (same, changed) = ensure_manim_import("from manim import Circle\n");
        assert!(!changed);
        assert_eq!(same, "from manim import Circle\n");
    }

    #[test]
    fn test_scene_class_detection() {
        assert_eq!(extract_scene_class_name("class Foo(Scene):"), "Foo");
        assert_eq!(extract_scene_class_name("class Bar( ThreeDScene ):"), "Bar");
        assert_eq!(extract_scene_class_name("class Baz(VoiceoverScene):"), "Baz");
        assert_eq!(extract_scene_class_name("class Helper(object):"), FALLBACK_SCENE_NAME);
        assert_eq!(
            scene_base_classes("class A(Scene):\nclass B(manim.VoiceoverScene):"),
            vec!["Scene", "VoiceoverScene"]
        );
    }

    #[test]
    fn test_scene_class_name_for_concept() {
        assert_eq!(scene_class_name_for("Scaled Dot-Product Attention"), "ScaledDotproductAttention");
        assert_eq!(scene_class_name_for("3D rotation"), "Viz3dRotation");
        assert_eq!(scene_class_name_for("!!!"), "Visualization");
    }

    #[test]
    fn test_beat_labels() {
        let code = "    # Beat 1: intro\n    x = 1\n    #beat 2 - softmax\n    # Beats are fun\n";
        assert_eq!(extract_beat_labels(code), vec!["# Beat 1: intro", "#beat 2 - softmax"]);
    }

    #[test]
    fn test_direction_expressions() {
        assert_eq!(parse_direction_expr("RIGHT * 3"), Some((3.0, 0.0)));
        assert_eq!(parse_direction_expr("2*UP + LEFT"), Some((-1.0, 2.0)));
        assert_eq!(parse_direction_expr("UP * 2.5 - RIGHT * 8"), Some((-8.0, 2.5)));
        assert_eq!(parse_direction_expr("-2 * DOWN"), Some((0.0, 2.0)));
        assert_eq!(parse_direction_expr("LEFT * -2"), Some((2.0, 0.0)));
        assert_eq!(parse_direction_expr("UR"), Some((1.0, 1.0)));
        assert_eq!(parse_direction_expr("RIGHT * width"), None);
        assert_eq!(parse_direction_expr("3"), None);
        assert_eq!(parse_direction_expr(""), None);
    }

    #[test]
    fn test_strip_comment_ignores_hash_in_strings() {
        assert_eq!(strip_comment("x = 1  # note"), "x = 1  ");
        assert_eq!(strip_comment("t = Text(\"#1\")"), "t = Text(\"#1\")");
    }

    #[test]
    fn test_extract_placements() {
        let code = "\
        box.move_to(RIGHT * 8)
        dot.shift(UP * 2)
        label.move_to(np.array([1, -5, 0]))  # off screen
        Dot(np.array([3.5, 2, 0]))
        logits = np.array([12, 5, 3])
        bars = BarChart(values=np.array([20, 30]))
        w = weight_array([20, 30])
        other.move_to(box.get_center())
        # hidden.move_to(LEFT * 20)
";
        let placements = extract_placements(code);
        assert_eq!(placements.len(), 4);

        assert_eq!(placements[0].line, 1);
        assert_eq!(placements[0].kind, PlacementKind::Absolute);
        assert_eq!((placements[0].x, placements[0].y), (8.0, 0.0));
        assert_eq!(placements[0].construct, "move_to(RIGHT * 8)");

        assert_eq!(placements[1].kind, PlacementKind::Relative);
        assert_eq!((placements[1].x, placements[1].y), (0.0, 2.0));

        assert_eq!((placements[2].x, placements[2].y), (1.0, -5.0));
        assert_eq!(placements[3].construct, "np.array([3.5, 2, 0])");
    }

    #[test]
    fn test_enclosing_callee() {
        let line = "Line(np.array([0, 0, 0]), end=np.array([9, 0, 0]))";
        assert_eq!(enclosing_callee(line, 5), Some("Line"));
        let kw = line.find("np.array([9").unwrap();
        assert_eq!(enclosing_callee(line, kw), Some("end"));
        assert_eq!(enclosing_callee("x = np.array([1, 2])", 4), None);
        assert_eq!(enclosing_callee("f(np.array([1, 2]))", 2), Some("f"));
        assert_eq!(enclosing_callee("VGroup(*[np.array([1, 2])])", 9), None);
        assert_eq!(enclosing_callee("if a == np.array([1, 2])", 8), None);
    }

    #[test]
    fn test_narration_blocks_keyword_and_positional() {
        let code = r#"
        with self.voiceover(text="First line.") as tracker:
            pass
        with self.voiceover("Legacy line.") as tracker:
            pass
        with self.voiceover(text='Single quoted.') as tracker:
            pass
"#;
        let blocks = narration_blocks(code);
        assert_eq!(blocks.len(), 3);
        assert!(!blocks[0].positional);
        assert!(blocks[1].positional);
        assert_eq!(blocks[2].text, "Single quoted.");

        assert_eq!(extract_narration_lines(code), vec!["First line.", "Single quoted."]);
    }

    #[test]
    fn test_positional_form_used_when_no_keyword_block() {
        let code = r#"
        with self.voiceover("  One.  ") as tracker:
            pass
        with self.voiceover("Two.") as tracker:
            pass
"#;
        assert_eq!(extract_narration_lines(code), vec!["One.", "Two."]);
    }
}
