use std::sync::OnceLock;

use regex::Regex;

use crate::ConfigError;

/// Line-oriented post-processing of a text artifact.
#[derive(Debug, Clone)]
pub enum LineFilter {
    /// Keep lines matching the pattern.
    Keep(Regex),
    /// Keep the lines between an "on" line and an "off" line.
    Range(FlipFlop),
}

#[derive(Debug, Clone)]
pub struct FlipFlop {
    pub on: Regex,
    pub off: Regex,
    pub include_on: bool,
    pub include_off: bool,
}

fn range_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"=?\.\.=?").expect("static regex"))
}

impl LineFilter {
    /// Parse a filter expression.
    ///
    /// `ON..OFF` selects range mode; a `=` touching the marker on either side
    /// (`ON=..OFF`, `ON..=OFF`, `ON=..=OFF`) includes the boundary line on that
    /// side. The same flags may be written at the ends of the expression
    /// instead (`=ON..OFF=`). Anything without `..` is a plain keep-pattern.
    pub fn parse(expr: &str) -> Result<Self, ConfigError> {
        let Some(marker) = range_marker().find(expr) else {
            return Ok(LineFilter::Keep(compile(expr, expr)?));
        };

        let mut on = &expr[..marker.start()];
        let mut off = &expr[marker.end()..];
        let mut include_on = marker.as_str().starts_with('=');
        let mut include_off = marker.as_str().ends_with('=');
        if let Some(rest) = on.strip_prefix('=') {
            on = rest;
            include_on = true;
        }
        if let Some(rest) = off.strip_suffix('=') {
            off = rest;
            include_off = true;
        }

        Ok(LineFilter::Range(FlipFlop {
            on: compile(expr, on)?,
            off: compile(expr, off)?,
            include_on,
            include_off,
        }))
    }

    /// Filter `text` line by line. Surviving lines are joined with `\n` and the
    /// result always ends with a single trailing newline.
    pub fn apply(&self, text: &str) -> String {
        // A final newline terminates the last line; it does not start another.
        let body = text.strip_suffix('\n').unwrap_or(text);
        let lines = body.split('\n');
        let kept: Vec<&str> = match self {
            LineFilter::Keep(pattern) => lines.filter(|line| pattern.is_match(line)).collect(),
            LineFilter::Range(flip_flop) => flip_flop.select(lines),
        };
        let mut out = kept.join("\n");
        out.push('\n');
        out
    }
}

impl FlipFlop {
    fn select<'a>(&self, lines: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
        let mut active = false;
        let mut kept = Vec::new();
        for line in lines {
            let hit_on = self.on.is_match(line);
            let hit_off = self.off.is_match(line);
            if hit_on && self.include_on {
                active = true;
            }
            if hit_off && !self.include_off {
                active = false;
            }
            if active {
                kept.push(line);
            }
            if hit_on && !self.include_on {
                active = true;
            }
            if hit_off && self.include_off {
                active = false;
            }
        }
        kept
    }
}

fn compile(expr: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|err| ConfigError::InvalidPattern {
        pattern: expr.to_string(),
        message: err.to_string(),
    })
}
