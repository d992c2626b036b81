//! Range algebra for rich-text formatting.
//!
//! Each attribute name on a text field owns an [`AttributeTrack`]: an
//! ordered run list whose lengths always sum to the content length.
//! Boolean attributes (bold, italic, underline) alternate on/off;
//! multivalued attributes (font, size, layout) carry a string per run
//! with `""` meaning the client default.
//!
//! The wire form is `name: position: len[=value], ...` where
//! `position` is the length of the omitted leading default run and a
//! trailing default run is omitted entirely.

use crate::error::HicpError;

/// Attribute names with defined classes.
pub mod attr {
    pub const BOLD: &str = "bold";
    pub const FONT: &str = "font";
    pub const ITALIC: &str = "italic";
    pub const LAYOUT: &str = "layout";
    pub const SIZE: &str = "size";
    pub const UNDERLINE: &str = "underline";

    // Values for FONT.
    pub const SERIF: &str = "serif";
    pub const SANS_SERIF: &str = "sans-serif";
    pub const SERIF_FIXED: &str = "serif-fixed";
    pub const SANS_SERIF_FIXED: &str = "sans-serif-fixed";

    // Values for LAYOUT.
    pub const BLOCK: &str = "block";
    pub const INDENT_FIRST: &str = "indent-first";
    pub const INDENT_REST: &str = "indent-rest";
    pub const LIST: &str = "list";
}

// ── Values ───────────────────────────────────────────────────────

/// Whether an attribute is an on/off flag or carries a value per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeClass {
    Boolean,
    Multivalued,
}

impl AttributeClass {
    /// Class for a known attribute name. Unknown names are assumed
    /// multivalued, matching how clients treat them.
    pub fn of(name: &str) -> Self {
        match name {
            attr::BOLD | attr::ITALIC | attr::UNDERLINE => AttributeClass::Boolean,
            _ => AttributeClass::Multivalued,
        }
    }

    fn default_value(self) -> AttributeValue {
        match self {
            AttributeClass::Boolean => AttributeValue::Flag(false),
            AttributeClass::Multivalued => AttributeValue::Value(String::new()),
        }
    }
}

/// Value of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Flag(bool),
    Value(String),
}

impl AttributeValue {
    pub fn is_default(&self) -> bool {
        match self {
            AttributeValue::Flag(flag) => !flag,
            AttributeValue::Value(value) => value.is_empty(),
        }
    }
}

/// One run: `length` positions of `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRange {
    pub length: usize,
    pub value: AttributeValue,
}

// ── Track ────────────────────────────────────────────────────────

/// Full-coverage run list for one attribute over one content string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTrack {
    class: AttributeClass,
    runs: Vec<AttributeRange>,
}

impl AttributeTrack {
    /// All-default track covering `content_len` positions.
    pub fn new(class: AttributeClass, content_len: usize) -> Self {
        let mut runs = Vec::new();
        if content_len > 0 {
            runs.push(AttributeRange {
                length: content_len,
                value: class.default_value(),
            });
        }
        Self { class, runs }
    }

    pub fn class(&self) -> AttributeClass {
        self.class
    }

    /// Total covered length, always equal to the content length.
    pub fn len(&self) -> usize {
        self.runs.iter().map(|range| range.length).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Whether every position holds the default value.
    pub fn is_all_default(&self) -> bool {
        self.runs.iter().all(|range| range.value.is_default())
    }

    /// Merge adjacent equal-valued runs and drop empty ones.
    fn normalize(&mut self) {
        let mut merged: Vec<AttributeRange> = Vec::with_capacity(self.runs.len());
        for range in self.runs.drain(..) {
            if range.length == 0 {
                continue;
            }
            match merged.last_mut() {
                Some(last) if last.value == range.value => last.length += range.length,
                _ => merged.push(range),
            }
        }
        self.runs = merged;
    }

    /// Apply `value` over `[start, start+length)`, clamped to the
    /// covered length. Runs left and right of the span are truncated,
    /// covered runs are replaced, and equal-valued neighbors merge.
    pub fn set(&mut self, start: usize, length: usize, value: AttributeValue) {
        let total = self.len();
        if start >= total {
            return;
        }
        let end = (start + length).min(total);
        if end <= start {
            return;
        }

        let mut rebuilt: Vec<AttributeRange> = Vec::with_capacity(self.runs.len() + 2);
        let mut after: Vec<AttributeRange> = Vec::new();
        let mut cursor = 0;
        for range in &self.runs {
            let range_start = cursor;
            let range_end = cursor + range.length;
            cursor = range_end;

            // Portion before the new span.
            if range_start < start {
                rebuilt.push(AttributeRange {
                    length: range_end.min(start) - range_start,
                    value: range.value.clone(),
                });
            }
            // Portion after the new span.
            if range_end > end {
                after.push(AttributeRange {
                    length: range_end - range_start.max(end),
                    value: range.value.clone(),
                });
            }
        }
        rebuilt.push(AttributeRange {
            length: end - start,
            value,
        });
        rebuilt.extend(after);

        self.runs = rebuilt;
        self.normalize();
    }

    /// Grow the track by `count` positions at `pos`, as when content
    /// is inserted. The run enclosing `pos` is extended; insertion at
    /// position zero extends the first run.
    pub fn insert(&mut self, pos: usize, count: usize) {
        if count == 0 {
            return;
        }
        if self.runs.is_empty() {
            self.runs.push(AttributeRange {
                length: count,
                value: self.class.default_value(),
            });
            return;
        }
        let total = self.len();
        let pos = pos.min(total);
        if pos == 0 {
            self.runs[0].length += count;
            return;
        }
        let mut cursor = 0;
        for range in &mut self.runs {
            let range_end = cursor + range.length;
            if cursor < pos && pos <= range_end {
                range.length += count;
                return;
            }
            cursor = range_end;
        }
    }

    /// Shrink the track by removing `[pos, pos+count)`, as when
    /// content is deleted. Emptied runs disappear and newly adjacent
    /// equal-valued runs merge.
    pub fn remove(&mut self, pos: usize, count: usize) {
        let total = self.len();
        if pos >= total || count == 0 {
            return;
        }
        let end = (pos + count).min(total);
        let mut cursor = 0;
        for range in &mut self.runs {
            let range_start = cursor;
            let range_end = cursor + range.length;
            cursor = range_end;

            let overlap_start = range_start.max(pos);
            let overlap_end = range_end.min(end);
            if overlap_start < overlap_end {
                range.length -= overlap_end - overlap_start;
            }
        }
        self.normalize();
    }

    /// Value at one position, for inspection.
    pub fn value_at(&self, pos: usize) -> Option<&AttributeValue> {
        let mut cursor = 0;
        for range in &self.runs {
            cursor += range.length;
            if pos < cursor {
                return Some(&range.value);
            }
        }
        None
    }

    // ── Wire form ────────────────────────────────────────────────

    /// Encode as `name: position: ranges`, or nothing when the whole
    /// track is default-valued.
    pub fn encode(&self, name: &str) -> Option<String> {
        if self.is_all_default() {
            return None;
        }

        let mut runs = self.runs.as_slice();
        let mut position = 0;
        if let Some(first) = runs.first() {
            if first.value.is_default() {
                position = first.length;
                runs = &runs[1..];
            }
        }
        if let Some(last) = runs.last() {
            if last.value.is_default() {
                runs = &runs[..runs.len() - 1];
            }
        }

        let mut out = format!("{}: {}: ", name, position);
        let mut sep = "";
        for range in runs {
            out.push_str(sep);
            sep = ", ";
            match &range.value {
                AttributeValue::Flag(_) => out.push_str(&range.length.to_string()),
                AttributeValue::Value(value) => {
                    if value.is_empty() {
                        out.push_str(&range.length.to_string());
                    } else {
                        out.push_str(&format!("{}={}", range.length, value));
                    }
                }
            }
        }
        Some(out)
    }

    /// Decode one `name: position: ranges` line against a content
    /// length, re-synthesizing the implicit default runs.
    pub fn decode(line: &str, content_len: usize) -> Result<(String, Self), HicpError> {
        let mut fields = line.splitn(3, ':').map(str::trim);
        let name = fields
            .next()
            .filter(|name| !name.is_empty())
            .ok_or(HicpError::ProtocolViolation("attribute name missing"))?
            .to_string();
        let position: usize = fields
            .next()
            .ok_or(HicpError::ProtocolViolation("attribute position missing"))?
            .parse()
            .map_err(|_| HicpError::ProtocolViolation("invalid attribute position"))?;
        let range_list = fields
            .next()
            .ok_or(HicpError::ProtocolViolation("attribute range list missing"))?;

        let class = AttributeClass::of(&name);
        let mut track = Self {
            class,
            runs: Vec::new(),
        };
        if position > 0 {
            track.runs.push(AttributeRange {
                length: position,
                value: class.default_value(),
            });
        }

        let mut flag = true;
        for range_str in range_list.split(',').map(str::trim) {
            if range_str.is_empty() {
                continue;
            }
            let (length_str, value) = match range_str.split_once('=') {
                Some((length, value)) => (length.trim(), Some(value.trim())),
                None => (range_str, None),
            };
            let length: usize = length_str
                .parse()
                .map_err(|_| HicpError::ProtocolViolation("invalid attribute length"))?;
            let value = match class {
                AttributeClass::Boolean => AttributeValue::Flag(flag),
                AttributeClass::Multivalued => {
                    AttributeValue::Value(value.unwrap_or("").to_string())
                }
            };
            flag = !flag;
            track.runs.push(AttributeRange { length, value });
        }

        // Coverage must come out to exactly the content length, no
        // matter what lengths the line claimed.
        let mut remaining = content_len;
        for range in &mut track.runs {
            range.length = range.length.min(remaining);
            remaining -= range.length;
        }
        if remaining > 0 {
            track.runs.push(AttributeRange {
                length: remaining,
                value: class.default_value(),
            });
        }
        track.normalize();
        Ok((name, track))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on() -> AttributeValue {
        AttributeValue::Flag(true)
    }

    fn val(s: &str) -> AttributeValue {
        AttributeValue::Value(s.to_string())
    }

    #[test]
    fn boolean_encode_with_position() {
        // "This is text." is 13 positions.
        let mut track = AttributeTrack::new(AttributeClass::Boolean, 13);
        track.set(5, 2, on());
        assert_eq!(
            track.encode(attr::UNDERLINE).as_deref(),
            Some("underline: 5: 2")
        );
        assert_eq!(track.len(), 13);
    }

    #[test]
    fn multivalued_encode_with_position() {
        let mut track = AttributeTrack::new(AttributeClass::Multivalued, 13);
        track.set(8, 4, val("2"));
        assert_eq!(track.encode(attr::SIZE).as_deref(), Some("size: 8: 4=2"));
        assert_eq!(track.len(), 13);
    }

    #[test]
    fn all_default_encodes_as_nothing() {
        let track = AttributeTrack::new(AttributeClass::Boolean, 10);
        assert_eq!(track.encode(attr::BOLD), None);
    }

    #[test]
    fn set_is_idempotent() {
        let mut a = AttributeTrack::new(AttributeClass::Boolean, 20);
        a.set(3, 5, on());
        let mut b = a.clone();
        b.set(3, 5, on());
        assert_eq!(a, b);
    }

    #[test]
    fn overlapping_sets_merge() {
        let mut track = AttributeTrack::new(AttributeClass::Boolean, 20);
        track.set(3, 5, on());
        track.set(6, 5, on());
        assert_eq!(track.encode(attr::BOLD).as_deref(), Some("bold: 3: 8"));
        assert_eq!(track.len(), 20);
    }

    #[test]
    fn differing_value_splits_run() {
        let mut track = AttributeTrack::new(AttributeClass::Multivalued, 10);
        track.set(0, 10, val("serif"));
        track.set(4, 2, val("sans-serif"));
        assert_eq!(
            track.encode(attr::FONT).as_deref(),
            Some("font: 0: 4=serif, 2=sans-serif, 4=serif")
        );
    }

    #[test]
    fn out_of_bounds_clamped() {
        let mut track = AttributeTrack::new(AttributeClass::Boolean, 10);
        track.set(8, 100, on());
        assert_eq!(track.encode(attr::BOLD).as_deref(), Some("bold: 8: 2"));

        // Start past the end applies nothing.
        track.set(10, 5, on());
        track.set(50, 5, on());
        assert_eq!(track.len(), 10);
        assert_eq!(track.encode(attr::BOLD).as_deref(), Some("bold: 8: 2"));
    }

    #[test]
    fn clearing_restores_default() {
        let mut track = AttributeTrack::new(AttributeClass::Boolean, 10);
        track.set(2, 4, on());
        track.set(2, 4, AttributeValue::Flag(false));
        assert!(track.is_all_default());
        assert_eq!(track.len(), 10);
    }

    #[test]
    fn insert_extends_enclosing_run() {
        let mut track = AttributeTrack::new(AttributeClass::Boolean, 10);
        track.set(3, 4, on());
        // Inside the bold run.
        track.insert(5, 2);
        assert_eq!(track.encode(attr::BOLD).as_deref(), Some("bold: 3: 6"));
        assert_eq!(track.len(), 12);

        // At position zero the first (default) run grows.
        track.insert(0, 3);
        assert_eq!(track.encode(attr::BOLD).as_deref(), Some("bold: 6: 6"));
        assert_eq!(track.len(), 15);
    }

    #[test]
    fn insert_at_boundary_extends_left_run() {
        let mut track = AttributeTrack::new(AttributeClass::Boolean, 10);
        track.set(3, 4, on());
        // Boundary at 7 belongs to the bold run on its left.
        track.insert(7, 2);
        assert_eq!(track.encode(attr::BOLD).as_deref(), Some("bold: 3: 6"));
    }

    #[test]
    fn remove_shrinks_and_merges() {
        let mut track = AttributeTrack::new(AttributeClass::Boolean, 12);
        track.set(4, 4, on());
        // Remove the whole bold run, neighbors merge back to default.
        track.remove(4, 4);
        assert!(track.is_all_default());
        assert_eq!(track.len(), 8);

        let mut track = AttributeTrack::new(AttributeClass::Boolean, 12);
        track.set(4, 4, on());
        track.remove(2, 4);
        assert_eq!(track.encode(attr::BOLD).as_deref(), Some("bold: 2: 2"));
        assert_eq!(track.len(), 8);
    }

    #[test]
    fn insert_then_remove_restores() {
        let mut track = AttributeTrack::new(AttributeClass::Multivalued, 10);
        track.set(2, 6, val("serif"));
        let before = track.clone();
        track.insert(4, 3);
        track.remove(4, 3);
        assert_eq!(track, before);
    }

    #[test]
    fn decode_resynthesizes_defaults() {
        let (name, track) = AttributeTrack::decode("underline: 5: 2", 13).unwrap();
        assert_eq!(name, attr::UNDERLINE);
        assert_eq!(track.len(), 13);
        assert_eq!(track.value_at(4), Some(&AttributeValue::Flag(false)));
        assert_eq!(track.value_at(5), Some(&AttributeValue::Flag(true)));
        assert_eq!(track.value_at(7), Some(&AttributeValue::Flag(false)));
    }

    #[test]
    fn decode_alternates_boolean_runs() {
        let (_, track) = AttributeTrack::decode("bold: 2: 3, 2, 1", 10).unwrap();
        assert_eq!(track.value_at(1), Some(&AttributeValue::Flag(false)));
        assert_eq!(track.value_at(2), Some(&AttributeValue::Flag(true)));
        assert_eq!(track.value_at(5), Some(&AttributeValue::Flag(false)));
        assert_eq!(track.value_at(7), Some(&AttributeValue::Flag(true)));
        assert_eq!(track.value_at(9), Some(&AttributeValue::Flag(false)));
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut track = AttributeTrack::new(AttributeClass::Multivalued, 13);
        track.set(8, 4, val("2"));
        let line = track.encode(attr::SIZE).unwrap();
        let (name, decoded) = AttributeTrack::decode(&line, 13).unwrap();
        assert_eq!(name, attr::SIZE);
        assert_eq!(decoded, track);
    }

    #[test]
    fn coverage_invariant_holds() {
        let mut track = AttributeTrack::new(AttributeClass::Multivalued, 30);
        track.set(0, 10, val("a"));
        track.set(5, 10, val("b"));
        track.set(25, 10, val("c"));
        track.set(5, 3, val(""));
        assert_eq!(track.len(), 30);
    }

    #[test]
    fn decode_clamps_overlong_runs() {
        let (_, track) = AttributeTrack::decode("bold: 2: 999999", 10).unwrap();
        assert_eq!(track.len(), 10);
        assert_eq!(track.value_at(2), Some(&AttributeValue::Flag(true)));
        assert_eq!(track.value_at(9), Some(&AttributeValue::Flag(true)));

        // A position past the end leaves an all-default track.
        let (_, track) = AttributeTrack::decode("bold: 50: 3", 10).unwrap();
        assert_eq!(track.len(), 10);
        assert!(track.is_all_default());
    }

    #[test]
    fn bad_attribute_lines_rejected() {
        assert!(AttributeTrack::decode("bold", 10).is_err());
        assert!(AttributeTrack::decode("bold: x: 2", 10).is_err());
        assert!(AttributeTrack::decode(": 0: 2", 10).is_err());
    }
}
