//! Field specifications: what to find, described the way a test reads.

use serde::{Deserialize, Serialize};

/// Spatial constraint on where the widget sits relative to its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Reading-order heuristic: below or to the right of the label.
    #[default]
    None,
    Right,
    Down,
    Left,
}

/// A request describing which widget to find.
///
/// Built fluently, teacher-locator style:
///
/// ```
/// use widgeteer::FieldSpec;
/// let spec = FieldSpec::label("Client").direction(widgeteer::Direction::Down);
/// assert_eq!(spec.position, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Label text or internal field name.
    pub text: String,
    /// Match against the application-internal field name instead of the
    /// visible label (fast path, no spatial heuristics).
    pub by_internal_name: bool,
    /// 1-based occurrence when several widgets match.
    pub position: usize,
    pub direction: Direction,
    /// The matched node is a label; the interactive widget is found by
    /// spatial search near it.
    pub input_widget: bool,
}

impl FieldSpec {
    /// Spec matching a visible label, resolving to the input widget near it.
    pub fn label(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            by_internal_name: false,
            position: 1,
            direction: Direction::None,
            input_widget: true,
        }
    }

    /// Spec matching the application-internal field name directly.
    pub fn internal_name(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            by_internal_name: true,
            position: 1,
            direction: Direction::None,
            input_widget: true,
        }
    }

    /// Spec matching a clickable element (button, menu entry) by its text.
    pub fn clickable(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            by_internal_name: false,
            position: 1,
            direction: Direction::None,
            input_widget: false,
        }
    }

    pub fn position(mut self, position: usize) -> Self {
        self.position = position.max(1);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

/// Logical type of a value being driven into a widget; governs masking and
/// comparison rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Character,
    Numeric,
    Date,
    Boolean,
    Choice,
}

impl ValueKind {
    /// Infer the kind from a raw target value. Callers that know better
    /// pass the kind explicitly; this covers the common cases.
    pub fn infer(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
            return ValueKind::Boolean;
        }
        if looks_like_date(trimmed) {
            return ValueKind::Date;
        }
        if !trimmed.is_empty() && parse_flexible_number(trimmed).is_some() {
            return ValueKind::Numeric;
        }
        ValueKind::Character
    }
}

fn looks_like_date(value: &str) -> bool {
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    let separators = value.chars().filter(|c| *c == '/' || *c == '-').count();
    digits >= 6 && separators == 2 && value.chars().all(|c| c.is_ascii_digit() || c == '/' || c == '-')
}

/// Parse a number written with either decimal convention: `1234.56`,
/// `1.234,56` and `1234,56` all yield the same value.
pub fn parse_flexible_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let has_comma = trimmed.contains(',');
    let normalized: String = if has_comma {
        // Comma is the decimal separator; dots are grouping.
        trimmed
            .chars()
            .filter(|c| *c != '.')
            .map(|c| if c == ',' { '.' } else { c })
            .collect()
    } else {
        trimmed.to_string()
    };
    normalized.parse().ok()
}
