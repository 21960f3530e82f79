//! Command-line values that are either one number or an inclusive range
//! written `START:END[:STEP]`.

use std::str::FromStr;

/// Step used when a range omits it.
pub const DEFAULT_STEP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    Scalar(usize),
    Range { start: usize, end: usize, step: usize },
}

impl Span {
    fn range(start: usize, end: usize, step: usize) -> Result<Self, String> {
        if start > end {
            return Err(format!("range start {start} is past its end {end}"));
        }
        if step < 1 {
            return Err("range step must be at least 1".to_string());
        }
        Ok(Self::Range { start, end, step })
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range { .. })
    }

    /// Every value, in increasing order. `end` is included when the step lands on it.
    pub fn values(&self) -> impl Iterator<Item = usize> {
        let (start, end, step) = match *self {
            Self::Scalar(value) => (value, value, 1),
            Self::Range { start, end, step } => (start, end, step),
        };
        (start..=end).step_by(step)
    }
}

impl FromStr for Span {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(':')
            .map(|part| {
                part.trim()
                    .parse::<usize>()
                    .map_err(|e| format!("'{part}' is not a non-negative integer: {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        match parts.as_slice() {
            [value] => Ok(Self::Scalar(*value)),
            [start, end] => Self::range(*start, *end, DEFAULT_STEP),
            [start, end, step] => Self::range(*start, *end, *step),
            _ => Err(format!("expected N or START:END[:STEP], got '{s}'")),
        }
    }
}
