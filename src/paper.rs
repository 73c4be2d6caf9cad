use crate::error::PrintError;
use crate::types::{Pt, Size};

pub const DEFAULT_PAPER_SIZE: &str = "A4";
pub const DEFAULT_PAPER_WIDTH: &str = "210mm";

/// Paper geometry handed to the print stylesheet: `paper_size` feeds the
/// `@page { size }` descriptor verbatim, `paper_width` caps the print
/// container's width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperConfig {
    pub paper_size: String,
    pub paper_width: String,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            paper_size: DEFAULT_PAPER_SIZE.to_string(),
            paper_width: DEFAULT_PAPER_WIDTH.to_string(),
        }
    }
}

impl PaperConfig {
    pub fn new(paper_size: impl Into<String>, paper_width: impl Into<String>) -> Self {
        Self {
            paper_size: paper_size.into(),
            paper_width: paper_width.into(),
        }
    }

    /// Builds a config from a `@page size` value alone, deriving the container
    /// width from the resolved page geometry.
    pub fn from_size(paper_size: &str) -> Result<Self, PrintError> {
        let size = parse_page_size(paper_size).ok_or_else(|| {
            PrintError::InvalidConfiguration(format!("unrecognized paper size '{paper_size}'"))
        })?;
        Ok(Self {
            paper_size: paper_size.trim().to_string(),
            paper_width: css_mm(size.width),
        })
    }

    pub fn with_overrides(&self, paper_size: Option<&str>, paper_width: Option<&str>) -> Self {
        Self {
            paper_size: paper_size.unwrap_or(&self.paper_size).to_string(),
            paper_width: paper_width.unwrap_or(&self.paper_width).to_string(),
        }
    }

    pub fn page_size(&self) -> Option<Size> {
        parse_page_size(&self.paper_size)
    }

    pub fn validate(&self) -> Result<(), PrintError> {
        if self.paper_size.trim().is_empty() {
            return Err(PrintError::InvalidConfiguration(
                "paper size must not be empty".to_string(),
            ));
        }
        if self.paper_size.trim().eq_ignore_ascii_case("auto") {
            return Ok(());
        }
        if self.page_size().is_none() {
            return Err(PrintError::InvalidConfiguration(format!(
                "unrecognized paper size '{}'",
                self.paper_size
            )));
        }
        if parse_absolute_pt(&self.paper_width).is_none() {
            return Err(PrintError::InvalidConfiguration(format!(
                "paper width '{}' is not an absolute length",
                self.paper_width
            )));
        }
        Ok(())
    }
}

pub fn parse_page_size(raw: &str) -> Option<Size> {
    let normalized = raw.replace(',', " ");
    let mut orientation: Option<&str> = None;
    let mut parts: Vec<&str> = Vec::new();
    for token in normalized.split_whitespace() {
        let lower = token.to_ascii_lowercase();
        if lower == "landscape" || lower == "portrait" {
            orientation = Some(if lower == "landscape" {
                "landscape"
            } else {
                "portrait"
            });
            continue;
        }
        parts.push(token);
    }
    let size = match parts.as_slice() {
        [ident] => named_size(&ident.to_ascii_lowercase())?,
        [width, height] => Size {
            width: parse_absolute_pt(width)?,
            height: parse_absolute_pt(height)?,
        },
        _ => return None,
    };
    Some(match orientation {
        Some(value) => orient(size, value),
        None => size,
    })
}

fn named_size(name: &str) -> Option<Size> {
    match name {
        "a5" => Some(Size::from_mm(148.0, 210.0)),
        "a4" => Some(Size::from_mm(210.0, 297.0)),
        "a3" => Some(Size::from_mm(297.0, 420.0)),
        "b5" => Some(Size::from_mm(176.0, 250.0)),
        "b4" => Some(Size::from_mm(250.0, 353.0)),
        "letter" => Some(Size::from_inches(8.5, 11.0)),
        "legal" => Some(Size::from_inches(8.5, 14.0)),
        "ledger" | "tabloid" => Some(Size::from_inches(11.0, 17.0)),
        _ => None,
    }
}

fn orient(size: Size, orientation: &str) -> Size {
    match orientation {
        "landscape" if !size.is_landscape() => size.swapped(),
        "portrait" if size.is_landscape() => size.swapped(),
        _ => size,
    }
}

fn parse_absolute_pt(raw: &str) -> Option<Pt> {
    let raw = raw.trim().to_ascii_lowercase();
    let split = raw
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: f32 = number.parse().ok()?;
    let pt = match unit.trim() {
        "mm" => value * 72.0 / 25.4,
        "cm" => value * 72.0 / 2.54,
        "in" => value * 72.0,
        "pt" => value,
        "px" => value * 0.75,
        _ => return None,
    };
    Some(Pt::from_f32(pt))
}

fn css_mm(value: Pt) -> String {
    let mm = (value.to_mm() * 10.0).round() / 10.0;
    if mm.fract() == 0.0 {
        format!("{}mm", mm as i64)
    } else {
        format!("{mm:.1}mm")
    }
}
