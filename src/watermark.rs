use base64::Engine;
use kuchiki::NodeRef;

use crate::dom::{self, markers};
use crate::error::PrintError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatermarkImage {
    Url(String),
    Inline { mime: String, bytes: Vec<u8> },
}

impl WatermarkImage {
    pub fn source(&self) -> String {
        match self {
            WatermarkImage::Url(url) => url.clone(),
            WatermarkImage::Inline { mime, bytes } => {
                let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
                format!("data:{mime};base64,{payload}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkConfig {
    pub enabled: bool,
    pub image: Option<WatermarkImage>,
    pub opacity_percent: u8,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            image: None,
            opacity_percent: 10,
        }
    }
}

impl WatermarkConfig {
    pub fn with_image(image: WatermarkImage, opacity_percent: u8) -> Self {
        Self {
            enabled: true,
            image: Some(image),
            opacity_percent,
        }
    }

    pub fn validate(&self) -> Result<(), PrintError> {
        if self.opacity_percent > 100 {
            return Err(PrintError::InvalidConfiguration(format!(
                "watermark opacity must be within 0..=100, got {}",
                self.opacity_percent
            )));
        }
        if let Some(WatermarkImage::Inline { mime, .. }) = &self.image {
            if !mime.starts_with("image/") {
                return Err(PrintError::InvalidConfiguration(format!(
                    "watermark mime type must be an image type, got {mime}"
                )));
            }
        }
        Ok(())
    }

    fn active_image(&self) -> Option<&WatermarkImage> {
        self.image.as_ref().filter(|_| self.enabled)
    }

    fn opacity(&self) -> String {
        let value = f32::from(self.opacity_percent.min(100)) / 100.0;
        format!("{value}")
    }

    pub fn css(&self) -> String {
        if self.active_image().is_none() {
            return String::new();
        }
        format!(
            "
.watermark {{
  position: fixed;
  top: 50%;
  left: 50%;
  transform: translate(-50%, -50%);
  opacity: {};
  z-index: -1;
  pointer-events: none;
}}

.watermark img {{
  max-width: 300px;
  max-height: 300px;
}}
",
            self.opacity()
        )
    }

    /// Adds the overlay node to `body`, replacing any earlier overlay.
    /// Returns the new node, or `None` when disabled.
    pub fn overlay(&self, body: &NodeRef) -> Result<Option<NodeRef>, PrintError> {
        let Some(image) = self.active_image() else {
            return Ok(None);
        };
        for existing in dom::descendants_with_class(&dom::root_of(body), markers::WATERMARK) {
            existing.detach();
        }
        let wrapper_style = format!(
            "position: fixed; top: 50%; left: 50%; transform: translate(-50%, -50%); opacity: {}; z-index: -1; pointer-events: none;",
            self.opacity()
        );
        let wrapper = dom::create_element(
            "div",
            &[("class", markers::WATERMARK), ("style", &wrapper_style)],
        )
        .ok_or_else(|| PrintError::Platform("could not create watermark node".to_string()))?;
        let source = image.source();
        let img = dom::create_element(
            "img",
            &[
                ("src", &source),
                ("alt", ""),
                ("style", "max-width: 300px; max-height: 300px;"),
            ],
        )
        .ok_or_else(|| PrintError::Platform("could not create watermark image".to_string()))?;
        wrapper.append(img);
        body.append(wrapper.clone());
        Ok(Some(wrapper))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> NodeRef {
        let doc = dom::parse_document("<!DOCTYPE html><html><head></head><body><p>x</p></body></html>");
        dom::select_first(&doc, "body").expect("body")
    }

    #[test]
    fn disabled_watermark_adds_nothing() {
        let config = WatermarkConfig::default();
        assert!(config.css().is_empty());
        let body = body();
        assert!(config.overlay(&body).expect("overlay").is_none());

        let no_image = WatermarkConfig {
            enabled: true,
            image: None,
            opacity_percent: 30,
        };
        assert!(no_image.css().is_empty());
    }

    #[test]
    fn inline_images_become_data_uris() {
        let image = WatermarkImage::Inline {
            mime: "image/png".to_string(),
            bytes: vec![0, 1, 2],
        };
        assert_eq!(image.source(), "data:image/png;base64,AAEC");
    }

    #[test]
    fn overlay_replaces_previous_one() {
        let config =
            WatermarkConfig::with_image(WatermarkImage::Url("/logo.png".to_string()), 25);
        let body = body();
        config.overlay(&body).expect("first");
        config.overlay(&body).expect("second");
        let overlays = dom::select_all(&body, ".watermark");
        assert_eq!(overlays.len(), 1);
        let style = dom::get_attr(&overlays[0], "style").expect("style");
        assert!(style.contains("opacity: 0.25;"));
        let img = dom::select_first(&overlays[0], "img").expect("img");
        assert_eq!(dom::get_attr(&img, "src").as_deref(), Some("/logo.png"));
        assert!(config.css().contains("opacity: 0.25;"));
    }

    #[test]
    fn validation_checks_opacity_and_mime() {
        assert!(WatermarkConfig::default().validate().is_ok());
        let bad_mime = WatermarkConfig::with_image(
            WatermarkImage::Inline {
                mime: "text/plain".to_string(),
                bytes: Vec::new(),
            },
            10,
        );
        assert!(bad_mime.validate().is_err());
        let opaque = WatermarkConfig {
            opacity_percent: 101,
            ..WatermarkConfig::default()
        };
        assert!(opaque.validate().is_err());
    }
}
