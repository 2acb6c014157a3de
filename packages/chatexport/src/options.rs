//! Export options. These affect rendering only, never extraction.

/// Paper sizes for the PDF generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in millimeters.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::Letter => (215.9, 279.4),
        }
    }
}

/// Rendering options shared by every generator.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Emit the metadata block (platform, source URL, extraction time)
    pub include_metadata: bool,
    /// Emit per-message timestamps
    pub include_timestamps: bool,
    /// Emit artifacts (code blocks, links, images)
    pub include_artifacts: bool,
    /// PDF paper size
    pub page_size: PageSize,
    /// PDF body font size in points
    pub font_size: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            include_timestamps: true,
            include_artifacts: true,
            page_size: PageSize::default(),
            font_size: 11,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_include_everything() {
        let options = ExportOptions::default();
        assert!(options.include_metadata);
        assert!(options.include_timestamps);
        assert!(options.include_artifacts);
        assert_eq!(options.page_size, PageSize::A4);
    }

    #[test]
    fn page_dimensions() {
        assert_eq!(PageSize::A4.dimensions_mm(), (210.0, 297.0));
        assert_eq!(PageSize::Letter.dimensions_mm(), (215.9, 279.4));
    }
}
