//! Printable Hindi PDF report for a diagnosis
//!
//! The document is laid out as a list of [`ReportBlock`]s, wrapped into
//! lines and split into A4 pages by [`layout`], then drawn with `printpdf`
//! using an embedded Devanagari TrueType font.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use printpdf::{Mm, PdfDocument};
use tracing::debug;

use crate::guidance::DiseaseGuide;
use crate::inference::Diagnosis;
use crate::utils::error::{CottonError, Result};

pub const DEFAULT_FONT_PATH: &str = "assets/fonts/NotoSansDevanagari-Regular.ttf";
pub const REPORT_FILENAME: &str = "cotton_disease_report.pdf";

pub const REPORT_TITLE: &str = "कपास रोग पहचान रिपोर्ट";
const DETECTED_LABEL: &str = "पहचाना गया रोग / कीट:";
const CONFIDENCE_LABEL: &str = "विश्वसनीयता:";
const DESCRIPTION_HEADING: &str = "विवरण:";
const TREATMENT_HEADING: &str = "उपचार के कदम:";
const NO_TREATMENT: &str = "कोई विशेष उपचार आवश्यक नहीं।";
const PESTICIDE_HEADING: &str = "अनुशंसित कीटनाशक / दवाएँ:";
const NO_PESTICIDE: &str = "कीटनाशक की आवश्यकता नहीं है।";
const DISCLAIMER: &str = "महत्वपूर्ण सूचना: यह जानकारी सामान्य मार्गदर्शन हेतु है। \
किसी भी दवा का उपयोग करने से पहले नजदीकी कृषि अधिकारी से सलाह अवश्य लें।";

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 25.4;
const BULLET_INDENT_MM: f32 = 6.0;
const PT_TO_MM: f32 = 25.4 / 72.0;
/// Average glyph advance as a fraction of the font size, used for wrapping
const AVG_GLYPH_EM: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Title,
    Heading,
    Body,
    Bullet,
}

impl TextStyle {
    fn font_size(self) -> f32 {
        match self {
            TextStyle::Title => 18.0,
            TextStyle::Heading => 12.0,
            TextStyle::Body | TextStyle::Bullet => 10.0,
        }
    }

    fn leading_mm(self) -> f32 {
        self.font_size() * 1.25 * PT_TO_MM
    }

    fn indent_mm(self) -> f32 {
        match self {
            TextStyle::Bullet => BULLET_INDENT_MM,
            _ => 0.0,
        }
    }

    /// Characters that fit on one line at this style's size
    fn max_chars(self) -> usize {
        let usable = PAGE_WIDTH_MM - 2.0 * MARGIN_MM - self.indent_mm();
        let advance = self.font_size() * PT_TO_MM * AVG_GLYPH_EM;
        ((usable / advance) as usize).max(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportBlock {
    Paragraph { style: TextStyle, text: String },
    /// Vertical gap in points
    Spacer(f32),
}

impl ReportBlock {
    fn paragraph(style: TextStyle, text: impl Into<String>) -> Self {
        ReportBlock::Paragraph { style, text: text.into() }
    }
}

/// One positioned line of text; coordinates from the bottom-left corner
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub font_size: f32,
    pub x_mm: f32,
    pub y_mm: f32,
}

/// The report content, top to bottom
pub fn report_blocks(
    disease: &str,
    confidence_pct: f64,
    guide: &DiseaseGuide,
    generated_at: NaiveDateTime,
) -> Vec<ReportBlock> {
    let name = if guide.name.is_empty() { disease } else { guide.name.as_str() };

    let mut blocks = vec![
        ReportBlock::paragraph(TextStyle::Title, REPORT_TITLE),
        ReportBlock::Spacer(12.0),
        ReportBlock::paragraph(
            TextStyle::Body,
            format!("तारीख: {}", generated_at.format("%d-%m-%Y %H:%M")),
        ),
        ReportBlock::Spacer(12.0),
        ReportBlock::paragraph(TextStyle::Body, format!("{} {}", DETECTED_LABEL, name)),
        ReportBlock::paragraph(TextStyle::Body, format!("{} {:.2}%", CONFIDENCE_LABEL, confidence_pct)),
        ReportBlock::Spacer(12.0),
        ReportBlock::paragraph(TextStyle::Heading, DESCRIPTION_HEADING),
        ReportBlock::paragraph(TextStyle::Body, guide.description.as_str()),
        ReportBlock::Spacer(12.0),
    ];

    push_list(&mut blocks, TREATMENT_HEADING, &guide.treatment_steps, NO_TREATMENT);
    blocks.push(ReportBlock::Spacer(12.0));
    push_list(&mut blocks, PESTICIDE_HEADING, &guide.recommended_pesticides, NO_PESTICIDE);
    blocks.push(ReportBlock::Spacer(16.0));
    blocks.push(ReportBlock::paragraph(TextStyle::Body, DISCLAIMER));
    blocks
}

fn push_list(blocks: &mut Vec<ReportBlock>, heading: &str, items: &[String], empty: &str) {
    blocks.push(ReportBlock::paragraph(TextStyle::Heading, heading));
    if items.is_empty() {
        blocks.push(ReportBlock::paragraph(TextStyle::Body, empty));
    } else {
        blocks.extend(
            items
                .iter()
                .map(|item| ReportBlock::paragraph(TextStyle::Bullet, format!("• {}", item))),
        );
    }
}

/// Greedy word wrap by character count. Words longer than a line are split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();

        while chars.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = chars.split_off(max_chars);
            lines.push(chars.into_iter().collect());
            chars = rest;
        }

        let needed = if current_len == 0 { chars.len() } else { current_len + 1 + chars.len() };
        if needed > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += chars.len();
        current.extend(chars);
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Wrap blocks into lines and distribute them over pages
pub fn layout(blocks: &[ReportBlock]) -> Vec<Vec<PlacedLine>> {
    let top = PAGE_HEIGHT_MM - MARGIN_MM;
    let mut pages = vec![Vec::new()];
    let mut y = top;

    for block in blocks {
        match block {
            ReportBlock::Spacer(points) => {
                y -= points * PT_TO_MM;
            }
            ReportBlock::Paragraph { style, text } => {
                for line in wrap_text(text, style.max_chars()) {
                    y -= style.leading_mm();
                    if y < MARGIN_MM {
                        pages.push(Vec::new());
                        y = top - style.leading_mm();
                    }

                    let x_mm = match style {
                        TextStyle::Title => {
                            let width = line.chars().count() as f32 * style.font_size() * PT_TO_MM * AVG_GLYPH_EM;
                            ((PAGE_WIDTH_MM - width) / 2.0).max(MARGIN_MM)
                        }
                        _ => MARGIN_MM + style.indent_mm(),
                    };

                    if let Some(page) = pages.last_mut() {
                        page.push(PlacedLine {
                            text: line,
                            font_size: style.font_size(),
                            x_mm,
                            y_mm: y,
                        });
                    }
                }
            }
        }
    }
    pages
}

/// Renders reports with a Devanagari font loaded once
#[derive(Clone)]
pub struct ReportRenderer {
    font: Vec<u8>,
    font_path: PathBuf,
}

impl std::fmt::Debug for ReportRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportRenderer")
            .field("font_path", &self.font_path)
            .field("font_bytes", &self.font.len())
            .finish()
    }
}

impl ReportRenderer {
    pub fn from_font_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CottonError::PathNotFound(path.to_path_buf()));
        }
        let font = std::fs::read(path)?;
        debug!("Loaded report font {:?} ({} bytes)", path, font.len());
        Ok(Self {
            font,
            font_path: path.to_path_buf(),
        })
    }

    pub fn font_path(&self) -> &Path {
        &self.font_path
    }

    /// Render a report; `confidence_pct` is already a percentage
    pub fn render(&self, disease: &str, confidence_pct: f64, guide: &DiseaseGuide) -> Result<Vec<u8>> {
        let blocks = report_blocks(disease, confidence_pct, guide, Local::now().naive_local());
        let (bytes, pages) = self.render_blocks(&blocks)?;
        debug!("Rendered report for '{}': {} pages, {} bytes", disease, pages, bytes.len());
        Ok(bytes)
    }

    /// PDF bytes and page count for laid-out content
    fn render_blocks(&self, blocks: &[ReportBlock]) -> Result<(Vec<u8>, usize)> {
        let pages = layout(blocks);

        let (doc, first_page, first_layer) =
            PdfDocument::new(REPORT_TITLE, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        let font = doc
            .add_external_font(Cursor::new(self.font.as_slice()))
            .map_err(|e| CottonError::Report(format!("cannot embed font {:?}: {}", self.font_path, e)))?;

        let mut layer = doc.get_page(first_page).get_layer(first_layer);
        for (index, lines) in pages.iter().enumerate() {
            if index > 0 {
                let (page, page_layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
                layer = doc.get_page(page).get_layer(page_layer);
            }
            for line in lines {
                layer.use_text(line.text.as_str(), line.font_size, Mm(line.x_mm), Mm(line.y_mm), &font);
            }
        }

        let bytes = doc
            .save_to_bytes()
            .map_err(|e| CottonError::Report(e.to_string()))?;
        Ok((bytes, pages.len()))
    }

    pub fn render_diagnosis(&self, diagnosis: &Diagnosis) -> Result<Vec<u8>> {
        self.render(&diagnosis.disease, diagnosis.confidence, &diagnosis.disease_info_hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::guide_for;
    use chrono::NaiveDate;

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .and_then(|d| d.and_hms_opt(9, 5, 0))
            .unwrap()
    }

    fn texts(blocks: &[ReportBlock]) -> Vec<String> {
        blocks
            .iter()
            .filter_map(|b| match b {
                ReportBlock::Paragraph { text, .. } => Some(text.clone()),
                ReportBlock::Spacer(_) => None,
            })
            .collect()
    }

    fn fixture_renderer() -> ReportRenderer {
        let font = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/fonts/DejaVuSansMono.ttf");
        ReportRenderer::from_font_file(font).unwrap()
    }

    #[test]
    fn test_render_produces_pdf() {
        let renderer = fixture_renderer();
        let pdf = renderer.render("Aphids", 87.5, &guide_for("Aphids")).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert!(pdf.len() > 1000);

        let diagnosis = Diagnosis::new("Healthy leaf", 0.93);
        assert!(renderer.render_diagnosis(&diagnosis).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_long_report_spans_pages() {
        let guide = DiseaseGuide {
            name: "Target spot".to_string(),
            description: "spots on leaves ".repeat(200),
            treatment_steps: (0..60).map(|i| format!("step {} remove infected leaves", i)).collect(),
            recommended_pesticides: (0..30).map(|i| format!("product {}", i)).collect(),
        };
        let blocks = report_blocks("Target spot", 72.0, &guide, fixed_time());

        let (pdf, pages) = fixture_renderer().render_blocks(&blocks).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert!(pages > 1);
        assert_eq!(pages, layout(&blocks).len());
    }

    #[test]
    fn test_invalid_font_bytes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();

        let renderer = ReportRenderer::from_font_file(&path).unwrap();
        assert!(renderer.render("Aphids", 50.0, &guide_for("Aphids")).is_err());
    }

    #[test]
    fn test_missing_font() {
        let err = ReportRenderer::from_font_file("/definitely/not/here.ttf").unwrap_err();
        assert!(matches!(err, CottonError::PathNotFound(p) if p.ends_with("here.ttf")));
    }

    #[test]
    fn test_blocks_for_disease() {
        let guide = guide_for("Aphids");
        let lines = texts(&report_blocks("Aphids", 87.5, &guide, fixed_time()));

        assert_eq!(lines[0], REPORT_TITLE);
        assert_eq!(lines[1], "तारीख: 07-03-2024 09:05");
        assert_eq!(lines[2], format!("{} {}", DETECTED_LABEL, guide.name));
        assert_eq!(lines[3], "विश्वसनीयता: 87.50%");
        assert!(lines.iter().any(|l| l.starts_with("• ")));
        assert!(!lines.iter().any(|l| l == NO_TREATMENT || l == NO_PESTICIDE));
        assert_eq!(lines.last().map(String::as_str), Some(DISCLAIMER));
    }

    #[test]
    fn test_blocks_for_healthy_leaf() {
        let guide = guide_for("Healthy leaf");
        let lines = texts(&report_blocks("Healthy leaf", 99.0, &guide, fixed_time()));
        assert!(lines.iter().any(|l| l == NO_PESTICIDE));
    }

    #[test]
    fn test_name_falls_back_to_label() {
        let guide = DiseaseGuide {
            name: String::new(),
            description: String::new(),
            treatment_steps: vec![],
            recommended_pesticides: vec![],
        };
        let lines = texts(&report_blocks("Leaf curl", 50.0, &guide, fixed_time()));
        assert_eq!(lines[2], format!("{} Leaf curl", DETECTED_LABEL));
        assert!(lines.iter().any(|l| l == NO_TREATMENT));
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("a bb ccc dddd", 6), vec!["a bb", "ccc", "dddd"]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert!(wrap_text("   ", 10).is_empty());

        let hindi = "नीम तेल का छिड़काव करें";
        for line in wrap_text(hindi, 8) {
            assert!(line.chars().count() <= 8);
        }
    }

    #[test]
    fn test_layout_flows_onto_new_pages() {
        let blocks: Vec<ReportBlock> = (0..120)
            .map(|i| ReportBlock::paragraph(TextStyle::Body, format!("line {}", i)))
            .collect();
        let pages = layout(&blocks);

        assert!(pages.len() > 1);
        for page in &pages {
            assert!(page.iter().all(|l| l.y_mm >= MARGIN_MM && l.y_mm <= PAGE_HEIGHT_MM - MARGIN_MM));
        }
        let total: usize = pages.iter().map(Vec::len).sum();
        assert_eq!(total, 120);
    }

    #[test]
    fn test_title_centered_and_bullets_indented() {
        let pages = layout(&[
            ReportBlock::paragraph(TextStyle::Title, REPORT_TITLE),
            ReportBlock::paragraph(TextStyle::Bullet, "• step"),
        ]);
        let title = &pages[0][0];
        let bullet = &pages[0][1];
        assert!(title.x_mm > MARGIN_MM);
        assert_eq!(bullet.x_mm, MARGIN_MM + BULLET_INDENT_MM);
        assert!(bullet.y_mm < title.y_mm);
    }
}
