//! Worksheet selection for OOXML spreadsheet packages.
//!
//! Picks the worksheet most likely to carry the real content (a product or
//! bill-of-materials sheet with embedded pictures) rather than a cover or
//! template sheet, without opening the workbook in a spreadsheet engine.
//!
//! Each worksheet is scored from independent signals:
//! - images in the worksheet's drawing
//! - number of literal cell values
//! - presence of a populated style code
//!
//! Selection never fails. Unreadable parts contribute no signal and an
//! unreadable package falls back to sheet 1.

pub mod package;
pub mod relationships;
pub mod scoring;

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use package::{Package, PartKind, SHARED_STRINGS, classify};
use relationships::Relationship;
pub use scoring::{DEFAULT_STYLE_CODE_PREFIXES, ScoringPolicy};

/// Result of scoring a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Worksheet ordinal -> accumulated score
    pub scores: BTreeMap<u32, u32>,
    /// Ordinal with the highest score (lowest ordinal wins ties)
    pub best_sheet: u32,
    /// True when the package could not be analysed and sheet 1 was assumed
    pub degraded: bool,
}

impl Selection {
    /// The single-sheet default used when nothing can be analysed.
    pub fn fallback() -> Self {
        Self {
            scores: BTreeMap::from([(1, 0)]),
            best_sheet: 1,
            degraded: true,
        }
    }

    fn from_scores(scores: BTreeMap<u32, u32>) -> Self {
        if scores.is_empty() {
            return Self::fallback();
        }

        // Ascending iteration plus a strict comparison keeps the lowest ordinal on ties
        let mut best_sheet = 0;
        let mut best_score = None;
        for (&ordinal, &score) in &scores {
            if best_score.is_none_or(|best| score > best) {
                best_sheet = ordinal;
                best_score = Some(score);
            }
        }

        Self {
            scores,
            best_sheet,
            degraded: false,
        }
    }
}

/// Signals gathered for one worksheet
#[derive(Debug, Default, Clone, Copy)]
struct SheetSignals {
    images: usize,
    values: usize,
    identifier: bool,
}

/// Scores the worksheets of a spreadsheet package.
///
/// Stateless between calls; one instance can serve concurrent requests.
#[derive(Debug, Clone)]
pub struct WorksheetSelector {
    policy: ScoringPolicy,
    max_part_bytes: u64,
}

impl WorksheetSelector {
    pub fn new(policy: ScoringPolicy, max_part_bytes: u64) -> Self {
        Self {
            policy,
            max_part_bytes,
        }
    }

    /// Score every worksheet in `bytes` and pick the best one.
    pub fn select(&self, bytes: &[u8]) -> Selection {
        let mut package = match Package::open(bytes, self.max_part_bytes) {
            Ok(package) => package,
            Err(e) => {
                warn!(error = %e, "Spreadsheet package could not be opened, assuming sheet 1");
                return Selection::fallback();
            }
        };

        let scores = self.score_package(&mut package);
        if scores.is_empty() {
            warn!("Spreadsheet package contains no worksheets, assuming sheet 1");
            return Selection::fallback();
        }

        let selection = Selection::from_scores(scores);
        debug!(
            best_sheet = selection.best_sheet,
            scores = ?selection.scores,
            "Worksheet selection complete"
        );
        selection
    }

    fn score_package(&self, package: &mut Package<'_>) -> BTreeMap<u32, u32> {
        let mut worksheets = Vec::new();
        let mut worksheet_rels = Vec::new();
        let mut drawing_rels = Vec::new();
        let mut has_shared_strings = false;

        for name in package.part_names() {
            match classify(&name) {
                PartKind::Worksheet(n) => worksheets.push((n, name)),
                PartKind::WorksheetRels(n) => worksheet_rels.push((n, name)),
                PartKind::DrawingRels(n) => drawing_rels.push((n, name)),
                PartKind::SharedStrings => has_shared_strings = true,
                PartKind::Other => {}
            }
        }
        worksheets.sort_unstable();

        let mut images_by_drawing: HashMap<u32, usize> = HashMap::new();
        for (drawing, name) in &drawing_rels {
            if let Some(rels) = read_relationships(package, name) {
                images_by_drawing.insert(*drawing, relationships::count_images(&rels));
            }
        }

        let mut drawing_by_sheet: HashMap<u32, u32> = HashMap::new();
        for (sheet, name) in &worksheet_rels {
            let Some(rels) = read_relationships(package, name) else {
                continue;
            };
            if let Some(drawing) = relationships::single_drawing(&rels) {
                drawing_by_sheet.insert(*sheet, drawing);
            }
        }

        // Not scored yet; read so that text-based signals can be added later
        let shared_text = if has_shared_strings {
            read_shared_text(package)
        } else {
            String::new()
        };
        debug!(
            worksheets = worksheets.len(),
            drawings = images_by_drawing.len(),
            shared_text_chars = shared_text.len(),
            "Indexed spreadsheet package"
        );

        let mut scores = BTreeMap::new();
        for (ordinal, name) in &worksheets {
            let images = drawing_by_sheet
                .get(ordinal)
                .and_then(|drawing| images_by_drawing.get(drawing))
                .copied()
                .unwrap_or(0);

            let mut signals = SheetSignals {
                images,
                ..Default::default()
            };
            match package.read_bytes(name) {
                Ok(content) => match relationships::scan_worksheet(&content) {
                    Ok(scan) => {
                        signals.values = scan.values;
                        signals.identifier =
                            self.policy.has_style_code(&scan.cell_text.to_uppercase());
                    }
                    Err(e) => {
                        warn!(part = %name, error = %e, "Malformed worksheet XML, scoring images only");
                    }
                },
                Err(e) => {
                    warn!(part = %name, error = %e, "Failed to read worksheet, scoring images only");
                }
            }

            let score = self.score(&signals);
            debug!(
                sheet = ordinal,
                images = signals.images,
                values = signals.values,
                identifier = signals.identifier,
                score,
                "Scored worksheet"
            );
            scores.insert(*ordinal, score);
        }

        scores
    }

    fn score(&self, signals: &SheetSignals) -> u32 {
        self.policy.image_points(signals.images)
            + self.policy.fill_points(signals.values)
            + self.policy.identifier_points(signals.identifier)
    }
}

impl Default for WorksheetSelector {
    fn default() -> Self {
        Self::new(ScoringPolicy::default(), 64 * 1024 * 1024)
    }
}

fn read_relationships(package: &mut Package<'_>, name: &str) -> Option<Vec<Relationship>> {
    let content = match package.read_bytes(name) {
        Ok(content) => content,
        Err(e) => {
            warn!(part = %name, error = %e, "Failed to read relationship part");
            return None;
        }
    };

    match relationships::parse_relationships(&content) {
        Ok(rels) => Some(rels),
        Err(e) => {
            warn!(part = %name, error = %e, "Malformed relationship part, ignoring");
            None
        }
    }
}

fn read_shared_text(package: &mut Package<'_>) -> String {
    let result = package
        .read_bytes(SHARED_STRINGS)
        .map_err(|e| e.to_string())
        .and_then(|content| relationships::shared_text(&content).map_err(|e| e.to_string()));

    match result {
        Ok(text) => text,
        Err(error) => {
            warn!(%error, "Shared string table unavailable");
            String::new()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    const DRAWING_TYPE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
    const IMAGE_TYPE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

    /// Zip the given parts into an in-memory package
    pub(crate) fn build_package(parts: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// Worksheet XML with `values` literal cells and optional inline text
    pub(crate) fn worksheet_xml(values: usize, inline_text: Option<&str>) -> String {
        let mut cells = String::new();
        for i in 0..values {
            cells.push_str(&format!(r#"<c r="A{}"><v>{}</v></c>"#, i + 1, i));
        }
        if let Some(text) = inline_text {
            cells.push_str(&format!(
                r#"<c r="Z1" t="inlineStr"><is><t>{}</t></is></c>"#,
                text
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1">{}</row></sheetData></worksheet>"#,
            cells
        )
    }

    pub(crate) fn sheet_rels_xml(drawings: &[u32]) -> String {
        let rels: String = drawings
            .iter()
            .enumerate()
            .map(|(i, d)| {
                format!(
                    r#"<Relationship Id="rId{}" Type="{}" Target="../drawings/drawing{}.xml"/>"#,
                    i + 1,
                    DRAWING_TYPE,
                    d
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
            rels
        )
    }

    pub(crate) fn drawing_rels_xml(images: usize) -> String {
        let rels: String = (1..=images)
            .map(|i| {
                format!(
                    r#"<Relationship Id="rId{}" Type="{}" Target="../media/image{}.png"/>"#,
                    i, IMAGE_TYPE, i
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
            rels
        )
    }

    /// Describes one worksheet of a generated package
    #[derive(Default)]
    pub(crate) struct SheetFixture {
        pub values: usize,
        pub inline_text: Option<&'static str>,
        pub images: Option<usize>,
    }

    /// Build a package where sheet N (1-based) uses drawing N when it has images
    pub(crate) fn workbook(sheets: &[SheetFixture]) -> Vec<u8> {
        let mut parts = Vec::new();
        for (i, sheet) in sheets.iter().enumerate() {
            let n = i + 1;
            parts.push((
                format!("xl/worksheets/sheet{}.xml", n),
                worksheet_xml(sheet.values, sheet.inline_text).into_bytes(),
            ));
            if let Some(images) = sheet.images {
                parts.push((
                    format!("xl/worksheets/_rels/sheet{}.xml.rels", n),
                    sheet_rels_xml(&[n as u32]).into_bytes(),
                ));
                parts.push((
                    format!("xl/drawings/_rels/drawing{}.xml.rels", n),
                    drawing_rels_xml(images).into_bytes(),
                ));
                parts.push((format!("xl/media/image{}.png", n), vec![0u8; 32]));
            }
        }
        let refs: Vec<(&str, Vec<u8>)> = parts
            .iter()
            .map(|(name, content)| (name.as_str(), content.clone()))
            .collect();
        build_package(&refs)
    }

    #[test]
    fn test_no_worksheets_falls_back() {
        let bytes = build_package(&[("xl/workbook.xml", b"<workbook/>".to_vec())]);
        let selection = WorksheetSelector::default().select(&bytes);

        assert_eq!(selection.scores, BTreeMap::from([(1, 0)]));
        assert_eq!(selection.best_sheet, 1);
        assert!(selection.degraded);
    }

    #[test]
    fn test_unreadable_archive_falls_back() {
        let selection = WorksheetSelector::default().select(b"PK\x03\x04 truncated garbage");
        assert_eq!(selection, Selection::fallback());

        let selection = WorksheetSelector::default().select(&[]);
        assert_eq!(selection, Selection::fallback());
    }

    #[test]
    fn test_four_images_scores_100() {
        let bytes = workbook(&[SheetFixture {
            images: Some(4),
            ..Default::default()
        }]);
        let selection = WorksheetSelector::default().select(&bytes);

        assert_eq!(selection.scores, BTreeMap::from([(1, 100)]));
        assert!(!selection.degraded);
    }

    #[test]
    fn test_combined_signals() {
        let bytes = workbook(&[SheetFixture {
            values: 101,
            inline_text: Some("Style BOM4471"),
            images: Some(2),
        }]);
        let selection = WorksheetSelector::default().select(&bytes);

        assert_eq!(selection.scores[&1], 40 + 20 + 30);
    }

    #[test]
    fn test_three_sheet_scenario() {
        let bytes = workbook(&[
            SheetFixture {
                values: 30,
                images: Some(1),
                ..Default::default()
            },
            SheetFixture {
                values: 120,
                inline_text: Some("STY20931"),
                images: Some(4),
            },
            SheetFixture {
                values: 10,
                ..Default::default()
            },
        ]);
        let selection = WorksheetSelector::default().select(&bytes);

        assert_eq!(selection.scores, BTreeMap::from([(1, 20), (2, 150), (3, 0)]));
        assert_eq!(selection.best_sheet, 2);
    }

    #[test]
    fn test_tie_breaks_to_lowest_ordinal() {
        // Parts are written in reverse so enumeration order differs from ordinal order
        let sheet = worksheet_xml(60, None).into_bytes();
        let bytes = build_package(&[
            ("xl/worksheets/sheet3.xml", sheet.clone()),
            ("xl/worksheets/sheet2.xml", sheet.clone()),
            ("xl/worksheets/sheet1.xml", worksheet_xml(0, None).into_bytes()),
        ]);
        let selector = WorksheetSelector::default();

        let first = selector.select(&bytes);
        assert_eq!(first.scores, BTreeMap::from([(1, 0), (2, 10), (3, 10)]));
        assert_eq!(first.best_sheet, 2);

        for _ in 0..5 {
            assert_eq!(selector.select(&bytes), first);
        }
    }

    #[test]
    fn test_best_sheet_has_max_score() {
        let bytes = workbook(&[
            SheetFixture {
                images: Some(3),
                ..Default::default()
            },
            SheetFixture {
                values: 70,
                ..Default::default()
            },
            SheetFixture {
                images: Some(3),
                values: 51,
                ..Default::default()
            },
        ]);
        let selection = WorksheetSelector::default().select(&bytes);

        let max = selection.scores.values().copied().max().unwrap();
        assert_eq!(selection.scores[&selection.best_sheet], max);
        assert_eq!(selection.best_sheet, 3);
    }

    #[test]
    fn test_unmapped_sheet_gets_no_image_points() {
        // drawing1 has four images and belongs to sheet 1; sheet 2 has no rels part
        let bytes = build_package(&[
            ("xl/worksheets/sheet1.xml", worksheet_xml(0, None).into_bytes()),
            ("xl/worksheets/sheet2.xml", worksheet_xml(0, None).into_bytes()),
            (
                "xl/worksheets/_rels/sheet1.xml.rels",
                sheet_rels_xml(&[1]).into_bytes(),
            ),
            (
                "xl/drawings/_rels/drawing1.xml.rels",
                drawing_rels_xml(4).into_bytes(),
            ),
        ]);
        let selection = WorksheetSelector::default().select(&bytes);

        assert_eq!(selection.scores, BTreeMap::from([(1, 100), (2, 0)]));
    }

    #[test]
    fn test_sheet_with_two_drawings_is_unmapped() {
        let bytes = build_package(&[
            ("xl/worksheets/sheet1.xml", worksheet_xml(0, None).into_bytes()),
            (
                "xl/worksheets/_rels/sheet1.xml.rels",
                sheet_rels_xml(&[1, 2]).into_bytes(),
            ),
            (
                "xl/drawings/_rels/drawing1.xml.rels",
                drawing_rels_xml(4).into_bytes(),
            ),
            (
                "xl/drawings/_rels/drawing2.xml.rels",
                drawing_rels_xml(4).into_bytes(),
            ),
        ]);
        let selection = WorksheetSelector::default().select(&bytes);

        assert_eq!(selection.scores[&1], 0);
    }

    #[test]
    fn test_corrupt_relationship_part_is_isolated() {
        let healthy = workbook(&[
            SheetFixture {
                values: 60,
                images: Some(2),
                ..Default::default()
            },
            SheetFixture {
                images: Some(4),
                ..Default::default()
            },
        ]);
        let baseline = WorksheetSelector::default().select(&healthy);
        assert_eq!(baseline.scores, BTreeMap::from([(1, 50), (2, 100)]));

        let bytes = build_package(&[
            ("xl/worksheets/sheet1.xml", worksheet_xml(60, None).into_bytes()),
            (
                "xl/worksheets/_rels/sheet1.xml.rels",
                sheet_rels_xml(&[1]).into_bytes(),
            ),
            (
                "xl/drawings/_rels/drawing1.xml.rels",
                drawing_rels_xml(2).into_bytes(),
            ),
            ("xl/worksheets/sheet2.xml", worksheet_xml(0, None).into_bytes()),
            (
                "xl/worksheets/_rels/sheet2.xml.rels",
                b"<Relationships><Relationship Type=\"".to_vec(),
            ),
            (
                "xl/drawings/_rels/drawing2.xml.rels",
                drawing_rels_xml(4).into_bytes(),
            ),
        ]);
        let selection = WorksheetSelector::default().select(&bytes);

        assert_eq!(selection.scores[&1], baseline.scores[&1]);
        assert_eq!(selection.scores[&2], 0);
        assert_eq!(selection.best_sheet, 1);
    }

    #[test]
    fn test_oversized_worksheet_contributes_images_only() {
        let bytes = workbook(&[SheetFixture {
            values: 200,
            inline_text: Some("BOM123"),
            images: Some(1),
        }]);
        let selector = WorksheetSelector::new(ScoringPolicy::default(), 4096);
        let selection = selector.select(&bytes);

        assert_eq!(selection.scores[&1], 20);
    }

    #[test]
    fn test_vml_drawing_is_not_a_drawing() {
        let rels = r#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/vmlDrawing" Target="../drawings/drawing1.xml"/></Relationships>"#;
        let bytes = build_package(&[
            ("xl/worksheets/sheet1.xml", worksheet_xml(0, None).into_bytes()),
            ("xl/worksheets/_rels/sheet1.xml.rels", rels.as_bytes().to_vec()),
            (
                "xl/drawings/_rels/drawing1.xml.rels",
                drawing_rels_xml(4).into_bytes(),
            ),
        ]);
        let selection = WorksheetSelector::default().select(&bytes);

        assert_eq!(selection.scores[&1], 0);
    }

    #[test]
    fn test_custom_style_code_prefixes() {
        let bytes = workbook(&[
            SheetFixture {
                inline_text: Some("BOM100"),
                ..Default::default()
            },
            SheetFixture {
                inline_text: Some("KX2044"),
                ..Default::default()
            },
        ]);
        let selector = WorksheetSelector::new(ScoringPolicy::new(&["KX"]).unwrap(), 1 << 20);
        let selection = selector.select(&bytes);

        assert_eq!(selection.scores, BTreeMap::from([(1, 0), (2, 30)]));
        assert_eq!(selection.best_sheet, 2);
    }

    #[test]
    fn test_cell_references_are_not_style_codes() {
        let sheet = r#"<worksheet><dimension ref="A1:PN40"/><sheetData><row r="3"><c r="ART3"><v>1</v></c></row></sheetData><mergeCells><mergeCell ref="BOM1:BOM4"/></mergeCells></worksheet>"#;
        let bytes = build_package(&[
            ("xl/worksheets/sheet1.xml", sheet.as_bytes().to_vec()),
            (
                "xl/worksheets/sheet2.xml",
                worksheet_xml(0, Some("REF8812")).into_bytes(),
            ),
        ]);
        let selection = WorksheetSelector::default().select(&bytes);

        assert_eq!(selection.scores, BTreeMap::from([(1, 0), (2, 30)]));
        assert_eq!(selection.best_sheet, 2);
    }

    #[test]
    fn test_zero_padded_worksheet_name_is_ignored() {
        let bytes = build_package(&[
            ("xl/worksheets/sheet1.xml", worksheet_xml(0, None).into_bytes()),
            ("xl/worksheets/sheet01.xml", worksheet_xml(120, None).into_bytes()),
            ("xl/worksheets/sheet2.xml", worksheet_xml(60, None).into_bytes()),
        ]);
        let selection = WorksheetSelector::default().select(&bytes);

        assert_eq!(selection.scores, BTreeMap::from([(1, 0), (2, 10)]));
        assert_eq!(selection.best_sheet, 2);
    }

    #[test]
    fn test_malformed_shared_strings_is_ignored() {
        let bytes = build_package(&[
            ("xl/worksheets/sheet1.xml", worksheet_xml(55, None).into_bytes()),
            ("xl/sharedStrings.xml", b"<sst><si><t>oops</x></si></sst>".to_vec()),
        ]);
        let selection = WorksheetSelector::default().select(&bytes);

        assert_eq!(selection.scores, BTreeMap::from([(1, 10)]));
    }
}
