//! Relationship and worksheet XML parsing.
//!
//! Relationship parts are parsed structurally with quick-xml. A relationship
//! is an image reference when its `Type` ends in `/image`, and a drawing
//! reference when its `Type` ends in `/drawing` (which excludes the
//! `vmlDrawing` parts used for legacy comments).

use quick_xml::Reader;
use quick_xml::events::Event;

/// One `<Relationship>` entry of a `.rels` part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub rel_type: String,
    pub target: String,
}

impl Relationship {
    pub fn is_image(&self) -> bool {
        self.rel_type.ends_with("/image")
    }

    pub fn is_drawing(&self) -> bool {
        self.rel_type.ends_with("/drawing")
    }
}

/// Parse every `<Relationship>` element of a relationship part.
pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut relationships = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut rel_type = String::new();
                    let mut target = String::new();
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Type" => {
                                rel_type = attr.unescape_value().unwrap_or_default().to_string()
                            }
                            b"Target" => {
                                target = attr.unescape_value().unwrap_or_default().to_string()
                            }
                            _ => {}
                        }
                    }
                    relationships.push(Relationship { rel_type, target });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// Number of embedded-image references in a drawing's relationships.
pub fn count_images(relationships: &[Relationship]) -> usize {
    relationships.iter().filter(|r| r.is_image()).count()
}

/// The drawing ordinal a worksheet points at, if it references exactly one drawing.
pub fn single_drawing(relationships: &[Relationship]) -> Option<u32> {
    let mut drawings = relationships.iter().filter(|r| r.is_drawing());
    let only = drawings.next()?;
    if drawings.next().is_some() {
        return None;
    }
    drawing_ordinal(&only.target)
}

/// Ordinal of a drawing from a relationship target such as `../drawings/drawing3.xml`.
pub fn drawing_ordinal(target: &str) -> Option<u32> {
    let file_name = target.rsplit('/').next()?;
    super::package::ordinal_between(file_name, "drawing", ".xml")
}

/// What a worksheet part says about its cells
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorksheetScan {
    /// Literal cell values (`<v>` elements)
    pub values: usize,
    /// Text typed into cells: inline strings and string formula results.
    /// Cell references, ranges and formulas are not included.
    pub cell_text: String,
}

/// Scan a worksheet part for its value count and cell text.
pub fn scan_worksheet(xml: &[u8]) -> Result<WorksheetScan, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);

    let mut scan = WorksheetScan::default();
    let mut string_cell = false;
    let mut in_text = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"c" => {
                    string_cell = e
                        .attributes()
                        .flatten()
                        .any(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"str");
                }
                b"v" => {
                    scan.values += 1;
                    in_text = string_cell;
                }
                b"t" => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"c" => string_cell = false,
                b"v" | b"t" => {
                    if in_text {
                        scan.cell_text.push(' ');
                    }
                    in_text = false;
                }
                _ => {}
            },
            Event::Text(e) if in_text => {
                scan.cell_text.push_str(&e.unescape().unwrap_or_default());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(scan)
}

/// Concatenate the text runs of a shared string table, lower-cased.
pub fn shared_text(xml: &[u8]) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);

    let mut text = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(e) if e.local_name().as_ref() == b"t" => {
                in_text = false;
                text.push(' ');
            }
            Event::Text(e) if in_text => {
                text.push_str(&e.unescape().unwrap_or_default().to_lowercase());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}
