//! GMP response envelopes.
//!
//! Every GMP response is a single XML document whose root element is named
//! after the command (`<get_report_response status="200" ...>`). [`Envelope`]
//! parses that document into a small owned element tree so callers can look
//! up nested values by name or by relative path.
//!
//! Text that follows an element's closing tag is kept as that element's
//! [`tail`](Element::tail). The CSV report format relies on this: the base64
//! payload is emitted directly after the `<report_format>` element.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Envelope parse failure.
#[derive(Debug, thiserror::Error)]
#[error("malformed envelope: {0}")]
pub struct EnvelopeError(pub String);

/// A single XML element with its attributes, text and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Element name (without namespace handling).
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Text before the first child element.
    pub text: String,
    /// Text after this element's closing tag, up to the next sibling.
    pub tail: String,
    /// Child elements in document order.
    pub children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, EnvelopeError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| EnvelopeError(format!("bad attribute in <{name}>: {e}")))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| EnvelopeError(format!("bad attribute value in <{name}>: {e}")))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            ..Self::default()
        })
    }

    /// Returns the value of attribute `key`.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first direct child named `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Iterates over direct children named `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Depth-first search for the first descendant named `name`.
    ///
    /// The element itself is not considered.
    pub fn find(&self, name: &str) -> Option<&Element> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// Follows a `/`-separated chain of direct children, e.g. `"task/name"`.
    pub fn find_path(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |current, segment| current.child(segment))
    }

    /// Trimmed text content before the first child.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Trimmed text following the closing tag.
    pub fn tail(&self) -> &str {
        self.tail.trim()
    }

    fn push_text(&mut self, text: &str) {
        match self.children.last_mut() {
            Some(last) => last.tail.push_str(text),
            None => self.text.push_str(text),
        }
    }
}

/// A parsed GMP response document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    root: Element,
}

impl Envelope {
    /// Parses a complete GMP response document.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] for malformed XML, a missing root element,
    /// more than one root element, or unclosed elements.
    pub fn parse(xml: &str) -> Result<Self, EnvelopeError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                EnvelopeError(format!("at byte {}: {e}", reader.buffer_position()))
            })?;
            match event {
                Event::Start(start) => {
                    if root.is_some() {
                        return Err(EnvelopeError("multiple root elements".to_owned()));
                    }
                    stack.push(Element::from_start(&start)?);
                }
                Event::Empty(start) => {
                    if root.is_some() {
                        return Err(EnvelopeError("multiple root elements".to_owned()));
                    }
                    let element = Element::from_start(&start)?;
                    close_element(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| EnvelopeError("unbalanced closing tag".to_owned()))?;
                    close_element(&mut stack, &mut root, element);
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| EnvelopeError(format!("bad text content: {e}")))?;
                    if let Some(current) = stack.last_mut() {
                        current.push_text(&text);
                    }
                }
                Event::CData(data) => {
                    let data = data.into_inner();
                    if let Some(current) = stack.last_mut() {
                        current.push_text(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(EnvelopeError("unexpected end of document".to_owned()));
        }
        let root = root.ok_or_else(|| EnvelopeError("empty document".to_owned()))?;
        Ok(Self { root })
    }

    /// The response root element.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// The `status` attribute of the root element.
    pub fn status(&self) -> Option<&str> {
        self.root.attr("status")
    }

    /// The `status_text` attribute of the root element.
    pub fn status_text(&self) -> &str {
        self.root.attr("status_text").unwrap_or_default()
    }

    /// True when the daemon reported a 2xx status.
    pub fn is_success(&self) -> bool {
        self.status().is_some_and(|s| s.starts_with('2'))
    }

    /// Shorthand for [`Element::find`] on the root.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.root.find(name)
    }
}

fn close_element(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

/// Checks whether `buf` holds a complete XML document, i.e. its root element
/// has been closed.
pub fn is_complete_document(buf: &[u8]) -> bool {
    DocumentFramer::new().feed(buf)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Text,
    /// Just after `<`.
    Open,
    /// Just after `<!`.
    Bang,
    /// After `<!-`.
    BangDash,
    /// Inside `<![CDATA` before its second `[`.
    CDataOpen,
    Comment { dashes: u8 },
    CData { brackets: u8 },
    Declaration,
    Instruction { question: bool },
    StartTag { quote: Option<u8>, slash: bool },
    EndTag,
}

/// Incremental root-element tracker for a response arriving in pieces.
///
/// Each [`feed`](Self::feed) scans only the new bytes and carries the lexer
/// state across calls, so framing a response costs one pass over its bytes
/// however it was chunked. Comments, CDATA sections, processing instructions
/// and quoted attribute values are skipped, so a `>` inside them never
/// closes an element.
#[derive(Debug, Clone)]
pub struct DocumentFramer {
    state: Scan,
    depth: usize,
    scanned: usize,
    complete: bool,
}

impl Default for DocumentFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentFramer {
    pub fn new() -> Self {
        Self {
            state: Scan::Text,
            depth: 0,
            scanned: 0,
            complete: false,
        }
    }

    /// Scans `bytes` and reports whether the root element has closed.
    ///
    /// Bytes fed after completion are ignored.
    pub fn feed(&mut self, bytes: &[u8]) -> bool {
        for &b in bytes {
            if self.complete {
                break;
            }
            self.scanned += 1;
            self.state = self.step(b);
        }
        self.complete
    }

    /// Whether the root element has closed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Total bytes examined so far.
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    fn step(&mut self, b: u8) -> Scan {
        match self.state {
            Scan::Text => {
                if b == b'<' {
                    Scan::Open
                } else {
                    Scan::Text
                }
            }
            Scan::Open => match b {
                b'/' => Scan::EndTag,
                b'?' => Scan::Instruction { question: false },
                b'!' => Scan::Bang,
                _ => Scan::StartTag {
                    quote: None,
                    slash: false,
                },
            },
            Scan::Bang => match b {
                b'-' => Scan::BangDash,
                b'[' => Scan::CDataOpen,
                b'>' => Scan::Text,
                _ => Scan::Declaration,
            },
            Scan::BangDash => {
                if b == b'-' {
                    Scan::Comment { dashes: 0 }
                } else {
                    Scan::Declaration
                }
            }
            Scan::CDataOpen => match b {
                b'[' => Scan::CData { brackets: 0 },
                b'>' => Scan::Text,
                _ => Scan::CDataOpen,
            },
            Scan::Comment { dashes } => match b {
                b'-' => Scan::Comment {
                    dashes: (dashes + 1).min(2),
                },
                b'>' if dashes == 2 => Scan::Text,
                _ => Scan::Comment { dashes: 0 },
            },
            Scan::CData { brackets } => match b {
                b']' => Scan::CData {
                    brackets: (brackets + 1).min(2),
                },
                b'>' if brackets == 2 => Scan::Text,
                _ => Scan::CData { brackets: 0 },
            },
            Scan::Declaration => {
                if b == b'>' {
                    Scan::Text
                } else {
                    Scan::Declaration
                }
            }
            Scan::Instruction { question } => match b {
                b'>' if question => Scan::Text,
                _ => Scan::Instruction {
                    question: b == b'?',
                },
            },
            Scan::StartTag {
                quote: Some(q),
                slash,
            } => Scan::StartTag {
                quote: (b != q).then_some(q),
                slash,
            },
            Scan::StartTag { quote: None, slash } => match b {
                b'"' | b'\'' => Scan::StartTag {
                    quote: Some(b),
                    slash: false,
                },
                b'>' => {
                    if slash {
                        self.complete = self.depth == 0;
                    } else {
                        self.depth += 1;
                    }
                    Scan::Text
                }
                _ => Scan::StartTag {
                    quote: None,
                    slash: b == b'/',
                },
            },
            Scan::EndTag => {
                if b == b'>' {
                    if self.depth == 1 {
                        self.complete = true;
                    }
                    self.depth = self.depth.saturating_sub(1);
                    Scan::Text
                } else {
                    Scan::EndTag
                }
            }
        }
    }
}
