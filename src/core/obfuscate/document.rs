//! Interface Builder document rewriting.
//!
//! Storyboards and xibs reference code by name: `customClass` on any element
//! and `selector` on `action` elements. Both are renamed through the
//! completed `NameTable`, scoped by the module that owns the element. The
//! document is streamed and only the replaced attribute values change; quote
//! style and spacing inside a rewritten tag are kept as written.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use super::NameTable;
use crate::error::{Error, Result};

/// How the destination of an `action` is resolved to its module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetIndex {
    /// Only elements enclosing the action are searched. Any other target
    /// counts as belonging to no module.
    DocumentOrder,
    /// Every id in the document is indexed before rewriting starts.
    #[default]
    Prescan,
}

/// Selectors with a first component this short are left alone.
const MIN_SELECTOR_NAME_LENGTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSubstitution {
    pub attribute: String,
    pub original: String,
    pub generated: String,
    pub module: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOutcome {
    pub content: String,
    pub substitutions: Vec<DocumentSubstitution>,
}

struct OpenElement {
    id: Option<String>,
    declared_module: Option<String>,
    module: String,
}

/// Attributes of interest, decoded once per element.
#[derive(Default)]
struct ElementInfo {
    id: Option<String>,
    custom_module: Option<String>,
    custom_class: Option<String>,
    selector: Option<String>,
    destination: Option<String>,
}

fn element_info(start: &BytesStart<'_>, path: &str) -> Result<ElementInfo> {
    let mut info = ElementInfo::default();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::document_invalid_xml(path, e.to_string()))?;
        let slot = match attr.key.as_ref() {
            b"id" => &mut info.id,
            b"customModule" => &mut info.custom_module,
            b"customClass" => &mut info.custom_class,
            b"selector" => &mut info.selector,
            b"destination" => &mut info.destination,
            _ => continue,
        };
        let value = attr
            .unescape_value()
            .map_err(|e| Error::document_invalid_xml(path, e.to_string()))?;
        *slot = Some(value.into_owned());
    }
    Ok(info)
}

fn module_allowed(modules: Option<&BTreeSet<String>>, module: &str) -> bool {
    modules.map_or(true, |set| set.contains(module))
}

/// id -> declared `customModule` ("" when absent) for every element.
fn prescan_ids(xml: &str, path: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut ids = HashMap::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let info = element_info(&e, path)?;
                if let Some(id) = info.id {
                    ids.insert(id, info.custom_module.unwrap_or_default());
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::document_invalid_xml(path, e.to_string())),
        }
    }
    Ok(ids)
}

/// Byte range of the raw value of attribute `key` within a start tag's
/// content (name and attributes, without `<` and `>`).
fn attribute_value_span(content: &[u8], name_len: usize, key: &[u8]) -> Option<Range<usize>> {
    let len = content.len();
    let skip_space = |mut i: usize| {
        while i < len && content[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    };

    let mut i = name_len;
    loop {
        i = skip_space(i);
        let key_start = i;
        while i < len && content[i] != b'=' && !content[i].is_ascii_whitespace() {
            i += 1;
        }
        let found = &content[key_start..i];
        i = skip_space(i);
        if content.get(i) != Some(&b'=') {
            return None;
        }
        i = skip_space(i + 1);
        let quote = *content.get(i).filter(|q| **q == b'"' || **q == b'\'')?;
        let value_start = i + 1;
        let value_end = value_start + content[value_start..].iter().position(|b| *b == quote)?;
        if found == key {
            return Some(value_start..value_end);
        }
        i = value_end + 1;
    }
}

fn write_error(path: &str, err: impl std::fmt::Display) -> Error {
    Error::document_invalid_xml(path, format!("write failed: {}", err))
}

struct DocumentRewriter<'a> {
    table: &'a NameTable,
    modules: Option<&'a BTreeSet<String>>,
    ids: Option<HashMap<String, String>>,
    open: Vec<OpenElement>,
    substitutions: Vec<DocumentSubstitution>,
    path: &'a str,
}

impl DocumentRewriter<'_> {
    fn target_module(&self, info: &ElementInfo, destination: &str) -> String {
        if let Some(ids) = &self.ids {
            return ids.get(destination).cloned().unwrap_or_default();
        }
        if info.id.as_deref() == Some(destination) {
            return info.custom_module.clone().unwrap_or_default();
        }
        self.open
            .iter()
            .rev()
            .find(|el| el.id.as_deref() == Some(destination))
            .and_then(|el| el.declared_module.clone())
            .unwrap_or_default()
    }

    /// Returns the rewritten start tag, or `None` when nothing changed.
    /// Pushes the element onto the open stack when `opens` is set.
    fn visit(&mut self, start: &BytesStart<'_>, opens: bool) -> Result<Option<BytesStart<'static>>> {
        let table = self.table;
        let info = element_info(start, self.path)?;
        let module = info
            .custom_module
            .clone()
            .or_else(|| self.open.last().map(|el| el.module.clone()))
            .unwrap_or_default();

        let mut class_replacement = None;
        if let Some(class) = info.custom_class.as_deref() {
            if module_allowed(self.modules, &module) {
                if let Some(generated) = table.get(class) {
                    class_replacement = Some(generated.to_string());
                    self.record("customClass", class, generated, &module);
                }
            }
        }

        let mut selector_replacement = None;
        if start.name().as_ref() == b"action" {
            if let Some(selector) = info.selector.as_deref() {
                let name = selector.split(':').next().unwrap_or(selector);
                if name.chars().count() >= MIN_SELECTOR_NAME_LENGTH {
                    if let Some(generated) = table.get(name) {
                        let destination = info.destination.as_deref().unwrap_or("");
                        let target_module = self.target_module(&info, destination);
                        if module_allowed(self.modules, &target_module) {
                            selector_replacement = Some(format!("{}:", generated));
                            self.record("selector", name, generated, &target_module);
                        }
                    }
                }
            }
        }

        if opens {
            self.open.push(OpenElement {
                id: info.id.clone(),
                declared_module: info.custom_module.clone(),
                module,
            });
        }

        if class_replacement.is_none() && selector_replacement.is_none() {
            return Ok(None);
        }

        let raw = std::str::from_utf8(start)
            .map_err(|e| Error::document_invalid_xml(self.path, e.to_string()))?;
        let name_len = start.name().as_ref().len();
        let mut edits: Vec<(Range<usize>, String)> = [
            (b"customClass".as_slice(), class_replacement),
            (b"selector".as_slice(), selector_replacement),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            let value = value?;
            let span = attribute_value_span(raw.as_bytes(), name_len, key)?;
            Some((span, value))
        })
        .collect();
        edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));

        let mut content = raw.to_string();
        for (span, value) in edits {
            content.replace_range(span, &value);
        }
        Ok(Some(BytesStart::from_content(content, name_len)))
    }

    fn record(&mut self, attribute: &str, original: &str, generated: &str, module: &str) {
        log_status!(
            "document",
            "{}: {} -> {} ({})",
            attribute,
            original,
            generated,
            if module.is_empty() { "no module" } else { module }
        );
        self.substitutions.push(DocumentSubstitution {
            attribute: attribute.to_string(),
            original: original.to_string(),
            generated: generated.to_string(),
            module: module.to_string(),
        });
    }
}

/// Rewrite one Interface Builder document.
///
/// `modules` restricts renaming to elements owned by those modules; `None`
/// allows every module, including elements with no module at all.
pub fn rewrite_document(
    xml: &str,
    table: &NameTable,
    modules: Option<&BTreeSet<String>>,
    target_index: TargetIndex,
    path: &str,
) -> Result<DocumentOutcome> {
    let ids = match target_index {
        TargetIndex::Prescan => Some(prescan_ids(xml, path)?),
        TargetIndex::DocumentOrder => None,
    };

    let mut rewriter = DocumentRewriter {
        table,
        modules,
        ids,
        open: Vec::new(),
        substitutions: Vec::new(),
        path,
    };

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let write_err = |e| write_error(path, e);

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::document_invalid_xml(path, e.to_string()))?;
        match event {
            Event::Start(start) => match rewriter.visit(&start, true)? {
                Some(rewritten) => writer.write_event(Event::Start(rewritten)),
                None => writer.write_event(Event::Start(start)),
            }
            .map_err(write_err)?,
            Event::Empty(start) => match rewriter.visit(&start, false)? {
                Some(rewritten) => writer.write_event(Event::Empty(rewritten)),
                None => writer.write_event(Event::Empty(start)),
            }
            .map_err(write_err)?,
            Event::End(end) => {
                rewriter.open.pop();
                writer.write_event(Event::End(end)).map_err(write_err)?;
            }
            Event::Eof => break,
            other => writer.write_event(other).map_err(write_err)?,
        }
    }

    let content = String::from_utf8(writer.into_inner())
        .map_err(|e| Error::document_invalid_xml(path, e.to_string()))?;

    Ok(DocumentOutcome {
        content,
        substitutions: rewriter.substitutions,
    })
}
