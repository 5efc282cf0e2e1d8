use crate::{pdf_utils, ExtractError};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use tracing::debug;

/// Page tree inheritance is abandoned after this many `/Parent` hops.
const MAX_PARENT_DEPTH: usize = 64;

/// Where the data of an image drawn by a page lives.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// An image XObject, painted with `Do`.
    XObject(ObjectId),

    /// An inline image (`BI … ID … EI`) from a content stream. Its dictionary
    /// uses the full key names of an image XObject.
    Inline(Stream),
}

/// Handles discovery of the images a page draws.
///
/// Images are reported in the order the page's content stream paints them
/// (`Do` operators and inline images), descending into Form XObjects. A form
/// that is already being walked is not entered again, so self-referencing
/// forms terminate while a form painted twice is reported twice. When the
/// content stream cannot be decoded, the page's `/XObject` resource dictionary
/// is listed in its stored order instead.
pub struct PageImageDiscovery<'a> {
    document: &'a Document,
}

impl<'a> PageImageDiscovery<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Collect every image drawn by `page_id`, in paint order. An image
    /// painted twice appears twice.
    pub fn collect_page_images(&self, page_id: ObjectId) -> Vec<ImageSource> {
        let mut images = Vec::new();
        let resources = self.page_resources(page_id);

        let mut active = HashSet::new();
        let decoded = self
            .document
            .get_page_content(page_id)
            .and_then(|data| Content::decode(&data));
        match decoded {
            Ok(content) => self.walk_content(&content, resources, &mut active, &mut images),
            Err(e) => {
                debug!(?page_id, error = %e, "content stream unreadable, using resource order");
                if let Some(resources) = resources {
                    self.walk_resources(resources, &mut active, &mut images);
                }
            }
        }
        images
    }

    /// Resolve the `/Resources` dictionary of a page, following the page tree
    /// upward when the page inherits it.
    fn page_resources(&self, page_id: ObjectId) -> Option<&'a Dictionary> {
        let mut node = self.document.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_PARENT_DEPTH {
            if let Some(resources) = pdf_utils::dict_entry(self.document, node, b"Resources") {
                return Some(resources);
            }
            let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
            node = self.document.get_dictionary(parent).ok()?;
        }
        None
    }

    fn walk_content(
        &self,
        content: &Content,
        resources: Option<&'a Dictionary>,
        active: &mut HashSet<ObjectId>,
        out: &mut Vec<ImageSource>,
    ) {
        let xobjects = resources.and_then(|r| pdf_utils::dict_entry(self.document, r, b"XObject"));

        for operation in &content.operations {
            match operation.operator.as_str() {
                "Do" => {
                    let (Some(xobjects), Some(resources)) = (xobjects, resources) else {
                        continue;
                    };
                    let Some(name) = operation.operands.first().and_then(|o| o.as_name().ok()) else {
                        continue;
                    };
                    let Some(id) = xobjects.get(name).ok().and_then(|v| v.as_reference().ok()) else {
                        continue;
                    };
                    self.visit_xobject(id, resources, active, out);
                }
                "BI" => {
                    if let Some(Object::Stream(inline)) = operation.operands.first() {
                        out.push(ImageSource::Inline(expand_inline(inline)));
                    }
                }
                _ => {}
            }
        }
    }

    fn walk_resources(
        &self,
        resources: &'a Dictionary,
        active: &mut HashSet<ObjectId>,
        out: &mut Vec<ImageSource>,
    ) {
        let Some(xobjects) = pdf_utils::dict_entry(self.document, resources, b"XObject") else {
            return;
        };
        for (_, value) in xobjects.iter() {
            if let Ok(id) = value.as_reference() {
                self.visit_xobject(id, resources, active, out);
            }
        }
    }

    /// Record `id` when it is an image, or descend into it when it is a form.
    fn visit_xobject(
        &self,
        id: ObjectId,
        resources: &'a Dictionary,
        active: &mut HashSet<ObjectId>,
        out: &mut Vec<ImageSource>,
    ) {
        let Ok(stream) = self.document.get_object(id).and_then(|o| o.as_stream()) else {
            return;
        };
        let subtype = stream.dict.get(b"Subtype").and_then(|s| s.as_name());
        match subtype {
            Ok(b"Image") => out.push(ImageSource::XObject(id)),
            Ok(b"Form") => {
                if !active.insert(id) {
                    debug!(form = ?id, "form draws itself, not descending again");
                    return;
                }
                // Forms without their own resources use the enclosing ones.
                let form_resources =
                    pdf_utils::dict_entry(self.document, &stream.dict, b"Resources").unwrap_or(resources);
                let decoded = pdf_utils::stream_data(self.document, stream)
                    .and_then(|data| Content::decode(&data).map_err(ExtractError::from));
                match decoded {
                    Ok(content) => self.walk_content(&content, Some(form_resources), active, out),
                    Err(e) => {
                        debug!(form = ?id, error = %e, "form content unreadable, using resource order");
                        self.walk_resources(form_resources, active, out);
                    }
                }
                active.remove(&id);
            }
            _ => {}
        }
    }
}

/// Rewrite an inline image dictionary with the key and color space names an
/// image XObject would use, so it decodes like one.
fn expand_inline(inline: &Stream) -> Stream {
    let mut dict = Dictionary::new();
    for (key, value) in inline.dict.iter() {
        let key = inline_key(key);
        let value = match (key, value) {
            (b"ColorSpace", Object::Name(name)) => Object::Name(inline_color_space(name).to_vec()),
            _ => value.clone(),
        };
        dict.set(key, value);
    }
    Stream::new(dict, inline.content.clone())
}

fn inline_key(key: &[u8]) -> &[u8] {
    let full: &[u8] = match key {
        b"W" => b"Width",
        b"H" => b"Height",
        b"BPC" => b"BitsPerComponent",
        b"CS" => b"ColorSpace",
        b"F" => b"Filter",
        b"DP" => b"DecodeParms",
        b"IM" => b"ImageMask",
        b"D" => b"Decode",
        b"I" => b"Interpolate",
        other => return other,
    };
    full
}

fn inline_color_space(name: &[u8]) -> &[u8] {
    let full: &[u8] = match name {
        b"G" | b"Gray" => b"DeviceGray",
        b"RGB" => b"DeviceRGB",
        b"CMYK" => b"DeviceCMYK",
        b"I" => b"Indexed",
        other => return other,
    };
    full
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn inline_abbreviations_are_expanded() {
        let inline = Stream::new(
            dictionary! { "W" => 2, "H" => 1, "CS" => "RGB", "BPC" => 8, "IM" => false },
            vec![0; 6],
        );
        let expanded = expand_inline(&inline);
        let dict = &expanded.dict;
        assert_eq!(dict.get(b"Width").unwrap().as_i64().unwrap(), 2);
        assert_eq!(dict.get(b"Height").unwrap().as_i64().unwrap(), 1);
        assert_eq!(dict.get(b"BitsPerComponent").unwrap().as_i64().unwrap(), 8);
        assert_eq!(dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceRGB");
        assert!(!dict.get(b"ImageMask").unwrap().as_bool().unwrap());
        assert_eq!(expanded.content, vec![0; 6]);
    }

    #[test]
    fn inline_images_are_listed_in_paint_order() {
        let doc = Document::new();
        let content =
            Content::decode(b"BI /W 1 /H 1 /CS /Gray /BPC 8 ID \x10 EI\nq BI /W 1 /H 1 /CS /Gray /BPC 8 ID 0 EI Q").unwrap();
        let mut out = Vec::new();
        PageImageDiscovery::new(&doc).walk_content(&content, None, &mut HashSet::new(), &mut out);
        let data: Vec<Vec<u8>> = out
            .iter()
            .map(|source| match source {
                ImageSource::Inline(stream) => stream.content.clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(data, vec![vec![0x10], vec![b'0']]);
    }
}
