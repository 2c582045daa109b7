//! Page compositing: drawing the stamp onto selected pages of a document
//!
//! The compositor loads a PDF from memory, embeds the image XObject once,
//! then for each selected page reads that page's own dimensions, resolves
//! placement against them, and appends a content stream drawing the image.
//! Existing page content always stays beneath the stamp, and page count and
//! order are never altered.
//!
//! Failure is contained at whole-document granularity: any error means no
//! output for this document, never a partially modified one.

use crate::asset::ImageAsset;
use crate::config::PlacementConfig;
use crate::error::PdfStampError;
use crate::placement;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Result of stamping one document.
#[derive(Debug, Clone)]
pub struct StampOutput {
    /// The serialized modified document.
    pub bytes: Vec<u8>,
    pub page_count: u32,
    pub pages_stamped: u32,
}

/// Stamp `image` onto the pages of `pdf_bytes` selected by `config`.
pub fn attach_image(
    pdf_bytes: &[u8],
    image: &ImageAsset,
    config: &PlacementConfig,
) -> Result<StampOutput, PdfStampError> {
    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| PdfStampError::ParseError(e.to_string()))?;

    // BTreeMap keyed by page number, so iteration is in document order.
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let total = pages.len();

    let selected: Vec<ObjectId> = pages
        .iter()
        .enumerate()
        .filter(|(i, _)| config.pages.selects(*i, total))
        .map(|(_, id)| *id)
        .collect();

    if !selected.is_empty() {
        let image_id = doc.add_object(Object::Stream(image.to_stream()));

        for &page_id in &selected {
            stamp_page(&mut doc, page_id, image_id, image, config)?;
        }
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| PdfStampError::SerializationError(e.to_string()))?;

    Ok(StampOutput {
        bytes: output,
        page_count: total as u32,
        pages_stamped: selected.len() as u32,
    })
}

fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    image_id: ObjectId,
    image: &ImageAsset,
    config: &PlacementConfig,
) -> Result<(), PdfStampError> {
    let media_box = page_media_box(doc, page_id)?;
    let page_width = media_box[2] - media_box[0];
    let page_height = media_box[3] - media_box[1];

    let placed = placement::resolve(image, config, page_width, page_height);
    if !(placed.width.is_finite()
        && placed.height.is_finite()
        && placed.x.is_finite()
        && placed.y.is_finite())
    {
        return Err(PdfStampError::RenderError(format!(
            "Non-finite stamp geometry ({} x {} at {}, {})",
            placed.width, placed.height, placed.x, placed.y
        )));
    }

    let name = register_image_resource(doc, page_id, image_id)?;

    // q/Q brackets the transform so existing content is unaffected; the cm
    // matrix maps the unit image square to the resolved rectangle.
    let ops = format!(
        "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
        placed.width, placed.height, placed.x, placed.y, name
    );
    append_page_content(doc, page_id, ops.into_bytes())
}

/// Read a page's MediaBox, resolving indirect values and walking up the page
/// tree for inherited boxes. Malformed documents get the US Letter default
/// rather than an error.
fn page_media_box(doc: &Document, page_id: ObjectId) -> Result<[f64; 4], PdfStampError> {
    let page = doc
        .get_object(page_id)
        .map_err(|e| PdfStampError::RenderError(format!("Missing page object: {}", e)))?;
    Ok(media_box_recursive(doc, page, 10))
}

fn media_box_recursive(doc: &Document, node: &Object, depth: usize) -> [f64; 4] {
    const US_LETTER: [f64; 4] = [0.0, 0.0, 612.0, 792.0];
    if depth == 0 {
        return US_LETTER;
    }

    let dict = match node.as_dict() {
        Ok(d) => d,
        Err(_) => return US_LETTER,
    };

    if let Ok(raw) = dict.get(b"MediaBox") {
        let arr = match raw {
            Object::Array(arr) => Some(arr),
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(Object::Array(arr)) => Some(arr),
                _ => None,
            },
            _ => None,
        };
        if let Some(arr) = arr {
            let values: Vec<f64> = arr
                .iter()
                .filter_map(|o| match o {
                    Object::Integer(i) => Some(*i as f64),
                    Object::Real(r) => Some(f64::from(*r)),
                    _ => None,
                })
                .collect();
            if values.len() == 4 {
                return [values[0], values[1], values[2], values[3]];
            }
        }
    }

    if let Ok(Object::Reference(parent_id)) = dict.get(b"Parent") {
        if let Ok(parent) = doc.get_object(*parent_id) {
            return media_box_recursive(doc, parent, depth - 1);
        }
    }

    US_LETTER
}

/// Where the mutable XObject dictionary for a page lives.
enum XObjectSlot {
    /// `Resources` and `XObject` are both inline in the page dictionary.
    PageInline,
    /// `Resources` is an indirect object holding the `XObject` dict inline.
    ResourcesObject(ObjectId),
    /// The `XObject` dict is itself an indirect object.
    XObjectObject(ObjectId),
    /// The page inherits `Resources` held inline on an ancestor `Pages`
    /// node. A page-level entry would shadow the inherited dictionary
    /// entirely, so the page gets a copy of it with the image added,
    /// keeping the original content's resource names resolvable and
    /// sibling pages untouched.
    CloneInherited(Dictionary),
    /// Neither the page nor its ancestors carry `Resources`.
    MissingResources,
}

/// Walk the `Parent` chain for an inherited `Resources` entry, mirroring how
/// MediaBox inheritance is resolved.
fn inherited_resources<'a>(doc: &'a Document, page_dict: &'a Dictionary) -> Option<&'a Object> {
    let mut node = page_dict;
    for _ in 0..10 {
        let Ok(Object::Reference(parent_id)) = node.get(b"Parent") else {
            return None;
        };
        let parent = doc.get_object(*parent_id).ok()?.as_dict().ok()?;
        if let Ok(resources) = parent.get(b"Resources") {
            return Some(resources);
        }
        node = parent;
    }
    None
}

/// Register the embedded image in the page's resources under a fresh `/ImN`
/// name, or reuse the existing name when this document's stamp is already
/// registered (pages can share one Resources dictionary).
fn register_image_resource(
    doc: &mut Document,
    page_id: ObjectId,
    image_id: ObjectId,
) -> Result<String, PdfStampError> {
    let render_err =
        |e: lopdf::Error| PdfStampError::RenderError(format!("Page resources: {}", e));

    // Read phase: locate the XObject dictionary and pick a name without
    // holding any mutable borrow.
    let page_dict = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(render_err)?;

    let (resources_entry, inherited) = match page_dict.get(b"Resources") {
        Ok(raw) => (Some(raw), false),
        Err(_) => (inherited_resources(doc, page_dict), true),
    };

    let (slot, xobjects) = match resources_entry {
        None => (XObjectSlot::MissingResources, None),
        Some(resources_raw) => {
            let (resources_id, resources) = match resources_raw {
                Object::Reference(id) => (
                    Some(*id),
                    doc.get_object(*id)
                        .and_then(Object::as_dict)
                        .map_err(render_err)?,
                ),
                Object::Dictionary(d) => (None, d),
                _ => {
                    return Err(PdfStampError::RenderError(
                        "Page Resources is neither a dictionary nor a reference".to_string(),
                    ))
                }
            };

            match resources.get(b"XObject") {
                Ok(Object::Reference(xid)) => {
                    let dict = doc
                        .get_object(*xid)
                        .and_then(Object::as_dict)
                        .map_err(render_err)?;
                    (XObjectSlot::XObjectObject(*xid), Some(dict))
                }
                Ok(Object::Dictionary(d)) => match (resources_id, inherited) {
                    (Some(rid), _) => (XObjectSlot::ResourcesObject(rid), Some(d)),
                    (None, false) => (XObjectSlot::PageInline, Some(d)),
                    (None, true) => (XObjectSlot::CloneInherited(resources.clone()), Some(d)),
                },
                _ => match (resources_id, inherited) {
                    (Some(rid), _) => (XObjectSlot::ResourcesObject(rid), None),
                    (None, false) => (XObjectSlot::PageInline, None),
                    (None, true) => (XObjectSlot::CloneInherited(resources.clone()), None),
                },
            }
        }
    };

    let name = match xobjects {
        Some(dict) => {
            if let Some(existing) = find_registered_name(dict, image_id) {
                return Ok(existing);
            }
            free_image_name(dict)
        }
        None => "Im0".to_string(),
    };

    // Mutation phase.
    let entry = Object::Reference(image_id);
    match slot {
        XObjectSlot::XObjectObject(xid) => {
            doc.get_object_mut(xid)
                .and_then(Object::as_dict_mut)
                .map_err(render_err)?
                .set(name.as_bytes(), entry);
        }
        XObjectSlot::ResourcesObject(rid) => {
            let resources = doc
                .get_object_mut(rid)
                .and_then(Object::as_dict_mut)
                .map_err(render_err)?;
            set_in_xobject_dict(resources, &name, entry);
        }
        XObjectSlot::PageInline => {
            let page = doc
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(render_err)?;
            if let Ok(Object::Dictionary(resources)) = page.get_mut(b"Resources") {
                set_in_xobject_dict(resources, &name, entry);
            }
        }
        XObjectSlot::CloneInherited(mut resources) => {
            set_in_xobject_dict(&mut resources, &name, entry);
            let page = doc
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(render_err)?;
            page.set("Resources", resources);
        }
        XObjectSlot::MissingResources => {
            let page = doc
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(render_err)?;
            page.set(
                "Resources",
                dictionary! {
                    "XObject" => dictionary! { name.as_bytes() => entry },
                },
            );
        }
    }

    Ok(name)
}

fn set_in_xobject_dict(resources: &mut Dictionary, name: &str, entry: Object) {
    if let Ok(Object::Dictionary(xobjects)) = resources.get_mut(b"XObject") {
        xobjects.set(name.as_bytes(), entry);
    } else {
        resources.set("XObject", dictionary! { name.as_bytes() => entry });
    }
}

fn find_registered_name(xobjects: &Dictionary, image_id: ObjectId) -> Option<String> {
    xobjects.iter().find_map(|(key, value)| match value {
        Object::Reference(id) if *id == image_id => {
            Some(String::from_utf8_lossy(key).into_owned())
        }
        _ => None,
    })
}

fn free_image_name(xobjects: &Dictionary) -> String {
    (0..)
        .map(|n| format!("Im{}", n))
        .find(|candidate| !xobjects.has(candidate.as_bytes()))
        .unwrap_or_else(|| "Im0".to_string())
}

/// Append a content stream to a page, preserving whatever is already there.
fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
) -> Result<(), PdfStampError> {
    let content_id = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), content)));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfStampError::RenderError(format!("Page contents: {}", e)))?;

    match page.get(b"Contents").ok().cloned() {
        Some(Object::Reference(existing)) => {
            page.set(
                "Contents",
                Object::Array(vec![
                    Object::Reference(existing),
                    Object::Reference(content_id),
                ]),
            );
        }
        Some(Object::Array(mut arr)) => {
            arr.push(Object::Reference(content_id));
            page.set("Contents", Object::Array(arr));
        }
        _ => {
            page.set("Contents", Object::Reference(content_id));
        }
    }
    Ok(())
}
