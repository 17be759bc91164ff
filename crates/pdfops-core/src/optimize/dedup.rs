//! Duplicate elimination
//!
//! Objects are compared by a SHA-256 digest of their serialized form, so two
//! objects are merged only when they would be written out byte-for-byte the
//! same.

use std::collections::{BTreeMap, HashMap};

use lopdf::{Dictionary, Document, Object, ObjectId};
use sha2::{Digest, Sha256};

use crate::writer::{write_dict, write_object};

type ObjectKey = [u8; 32];

/// Dictionaries shorter than this stay inline; a reference would not be smaller
const MIN_HOISTED_LEN: usize = 16;

/// Dictionary types that carry identity and must never be merged
const STRUCTURAL_TYPES: &[&[u8]] = &[b"Catalog", b"Pages", b"Page", b"Annot"];

fn object_key(object: &Object) -> ObjectKey {
    let mut bytes = Vec::new();
    write_object(&mut bytes, object);
    Sha256::digest(&bytes).into()
}

fn is_structural(object: &Object) -> bool {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        _ => return false,
    };
    match dict.get(b"Type") {
        Ok(Object::Name(name)) => STRUCTURAL_TYPES.contains(&name.as_slice()),
        _ => false,
    }
}

/// Rewrite references in `object` through `replacements`
fn replace_refs(object: &mut Object, replacements: &BTreeMap<ObjectId, ObjectId>) {
    match object {
        Object::Reference(id) => {
            if let Some(target) = replacements.get(id) {
                *id = *target;
            }
        }
        Object::Array(items) => {
            for item in items.iter_mut() {
                replace_refs(item, replacements);
            }
        }
        Object::Dictionary(dict) => replace_refs_in_dict(dict, replacements),
        Object::Stream(stream) => replace_refs_in_dict(&mut stream.dict, replacements),
        _ => {}
    }
}

fn replace_refs_in_dict(dict: &mut Dictionary, replacements: &BTreeMap<ObjectId, ObjectId>) {
    for (_, value) in dict.iter_mut() {
        replace_refs(value, replacements);
    }
}

/// Drop the duplicates and point every reference at the surviving copy
fn apply_replacements(doc: &mut Document, replacements: &BTreeMap<ObjectId, ObjectId>) {
    for id in replacements.keys() {
        doc.objects.remove(id);
    }
    for object in doc.objects.values_mut() {
        replace_refs(object, replacements);
    }
    for (_, value) in doc.trailer.iter_mut() {
        replace_refs(value, replacements);
    }
}

/// Map every duplicate among the objects accepted by `filter` to its first copy
fn find_duplicates<F>(doc: &Document, filter: F) -> BTreeMap<ObjectId, ObjectId>
where
    F: Fn(&Object) -> bool,
{
    let protected: Vec<ObjectId> = [b"Root".as_slice(), b"Info".as_slice()]
        .iter()
        .filter_map(|key| doc.trailer.get(key).ok()?.as_reference().ok())
        .collect();

    let mut first_seen: HashMap<ObjectKey, ObjectId> = HashMap::new();
    let mut replacements = BTreeMap::new();

    for (id, object) in &doc.objects {
        if !filter(object) || protected.contains(id) {
            continue;
        }
        let key = object_key(object);
        match first_seen.get(&key) {
            Some(original) => {
                replacements.insert(*id, *original);
            }
            None => {
                first_seen.insert(key, *id);
            }
        }
    }

    replacements
}

/// Merge streams with identical dictionaries and data. Returns how many were removed.
pub(crate) fn combine_duplicate_streams(doc: &mut Document) -> usize {
    let replacements = find_duplicates(doc, |object| matches!(object, Object::Stream(_)));
    apply_replacements(doc, &replacements);
    replacements.len()
}

/// Merge identical non-stream indirect objects until nothing changes.
///
/// Merging can make referrers identical in turn (two font dictionaries that
/// pointed at two equal descriptors), hence the fixpoint.
pub(crate) fn combine_identical_indirect_objects(doc: &mut Document) -> usize {
    let mut removed = 0;
    loop {
        let replacements = find_duplicates(doc, |object| {
            !matches!(object, Object::Stream(_)) && !is_structural(object)
        });
        if replacements.is_empty() {
            return removed;
        }
        apply_replacements(doc, &replacements);
        removed += replacements.len();
    }
}

/// Move direct dictionaries that occur more than once into a single shared
/// indirect object. Returns the number of new shared objects.
pub(crate) fn combine_duplicate_direct_objects(doc: &mut Document) -> usize {
    let mut counts: HashMap<ObjectKey, usize> = HashMap::new();
    let mut samples: Vec<(ObjectKey, Dictionary)> = Vec::new();

    // Stream dictionaries are left alone, readers expect /DecodeParms inline
    for object in doc.objects.values() {
        if matches!(object, Object::Stream(_)) {
            continue;
        }
        for_each_child(object, &mut |child| {
            count_direct_dicts(child, &mut counts, &mut samples);
        });
    }

    let mut hoisted: HashMap<ObjectKey, ObjectId> = HashMap::new();
    for (key, dict) in samples {
        if counts.get(&key).copied().unwrap_or(0) < 2 {
            continue;
        }
        let id = doc.add_object(Object::Dictionary(dict));
        hoisted.insert(key, id);
    }
    if hoisted.is_empty() {
        return 0;
    }

    // Only children are replaced, so a shared object never points at itself
    for object in doc.objects.values_mut() {
        match object {
            Object::Dictionary(dict) => hoist_in_dict(dict, &hoisted),
            Object::Array(items) => {
                for item in items.iter_mut() {
                    hoist(item, &hoisted);
                }
            }
            _ => {}
        }
    }

    hoisted.len()
}

fn dict_key(dict: &Dictionary) -> (ObjectKey, usize) {
    let mut bytes = Vec::new();
    write_dict(&mut bytes, dict);
    (Sha256::digest(&bytes).into(), bytes.len())
}

fn for_each_child(object: &Object, visit: &mut dyn FnMut(&Object)) {
    match object {
        Object::Array(items) => items.iter().for_each(|item| visit(item)),
        Object::Dictionary(dict) => dict.iter().for_each(|(_, value)| visit(value)),
        Object::Stream(stream) => stream.dict.iter().for_each(|(_, value)| visit(value)),
        _ => {}
    }
}

fn count_direct_dicts(
    object: &Object,
    counts: &mut HashMap<ObjectKey, usize>,
    samples: &mut Vec<(ObjectKey, Dictionary)>,
) {
    if let Object::Dictionary(dict) = object {
        let (key, len) = dict_key(dict);
        if len >= MIN_HOISTED_LEN {
            let count = counts.entry(key).or_insert(0);
            if *count == 0 {
                samples.push((key, dict.clone()));
            }
            *count += 1;
        }
    }
    for_each_child(object, &mut |child| count_direct_dicts(child, counts, samples));
}

/// Replace the outermost hoisted dictionaries below `dict` with references
fn hoist_in_dict(dict: &mut Dictionary, hoisted: &HashMap<ObjectKey, ObjectId>) {
    for (_, value) in dict.iter_mut() {
        hoist(value, hoisted);
    }
}

fn hoist(object: &mut Object, hoisted: &HashMap<ObjectKey, ObjectId>) {
    let shared = match object {
        Object::Dictionary(dict) => hoisted.get(&dict_key(dict).0).copied(),
        _ => None,
    };
    if let Some(id) = shared {
        *object = Object::Reference(id);
        return;
    }

    match object {
        Object::Dictionary(dict) => hoist_in_dict(dict, hoisted),
        Object::Array(items) => {
            for item in items.iter_mut() {
                hoist(item, hoisted);
            }
        }
        _ => {}
    }
}
