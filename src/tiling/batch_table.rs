//! Batch table with class hierarchy.
//!
//! [`build_batch_table`] groups instances into a flat property table and a
//! class hierarchy. The result is turned into its JSON document (and, when
//! requested, a binary body holding the numeric columns) by a pure encoding
//! pass, so the table itself is never mutated.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{Result, TileError};
use crate::types::{Instance, PropertyValue};

use super::padding::{pad_in_place, BINARY_FILL, SECTION_ALIGNMENT};

/// Extension name for the class hierarchy.
pub const HIERARCHY_EXTENSION: &str = "3DTILES_batch_table_hierarchy";

/// Property names that would collide with batch-table structure.
const RESERVED_NAMES: [&str; 3] = ["HIERARCHY", "extensions", "extras"];

/// Where the hierarchy object lives in the batch table JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HierarchyLayout {
    /// `extensions.3DTILES_batch_table_hierarchy`
    #[default]
    Extension,
    /// Top-level `HIERARCHY` key.
    Legacy,
}

/// Instances sharing a class name, with per-instance property arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyClass {
    pub name: String,
    /// Number of instances of this class.
    pub length: usize,
    pub instances: IndexMap<String, Vec<PropertyValue>>,
}

/// Parent encoding, chosen from the shape of the parent links.
#[derive(Debug, Clone, PartialEq)]
pub enum ParentLinks {
    /// No instance has a parent. Both arrays are omitted.
    None,
    /// Every instance has at most one parent. Roots point at themselves.
    Single(Vec<u32>),
    /// At least one instance has several parents.
    General { counts: Vec<u32>, ids: Vec<u32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    pub instances_length: usize,
    pub classes: Vec<HierarchyClass>,
    /// Class index per instance.
    pub class_ids: Vec<u32>,
    pub parents: ParentLinks,
}

/// Flat property table plus hierarchy, before encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTable {
    pub properties: IndexMap<String, Vec<PropertyValue>>,
    pub hierarchy: Hierarchy,
}

/// Encoded batch table: JSON document and (possibly empty) binary body.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatchTable {
    pub json: Value,
    pub binary: Vec<u8>,
}

/// Build the flat table and hierarchy from instances in order.
///
/// Instance `i` is batch id `i`. Every property must be present on every
/// instance (flat table) or on every instance of the class (class arrays).
pub fn build_batch_table(instances: &[Instance]) -> Result<BatchTable> {
    if instances.is_empty() {
        return Err(TileError::EmptyInput("no instances for batch table".into()));
    }

    let mut index_by_id: HashMap<&str, usize> = HashMap::with_capacity(instances.len());
    for (i, inst) in instances.iter().enumerate() {
        if index_by_id.insert(inst.id.as_str(), i).is_some() {
            return Err(TileError::InputShape(format!(
                "duplicate instance id '{}'",
                inst.id
            )));
        }
    }

    // Flat table
    let mut properties: IndexMap<String, Vec<PropertyValue>> = IndexMap::new();
    for inst in instances {
        for (name, value) in &inst.properties {
            if RESERVED_NAMES.contains(&name.as_str()) {
                return Err(TileError::InputShape(format!(
                    "property name '{name}' is reserved"
                )));
            }
            properties.entry(name.clone()).or_default().push(value.clone());
        }
    }
    for (name, values) in &properties {
        if values.len() != instances.len() {
            return Err(TileError::InputShape(format!(
                "property '{name}' present on {} of {} instances",
                values.len(),
                instances.len()
            )));
        }
    }

    // Class grouping
    let mut classes: Vec<HierarchyClass> = Vec::new();
    let mut class_index: HashMap<&str, usize> = HashMap::new();
    let mut class_ids = Vec::with_capacity(instances.len());

    for inst in instances {
        let idx = *class_index
            .entry(inst.class_name.as_str())
            .or_insert_with(|| {
                classes.push(HierarchyClass {
                    name: inst.class_name.clone(),
                    length: 0,
                    instances: inst
                        .class_properties
                        .keys()
                        .map(|k| (k.clone(), Vec::new()))
                        .collect(),
                });
                classes.len() - 1
            });

        let class = &mut classes[idx];
        for (name, value) in &inst.class_properties {
            class
                .instances
                .entry(name.clone())
                .or_default()
                .push(value.clone());
        }
        class.length += 1;
        class_ids.push(idx as u32);
    }
    for class in &classes {
        for (name, values) in &class.instances {
            if values.len() != class.length {
                return Err(TileError::InputShape(format!(
                    "class '{}' property '{name}' present on {} of {} instances",
                    class.name,
                    values.len(),
                    class.length
                )));
            }
        }
    }

    // Parent resolution
    let mut counts = Vec::with_capacity(instances.len());
    let mut ids = Vec::new();
    for inst in instances {
        counts.push(inst.parents.len() as u32);
        for parent in &inst.parents {
            let &p = index_by_id.get(parent.as_str()).ok_or_else(|| {
                TileError::UnresolvedParent {
                    instance: inst.id.clone(),
                    parent: parent.clone(),
                }
            })?;
            ids.push(p as u32);
        }
    }
    let parents = select_parent_links(counts, ids);

    debug!(
        instances = instances.len(),
        properties = properties.len(),
        classes = classes.len(),
        "Built batch table"
    );

    Ok(BatchTable {
        properties,
        hierarchy: Hierarchy {
            instances_length: instances.len(),
            classes,
            class_ids,
            parents,
        },
    })
}

/// Pick the smallest parent encoding that represents the links.
fn select_parent_links(counts: Vec<u32>, ids: Vec<u32>) -> ParentLinks {
    let max = counts.iter().copied().max().unwrap_or(0);
    match max {
        0 => ParentLinks::None,
        1 => {
            let mut resolved = ids.into_iter();
            let single = counts
                .iter()
                .enumerate()
                .map(|(i, &c)| {
                    if c == 0 {
                        i as u32
                    } else {
                        resolved.next().unwrap_or(i as u32)
                    }
                })
                .collect();
            ParentLinks::Single(single)
        }
        _ => ParentLinks::General { counts, ids },
    }
}

impl BatchTable {
    /// Number of features (`BATCH_LENGTH`).
    pub fn batch_length(&self) -> usize {
        self.hierarchy.instances_length
    }

    /// Encode with every column inline.
    pub fn to_json(&self, layout: HierarchyLayout) -> Result<Value> {
        self.encode_with(&mut ColumnEncoder::Inline, layout)
    }

    /// Encode numeric columns into a binary body referenced from the JSON.
    ///
    /// String and mixed columns stay inline. `classIds` and parent arrays are
    /// always `UNSIGNED_SHORT`.
    pub fn encode_binary(&self, layout: HierarchyLayout) -> Result<EncodedBatchTable> {
        let mut encoder = ColumnEncoder::Binary(Vec::new());
        let json = self.encode_with(&mut encoder, layout)?;
        let binary = match encoder {
            ColumnEncoder::Binary(bytes) => bytes,
            ColumnEncoder::Inline => Vec::new(),
        };
        Ok(EncodedBatchTable { json, binary })
    }

    pub fn encode(&self, layout: HierarchyLayout, binary: bool) -> Result<EncodedBatchTable> {
        if binary {
            self.encode_binary(layout)
        } else {
            Ok(EncodedBatchTable {
                json: self.to_json(layout)?,
                binary: Vec::new(),
            })
        }
    }

    fn encode_with(&self, encoder: &mut ColumnEncoder, layout: HierarchyLayout) -> Result<Value> {
        let mut table = Map::new();
        for (name, values) in &self.properties {
            table.insert(name.clone(), encoder.column(values));
        }

        let h = &self.hierarchy;
        let mut classes = Vec::with_capacity(h.classes.len());
        for class in &h.classes {
            let mut instances = Map::new();
            for (name, values) in &class.instances {
                instances.insert(name.clone(), encoder.column(values));
            }
            classes.push(json!({
                "name": class.name,
                "length": class.length,
                "instances": instances,
            }));
        }

        let mut hierarchy = Map::new();
        hierarchy.insert("instancesLength".into(), json!(h.instances_length));
        hierarchy.insert("classes".into(), Value::Array(classes));
        hierarchy.insert("classIds".into(), encoder.index_array(&h.class_ids, "classIds")?);
        match &h.parents {
            ParentLinks::None => {}
            ParentLinks::Single(ids) => {
                hierarchy.insert("parentIds".into(), encoder.index_array(ids, "parentIds")?);
            }
            ParentLinks::General { counts, ids } => {
                hierarchy.insert(
                    "parentCounts".into(),
                    encoder.index_array(counts, "parentCounts")?,
                );
                hierarchy.insert("parentIds".into(), encoder.index_array(ids, "parentIds")?);
            }
        }

        match layout {
            HierarchyLayout::Extension => {
                let mut extensions = Map::new();
                extensions.insert(HIERARCHY_EXTENSION.into(), Value::Object(hierarchy));
                table.insert("extensions".into(), Value::Object(extensions));
            }
            HierarchyLayout::Legacy => {
                table.insert("HIERARCHY".into(), Value::Object(hierarchy));
            }
        }

        Ok(Value::Object(table))
    }
}

/// Writes one column either inline or into the shared binary body.
enum ColumnEncoder {
    Inline,
    Binary(Vec<u8>),
}

impl ColumnEncoder {
    fn column(&mut self, values: &[PropertyValue]) -> Value {
        let numbers: Option<Vec<f64>> = values.iter().map(PropertyValue::as_number).collect();
        match (self, numbers) {
            (ColumnEncoder::Binary(body), Some(numbers)) => {
                let exact_f32 = numbers.iter().all(|&v| (v as f32) as f64 == v);
                let byte_offset = body.len();
                let component_type = if exact_f32 {
                    for v in &numbers {
                        body.extend_from_slice(&(*v as f32).to_le_bytes());
                    }
                    "FLOAT"
                } else {
                    for v in &numbers {
                        body.extend_from_slice(&v.to_le_bytes());
                    }
                    "DOUBLE"
                };
                pad_in_place(body, 0, SECTION_ALIGNMENT, BINARY_FILL);
                json!({
                    "byteOffset": byte_offset,
                    "componentType": component_type,
                    "type": "SCALAR",
                })
            }
            _ => Value::Array(values.iter().map(property_json).collect()),
        }
    }

    fn index_array(&mut self, values: &[u32], field: &str) -> Result<Value> {
        match self {
            ColumnEncoder::Inline => Ok(json!(values)),
            ColumnEncoder::Binary(body) => {
                let byte_offset = body.len();
                for &v in values {
                    let v = u16::try_from(v).map_err(|_| {
                        TileError::InputShape(format!(
                            "{field} value {v} does not fit UNSIGNED_SHORT"
                        ))
                    })?;
                    body.extend_from_slice(&v.to_le_bytes());
                }
                pad_in_place(body, 0, SECTION_ALIGNMENT, BINARY_FILL);
                Ok(json!({
                    "byteOffset": byte_offset,
                    "componentType": "UNSIGNED_SHORT",
                }))
            }
        }
    }
}

fn property_json(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Number(n) => json!(n),
        PropertyValue::Text(s) => json!(s),
    }
}
