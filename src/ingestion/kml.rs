use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, TileError};
use crate::transform::Placement;
use crate::types::{Properties, PropertyValue};

/// One `<Placemark>`: a model asset and where it goes.
#[derive(Debug, Clone, PartialEq)]
pub struct Placemark {
    /// Position in the document; default batch id.
    pub id: usize,
    pub name: String,
    /// glTF asset path, resolved against the document directory.
    pub url: PathBuf,
    pub placement: Placement,
    /// `<ExtendedData>` values.
    pub properties: Properties,
}

impl Placemark {
    /// `[lon, lat, alt]`, the form bounding-region code works on.
    pub fn location(&self) -> [f64; 3] {
        [
            self.placement.longitude,
            self.placement.latitude,
            self.placement.altitude,
        ]
    }
}

/// Read a placemark document (`config.xml`).
pub fn load_placemarks(path: &Path) -> Result<Vec<Placemark>> {
    let content = fs::read_to_string(path).map_err(|e| {
        TileError::Input(format!("Failed to read {}: {e}", path.display()))
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_placemarks(&content, base_dir)
}

/// Extract every `<Placemark>` with a `<Model>` from KML text.
pub fn parse_placemarks(content: &str, base_dir: &Path) -> Result<Vec<Placemark>> {
    let mut placemarks = Vec::new();

    for block in elements(content, "Placemark") {
        let id = placemarks.len();
        let name = element(block, "name")
            .map(unescape)
            .unwrap_or_else(|| format!("placemark_{id}"));

        let Some(model) = element(block, "Model") else {
            warn!(name = %name, "Placemark without <Model>, skipping");
            continue;
        };

        let location = element(model, "Location").ok_or_else(|| {
            TileError::Input(format!("Placemark '{name}' has no <Location>"))
        })?;
        let longitude = required_number(location, "longitude", &name)?;
        let latitude = required_number(location, "latitude", &name)?;
        let altitude = optional_number(location, "altitude", &name)?.unwrap_or(0.0);
        let heading = match element(model, "Orientation") {
            Some(orientation) => optional_number(orientation, "heading", &name)?.unwrap_or(0.0),
            None => 0.0,
        };

        let href = element(model, "Link")
            .and_then(|link| element(link, "href"))
            .map(unescape)
            .ok_or_else(|| TileError::Input(format!("Placemark '{name}' has no <Link><href>")))?;

        let properties = element(block, "ExtendedData")
            .map(extended_data)
            .unwrap_or_default();

        debug!(id, name = %name, href = %href, "Parsed placemark");

        placemarks.push(Placemark {
            id,
            name,
            url: resolve_asset_path(base_dir, &href),
            placement: Placement {
                longitude,
                latitude,
                altitude,
                heading,
            },
            properties,
        });
    }

    if placemarks.is_empty() {
        return Err(TileError::EmptyInput(
            "placemark document contains no <Placemark> with a <Model>".into(),
        ));
    }

    Ok(placemarks)
}

/// Map a model href to its glTF: `.dae` references point at the sibling
/// `.gltf` export.
pub fn resolve_asset_path(base_dir: &Path, href: &str) -> PathBuf {
    let href = match href.strip_suffix(".dae").or_else(|| href.strip_suffix(".DAE")) {
        Some(stem) => format!("{stem}.gltf"),
        None => href.to_string(),
    };
    let href = href.replace('\\', "/");
    let path = Path::new(&href);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// `<Data name="k"><value>v</value></Data>` pairs; numeric text becomes a number.
fn extended_data(block: &str) -> Properties {
    let mut properties = Properties::new();
    let mut rest = block;
    while let Some((start, body_start)) = find_open_tag(rest, "Data") {
        let open_tag = &rest[start..body_start];
        let Some(end) = rest[body_start..].find("</Data>") else {
            break;
        };
        let body = &rest[body_start..body_start + end];
        if let (Some(name), Some(value)) = (attribute(open_tag, "name"), element(body, "value")) {
            let value = unescape(value);
            let value = match value.parse::<f64>() {
                Ok(n) if n.is_finite() => PropertyValue::Number(n),
                _ => PropertyValue::Text(value),
            };
            properties.insert(name.to_string(), value);
        }
        rest = &rest[body_start + end + "</Data>".len()..];
    }
    properties
}

fn required_number(block: &str, tag: &str, placemark: &str) -> Result<f64> {
    optional_number(block, tag, placemark)?.ok_or_else(|| {
        TileError::Input(format!("Placemark '{placemark}' is missing <{tag}>"))
    })
}

fn optional_number(block: &str, tag: &str, placemark: &str) -> Result<Option<f64>> {
    let Some(text) = element(block, tag) else {
        return Ok(None);
    };
    text.trim().parse::<f64>().map(Some).map_err(|_| {
        TileError::Input(format!(
            "Placemark '{placemark}': <{tag}> is not a number: '{}'",
            text.trim()
        ))
    })
}

/// Locate `<tag>` or `<tag attr=...>`. Returns the tag start and the index
/// just past its `>`.
fn find_open_tag(content: &str, tag: &str) -> Option<(usize, usize)> {
    let pattern = format!("<{tag}");
    let mut from = 0;
    while let Some(pos) = content[from..].find(&pattern) {
        let start = from + pos;
        let after = start + pattern.len();
        match content[after..].chars().next() {
            Some('>') => return Some((start, after + 1)),
            Some(c) if c.is_whitespace() => {
                let close = content[after..].find('>')?;
                return Some((start, after + close + 1));
            }
            _ => from = after,
        }
    }
    None
}

/// Inner text of the first `<tag>...</tag>`, trimmed.
fn element<'a>(content: &'a str, tag: &str) -> Option<&'a str> {
    let (_, body_start) = find_open_tag(content, tag)?;
    let close = format!("</{tag}>");
    let end = content[body_start..].find(&close)?;
    Some(content[body_start..body_start + end].trim())
}

/// Inner text of every top-level `<tag>...</tag>` in order.
fn elements<'a>(content: &'a str, tag: &str) -> Vec<&'a str> {
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut rest = content;
    while let Some((_, body_start)) = find_open_tag(rest, tag) {
        let Some(end) = rest[body_start..].find(&close) else {
            break;
        };
        out.push(&rest[body_start..body_start + end]);
        rest = &rest[body_start + end + close.len()..];
    }
    out
}

/// Value of `name="..."` inside an opening tag.
fn attribute<'a>(open_tag: &'a str, name: &str) -> Option<&'a str> {
    let pattern = format!("{name}=\"");
    let start = open_tag.find(&pattern)? + pattern.len();
    let end = open_tag[start..].find('"')?;
    Some(&open_tag[start..start + end])
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
