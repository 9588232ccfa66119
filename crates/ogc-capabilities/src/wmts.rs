//! WMTS 1.0.0 capabilities.

use harvest_common::BoundingBox;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::{local_name, parse_coord, CapabilitiesError, CapabilitiesResult, LayerCapabilities};

#[derive(Default)]
struct OpenLayer {
    name: Option<String>,
    lower: Option<(f64, f64)>,
    upper: Option<(f64, f64)>,
    times: Vec<String>,
}

#[derive(Default)]
struct OpenDimension {
    identifier: String,
    values: Vec<String>,
}

/// Parse every layer listed under `Contents` of a WMTS capabilities document.
pub fn parse_wmts_capabilities(xml: &str) -> CapabilitiesResult<Vec<LayerCapabilities>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut layer: Option<OpenLayer> = None;
    let mut dimension: Option<OpenDimension> = None;
    let mut found = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                text.clear();
                let parent = path.last().map(String::as_str);
                match (name.as_str(), parent) {
                    ("Layer", Some("Contents")) => layer = Some(OpenLayer::default()),
                    ("Dimension", Some("Layer")) => dimension = Some(OpenDimension::default()),
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Text(t)) => {
                let value = t.unescape().map_err(|err| CapabilitiesError::Xml {
                    position: reader.buffer_position(),
                    message: err.to_string(),
                })?;
                text.push_str(&value);
            }
            Ok(Event::End(_)) => {
                let Some(name) = path.pop() else { continue };
                let parent = path.last().map(String::as_str);
                match (name.as_str(), parent) {
                    ("Identifier", Some("Layer")) => {
                        if let Some(layer) = layer.as_mut() {
                            layer.name = Some(text.trim().to_string());
                        }
                    }
                    ("Identifier", Some("Dimension")) => {
                        if let Some(dimension) = dimension.as_mut() {
                            dimension.identifier = text.trim().to_string();
                        }
                    }
                    ("Value", Some("Dimension")) => {
                        if let Some(dimension) = dimension.as_mut() {
                            let value = text.trim();
                            if !value.is_empty() {
                                dimension.values.push(value.to_string());
                            }
                        }
                    }
                    ("LowerCorner", Some("WGS84BoundingBox")) => {
                        if let Some(layer) = layer.as_mut() {
                            layer.lower = Some(parse_corner(&text)?);
                        }
                    }
                    ("UpperCorner", Some("WGS84BoundingBox")) => {
                        if let Some(layer) = layer.as_mut() {
                            layer.upper = Some(parse_corner(&text)?);
                        }
                    }
                    ("Dimension", Some("Layer")) => {
                        if let (Some(dim), Some(layer)) = (dimension.take(), layer.as_mut()) {
                            if dim.identifier.eq_ignore_ascii_case("time") {
                                layer.times = dim.values;
                            }
                        }
                    }
                    ("Layer", Some("Contents")) => {
                        if let Some(OpenLayer {
                            name: Some(name),
                            lower,
                            upper,
                            times,
                        }) = layer.take()
                        {
                            let bbox = match (lower, upper) {
                                (Some((min_x, min_y)), Some((max_x, max_y))) => {
                                    Some(BoundingBox::new(min_x, min_y, max_x, max_y))
                                }
                                _ => None,
                            };
                            found.push(LayerCapabilities {
                                name,
                                bbox,
                                time_positions: times,
                            });
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CapabilitiesError::Xml {
                    position: reader.buffer_position(),
                    message: e.to_string(),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(found)
}

/// Parse an OWS corner, `"lon lat"`.
fn parse_corner(text: &str) -> CapabilitiesResult<(f64, f64)> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    match parts.as_slice() {
        [x, y] => Ok((parse_coord(x)?, parse_coord(y)?)),
        _ => Err(CapabilitiesError::InvalidBoundingBox(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_corner() {
        assert_eq!(parse_corner("-180 -85.05").unwrap(), (-180.0, -85.05));
        assert!(parse_corner("1").is_err());
    }
}
