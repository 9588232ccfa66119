//! WMS 1.1.1 / 1.3.0 capabilities.

use harvest_common::BoundingBox;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::{
    attribute, local_name, parse_coord, split_time_values, CapabilitiesError, CapabilitiesResult,
    LayerCapabilities,
};

/// Layer state while its element is open. Nested layers inherit bbox and times.
#[derive(Default)]
struct OpenLayer {
    name: Option<String>,
    bbox: Option<BoundingBox>,
    times: Vec<String>,
}

/// Parse every named layer out of a WMS capabilities document.
pub fn parse_wms_capabilities(xml: &str) -> CapabilitiesResult<Vec<LayerCapabilities>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut layers: Vec<OpenLayer> = Vec::new();
    let mut found = Vec::new();

    let mut text = String::new();
    let mut in_time_dimension = false;
    // west, east, south, north
    let mut geographic: [Option<f64>; 4] = [None; 4];

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                text.clear();
                match name.as_str() {
                    "Layer" => {
                        let inherited = layers
                            .last()
                            .map(|parent| OpenLayer {
                                name: None,
                                bbox: parent.bbox,
                                times: parent.times.clone(),
                            })
                            .unwrap_or_default();
                        layers.push(inherited);
                    }
                    "Dimension" | "Extent" => {
                        in_time_dimension = is_time_dimension(&e);
                    }
                    "EX_GeographicBoundingBox" => geographic = [None; 4],
                    "LatLonBoundingBox" => set_lat_lon_bbox(&e, &mut layers)?,
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                if local_name(&e) == "LatLonBoundingBox" {
                    set_lat_lon_bbox(&e, &mut layers)?;
                }
            }
            Ok(Event::Text(t)) => {
                let value = t.unescape().map_err(|err| CapabilitiesError::Xml {
                    position: reader.buffer_position(),
                    message: err.to_string(),
                })?;
                text.push_str(&value);
            }
            Ok(Event::CData(t)) => {
                text.push_str(&String::from_utf8_lossy(&t.into_inner()));
            }
            Ok(Event::End(_)) => {
                let Some(name) = path.pop() else { continue };
                let parent = path.last().map(String::as_str);
                match (name.as_str(), parent) {
                    ("Name", Some("Layer")) => {
                        if let Some(layer) = layers.last_mut() {
                            layer.name = Some(text.trim().to_string());
                        }
                    }
                    ("Dimension" | "Extent", _) if in_time_dimension => {
                        let values = split_time_values(&text);
                        if !values.is_empty() {
                            if let Some(layer) = layers.last_mut() {
                                layer.times = values;
                            }
                        }
                        in_time_dimension = false;
                    }
                    ("westBoundLongitude", _) => geographic[0] = Some(parse_coord(&text)?),
                    ("eastBoundLongitude", _) => geographic[1] = Some(parse_coord(&text)?),
                    ("southBoundLatitude", _) => geographic[2] = Some(parse_coord(&text)?),
                    ("northBoundLatitude", _) => geographic[3] = Some(parse_coord(&text)?),
                    ("EX_GeographicBoundingBox", _) => {
                        if let ([Some(w), Some(e), Some(s), Some(n)], Some(layer)) =
                            (geographic, layers.last_mut())
                        {
                            layer.bbox = Some(BoundingBox::new(w, s, e, n));
                        }
                    }
                    ("Layer", _) => {
                        if let Some(OpenLayer {
                            name: Some(name),
                            bbox,
                            times,
                        }) = layers.pop()
                        {
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

fn is_time_dimension(e: &BytesStart<'_>) -> bool {
    attribute(e, "name")
        .map(|n| n.eq_ignore_ascii_case("time"))
        .unwrap_or(false)
}

fn set_lat_lon_bbox(e: &BytesStart<'_>, layers: &mut [OpenLayer]) -> CapabilitiesResult<()> {
    let coord = |name: &str| -> CapabilitiesResult<f64> {
        let raw = attribute(e, name)
            .ok_or_else(|| CapabilitiesError::InvalidBoundingBox(format!("missing {}", name)))?;
        parse_coord(&raw)
    };
    let bbox = BoundingBox::new(coord("minx")?, coord("miny")?, coord("maxx")?, coord("maxy")?);
    if let Some(layer) = layers.last_mut() {
        layer.bbox = Some(bbox);
    }
    Ok(())
}
