//! Geography points, line strings and polygons
//!
//! Values travel in three shapes: the URL literal
//! `geography'SRID=4326;Point(142.1 64.1)'` (also used as the raw form),
//! GeoJSON in JSON payloads, and GML inside Atom/XML payloads.

use serde_json::json;

use super::Ctx;
use crate::error::ValidationError;
use crate::model::Value;
use crate::xml::XmlElement;

/// The WGS84 spatial reference used when none is given.
pub const DEFAULT_SRID: u32 = 4326;

const SRS_PREFIX: &str = "http://www.opengis.net/def/crs/EPSG/0/";

/// One position: longitude, latitude and optional extra ordinates.
pub type Position = Vec<f64>;

/// The geometry of a geography value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeographyKind {
    Point,
    LineString,
    Polygon,
}

impl GeographyKind {
    /// Returns the geometry name used in WKT, GeoJSON and GML.
    pub fn name(&self) -> &'static str {
        match self {
            GeographyKind::Point => "Point",
            GeographyKind::LineString => "LineString",
            GeographyKind::Polygon => "Polygon",
        }
    }

    /// Returns the EDM type name, e.g. `Edm.GeographyPoint`.
    pub fn edm_name(&self) -> &'static str {
        match self {
            GeographyKind::Point => "Edm.GeographyPoint",
            GeographyKind::LineString => "Edm.GeographyLineString",
            GeographyKind::Polygon => "Edm.GeographyPolygon",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        [GeographyKind::Point, GeographyKind::LineString, GeographyKind::Polygon]
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }
}

/// Coordinates for each geometry. Polygons hold their exterior ring.
#[derive(Debug, Clone, PartialEq)]
pub enum Coordinates {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Position>),
}

/// A geography value with its spatial reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Geography {
    /// Spatial reference ID.
    pub srid: u32,
    /// The geometry.
    pub coordinates: Coordinates,
}

impl Geography {
    /// Creates a point from longitude and latitude.
    pub fn point(longitude: f64, latitude: f64) -> Self {
        Self {
            srid: DEFAULT_SRID,
            coordinates: Coordinates::Point(vec![longitude, latitude]),
        }
    }

    /// Creates a line string.
    pub fn line_string(positions: Vec<Position>) -> Self {
        Self {
            srid: DEFAULT_SRID,
            coordinates: Coordinates::LineString(positions),
        }
    }

    /// Creates a polygon from its exterior ring.
    pub fn polygon(ring: Vec<Position>) -> Self {
        Self {
            srid: DEFAULT_SRID,
            coordinates: Coordinates::Polygon(ring),
        }
    }

    /// Sets the spatial reference ID.
    pub fn with_srid(mut self, srid: u32) -> Self {
        self.srid = srid;
        self
    }

    /// Returns the geometry kind.
    pub fn kind(&self) -> GeographyKind {
        match self.coordinates {
            Coordinates::Point(_) => GeographyKind::Point,
            Coordinates::LineString(_) => GeographyKind::LineString,
            Coordinates::Polygon(_) => GeographyKind::Polygon,
        }
    }

    /// Renders the URL literal, e.g. `geography'SRID=4326;Point(142.1 64.1)'`.
    pub fn to_wkt(&self) -> String {
        let body = match &self.coordinates {
            Coordinates::Point(p) => format_position(p),
            Coordinates::LineString(ps) => format_positions(ps),
            Coordinates::Polygon(ring) => format!("({})", format_positions(ring)),
        };
        format!("geography'SRID={};{}({})'", self.srid, self.kind().name(), body)
    }

    /// Parses a geography literal of any kind.
    ///
    /// Accepts the wrapped `geography'...'` form or a bare
    /// `SRID=N;Type(...)` / `Type(...)` body.
    pub fn parse_wkt(literal: &str) -> Option<Self> {
        let (srid, kind_name, body) = split_literal(literal).ok()?;
        let kind = GeographyKind::from_name(kind_name)?;
        build(kind, srid, body).ok()
    }

    /// Renders the GeoJSON form used in JSON payloads.
    pub fn to_geojson(&self) -> serde_json::Value {
        let coordinates = match &self.coordinates {
            Coordinates::Point(p) => json!(p),
            Coordinates::LineString(ps) => json!(ps),
            Coordinates::Polygon(ring) => json!([ring]),
        };
        json!({
            "type": self.kind().name(),
            "coordinates": coordinates,
            "crs": {
                "type": "name",
                "properties": { "name": format!("EPSG:{}", self.srid) }
            }
        })
    }

    /// Renders the GML element used inside Atom/XML property elements.
    pub fn to_gml(&self) -> String {
        let pos = |p: &Position| format!("<gml:pos>{}</gml:pos>", format_position(p));
        let inner = match &self.coordinates {
            Coordinates::Point(p) => pos(p),
            Coordinates::LineString(ps) => ps.iter().map(pos).collect(),
            Coordinates::Polygon(ring) => format!(
                "<gml:exterior><gml:LinearRing>{}</gml:LinearRing></gml:exterior>",
                ring.iter().map(pos).collect::<String>()
            ),
        };
        format!(
            "<gml:{name} gml:srsName=\"{prefix}{srid}\">{inner}</gml:{name}>",
            name = self.kind().name(),
            prefix = SRS_PREFIX,
            srid = self.srid,
            inner = inner
        )
    }
}

fn format_position(p: &Position) -> String {
    p.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
}

fn format_positions(ps: &[Position]) -> String {
    ps.iter().map(|p| format_position(p)).collect::<Vec<_>>().join(",")
}

// =============================================================================
// Parsing
// =============================================================================

/// Splits a literal into (srid, geometry name, coordinate body).
fn split_literal(literal: &str) -> Result<(u32, &str, &str), String> {
    let mut text = literal.trim();
    if let Some(inner) = text
        .strip_prefix("geography'")
        .and_then(|s| s.strip_suffix('\''))
    {
        text = inner;
    }

    let mut srid = DEFAULT_SRID;
    if let Some(rest) = text.strip_prefix("SRID=") {
        let (number, geometry) = rest
            .split_once(';')
            .ok_or_else(|| "missing ';' after SRID".to_string())?;
        srid = number
            .trim()
            .parse()
            .map_err(|_| format!("invalid SRID '{}'", number))?;
        text = geometry.trim();
    }

    let open = text.find('(').ok_or_else(|| "missing '('".to_string())?;
    let body = text[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| "missing closing ')'".to_string())?;
    Ok((srid, text[..open].trim(), body.trim()))
}

fn parse_position(text: &str) -> Result<Position, String> {
    let position = text
        .split_whitespace()
        .map(|c| c.parse::<f64>().map_err(|_| format!("invalid coordinate '{}'", c)))
        .collect::<Result<Position, _>>()?;
    if position.len() < 2 {
        return Err(format!("position '{}' needs at least two coordinates", text));
    }
    Ok(position)
}

fn parse_positions(text: &str) -> Result<Vec<Position>, String> {
    text.split(',').map(|p| parse_position(p.trim())).collect()
}

fn build(kind: GeographyKind, srid: u32, body: &str) -> Result<Geography, String> {
    let coordinates = match kind {
        GeographyKind::Point => Coordinates::Point(parse_position(body)?),
        GeographyKind::LineString => Coordinates::LineString(parse_positions(body)?),
        GeographyKind::Polygon => {
            let ring = body
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .unwrap_or(body);
            Coordinates::Polygon(parse_positions(ring)?)
        }
    };
    Ok(Geography { srid, coordinates })
}

/// Parses a literal, requiring the embedded geometry to match `kind`.
pub(crate) fn parse(kind: GeographyKind, ctx: &Ctx<'_>, raw: &str) -> Result<Geography, ValidationError> {
    let invalid = |reason: String| ValidationError::invalid(ctx.property, kind.edm_name(), raw, reason);
    let (srid, found, body) = split_literal(raw).map_err(invalid)?;
    if !found.eq_ignore_ascii_case(kind.name()) {
        return Err(ValidationError::GeographyMismatch {
            property: ctx.property.to_string(),
            expected: kind.name().to_string(),
            found: found.to_string(),
        });
    }
    build(kind, srid, body).map_err(invalid)
}

fn json_position(value: &serde_json::Value) -> Option<Position> {
    value.as_array()?.iter().map(|c| c.as_f64()).collect()
}

fn json_positions(value: &serde_json::Value) -> Option<Vec<Position>> {
    value.as_array()?.iter().map(json_position).collect()
}

fn srid_from_crs(value: &serde_json::Value) -> Option<u32> {
    let name = value.pointer("/crs/properties/name")?.as_str()?;
    name.rsplit([':', '/']).next()?.parse().ok()
}

fn from_coordinates(kind: GeographyKind, srid: u32, coordinates: &serde_json::Value) -> Option<Geography> {
    let coordinates = match kind {
        GeographyKind::Point => Coordinates::Point(json_position(coordinates)?),
        GeographyKind::LineString => Coordinates::LineString(json_positions(coordinates)?),
        // GeoJSON wraps rings in another array; a bare ring is accepted too
        GeographyKind::Polygon => Coordinates::Polygon(
            json_positions(coordinates)
                .or_else(|| coordinates.as_array()?.first().and_then(json_positions))?,
        ),
    };
    Some(Geography { srid, coordinates })
}

fn value_to_json(value: &Value) -> Option<serde_json::Value> {
    match value {
        Value::Json(json) => Some(json.clone()),
        Value::Byte(_) | Value::SByte(_) | Value::Int16(_) | Value::Int32(_) | Value::Int64(_) => {
            value.to_string().parse::<serde_json::Number>().ok().map(serde_json::Value::Number)
        }
        Value::Single(f) => serde_json::Number::from_f64(*f as f64).map(serde_json::Value::Number),
        Value::Double(f) => serde_json::Number::from_f64(*f).map(serde_json::Value::Number),
        Value::Collection(items) => items
            .iter()
            .map(value_to_json)
            .collect::<Option<Vec<_>>>()
            .map(serde_json::Value::Array),
        Value::Complex(map) => map
            .iter()
            .map(|(k, v)| value_to_json(v).map(|j| (k.clone(), j)))
            .collect::<Option<serde_json::Map<_, _>>>()
            .map(serde_json::Value::Object),
        Value::String(s) => Some(serde_json::Value::String(s.clone())),
        _ => None,
    }
}

/// Accepts a geography, a literal string, a GeoJSON-like object or raw coordinates.
pub(crate) fn coerce(kind: GeographyKind, ctx: &Ctx<'_>, value: &Value) -> Result<Geography, ValidationError> {
    match value {
        Value::Geography(g) if g.kind() == kind => Ok(g.clone()),
        Value::Geography(g) => Err(ValidationError::GeographyMismatch {
            property: ctx.property.to_string(),
            expected: kind.name().to_string(),
            found: g.kind().name().to_string(),
        }),
        Value::String(s) => parse(kind, ctx, s),
        other => {
            let invalid = || ValidationError::invalid(ctx.property, kind.edm_name(), other.to_string(), "not a geography");
            let json = value_to_json(other).ok_or_else(invalid)?;
            let geography = match &json {
                serde_json::Value::String(s) => return parse(kind, ctx, s),
                serde_json::Value::Object(_) => {
                    let found = json.get("type").and_then(|t| t.as_str());
                    if let Some(found) = found.filter(|f| !f.eq_ignore_ascii_case(kind.name())) {
                        return Err(ValidationError::GeographyMismatch {
                            property: ctx.property.to_string(),
                            expected: kind.name().to_string(),
                            found: found.to_string(),
                        });
                    }
                    let srid = srid_from_crs(&json).unwrap_or(DEFAULT_SRID);
                    json.get("coordinates")
                        .and_then(|c| from_coordinates(kind, srid, c))
                }
                serde_json::Value::Array(_) => from_coordinates(kind, DEFAULT_SRID, &json),
                _ => None,
            };
            geography.ok_or_else(invalid)
        }
    }
}

/// Reads the GML geometry nested in an Atom/XML property element.
pub(crate) fn from_gml(kind: GeographyKind, ctx: &Ctx<'_>, element: &XmlElement) -> Result<Geography, ValidationError> {
    let geometry = if element.name == kind.name() {
        Some(element)
    } else {
        element.descendants_named(kind.name()).into_iter().next()
    };
    let Some(geometry) = geometry else {
        let found = element
            .children
            .first()
            .map(|c| c.name.clone())
            .unwrap_or_default();
        return Err(ValidationError::GeographyMismatch {
            property: ctx.property.to_string(),
            expected: kind.name().to_string(),
            found,
        });
    };

    let srid = geometry
        .attribute("srsName")
        .and_then(|name| name.rsplit('/').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(DEFAULT_SRID);
    let positions = geometry
        .descendants_named("pos")
        .into_iter()
        .map(|p| parse_position(p.text.trim()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|reason| ValidationError::invalid(ctx.property, kind.edm_name(), element.text.clone(), reason))?;

    let coordinates = match kind {
        GeographyKind::Point => Coordinates::Point(positions.into_iter().next().ok_or_else(|| {
            ValidationError::invalid(ctx.property, kind.edm_name(), "", "point without gml:pos")
        })?),
        GeographyKind::LineString => Coordinates::LineString(positions),
        GeographyKind::Polygon => Coordinates::Polygon(positions),
    };
    Ok(Geography { srid, coordinates })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: Ctx<'static> = Ctx {
        property: "Location",
        strict: true,
    };

    #[test]
    fn test_point_literal_round_trip() {
        let point = Geography::point(142.1, 64.1);
        assert_eq!(point.to_wkt(), "geography'SRID=4326;Point(142.1 64.1)'");

        let parsed = parse(GeographyKind::Point, &CTX, &point.to_wkt()).unwrap();
        assert_eq!(parsed, point);
        assert_eq!(parsed.srid, 4326);
    }

    #[test]
    fn test_line_string_and_polygon_literals() {
        let line = Geography::line_string(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(line.to_wkt(), "geography'SRID=4326;LineString(1 2,3 4)'");

        let polygon = Geography::polygon(vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 0.0]]);
        let wkt = polygon.to_wkt();
        assert_eq!(wkt, "geography'SRID=4326;Polygon((0 0,1 0,0 1,0 0))'");
        assert_eq!(parse(GeographyKind::Polygon, &CTX, &wkt).unwrap(), polygon);
    }

    #[test]
    fn test_srid_is_extracted() {
        let parsed = parse(GeographyKind::Point, &CTX, "geography'SRID=3857;Point(1 2)'").unwrap();
        assert_eq!(parsed.srid, 3857);
        let bare = parse(GeographyKind::Point, &CTX, "Point(1 2)").unwrap();
        assert_eq!(bare.srid, DEFAULT_SRID);
    }

    #[test]
    fn test_type_mismatch() {
        let err = parse(GeographyKind::Point, &CTX, "geography'SRID=4326;LineString(1 2,3 4)'").unwrap_err();
        assert!(matches!(err, ValidationError::GeographyMismatch { .. }));
    }

    #[test]
    fn test_coerce_from_geojson_and_array() {
        let json = json!({"type": "Point", "coordinates": [142.1, 64.1]});
        let point = coerce(GeographyKind::Point, &CTX, &Value::Json(json)).unwrap();
        assert_eq!(point, Geography::point(142.1, 64.1));

        let array = Value::Json(json!([[1.0, 2.0], [3.0, 4.0]]));
        let line = coerce(GeographyKind::LineString, &CTX, &array).unwrap();
        assert_eq!(line.coordinates, Coordinates::LineString(vec![vec![1.0, 2.0], vec![3.0, 4.0]]));

        let collection = Value::Collection(vec![Value::Double(5.0), Value::Double(6.0)]);
        let point = coerce(GeographyKind::Point, &CTX, &collection).unwrap();
        assert_eq!(point, Geography::point(5.0, 6.0));
    }

    #[test]
    fn test_geojson_output() {
        let json = Geography::point(142.1, 64.1).to_geojson();
        assert_eq!(json["type"], "Point");
        assert_eq!(json["coordinates"], json!([142.1, 64.1]));
        assert_eq!(json["crs"]["properties"]["name"], "EPSG:4326");

        let polygon = Geography::polygon(vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
        let json = polygon.to_geojson();
        let back = coerce(GeographyKind::Polygon, &CTX, &Value::Json(json)).unwrap();
        assert_eq!(back, polygon);
    }

    #[test]
    fn test_gml_nesting() {
        let polygon = Geography::polygon(vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 0.0]]);
        let gml = polygon.to_gml();
        assert!(gml.starts_with("<gml:Polygon gml:srsName=\"http://www.opengis.net/def/crs/EPSG/0/4326\">"));
        assert!(gml.contains("<gml:exterior><gml:LinearRing><gml:pos>0 0</gml:pos>"));

        let wrapped = format!(
            "<d:Area xmlns:d=\"urn:d\" xmlns:gml=\"{}\">{}</d:Area>",
            crate::xml::GML_NS,
            gml
        );
        let element = XmlElement::parse(&wrapped).unwrap();
        let parsed = from_gml(GeographyKind::Polygon, &CTX, &element).unwrap();
        assert_eq!(parsed, polygon);
    }

    #[test]
    fn test_gml_point() {
        let xml = format!(
            "<d:Location xmlns:d=\"urn:d\" xmlns:gml=\"{}\"><gml:Point gml:srsName=\"{}3857\"><gml:pos>1 2</gml:pos></gml:Point></d:Location>",
            crate::xml::GML_NS,
            SRS_PREFIX
        );
        let element = XmlElement::parse(&xml).unwrap();
        let point = from_gml(GeographyKind::Point, &CTX, &element).unwrap();
        assert_eq!(point, Geography::point(1.0, 2.0).with_srid(3857));
    }
}
