//! Conversion of GeoJSON, CSV and WKT input into features.

use camino::Utf8Path;
use geohub_core::Feature;
use geojson::GeoJson;
use serde_json::{Map, Value};

use crate::ConvertError;

/// Read a GeoJSON file as features.
///
/// A `FeatureCollection` yields its features, a single `Feature` yields
/// itself and a bare geometry is wrapped in a feature without id.
///
/// # Errors
///
/// Fails when the file cannot be read or is not valid GeoJSON.
pub fn read_geojson_features(path: &Utf8Path) -> Result<Vec<Feature>, ConvertError> {
    let text = geohub_fs::read_utf8_to_string(path).map_err(|source| ConvertError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: GeoJson = text.parse().map_err(|err: geojson::Error| ConvertError::GeoJson {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(match parsed {
        GeoJson::FeatureCollection(collection) => {
            collection.features.into_iter().map(Feature::from).collect()
        }
        GeoJson::Feature(feature) => vec![Feature::from(feature)],
        GeoJson::Geometry(geometry) => vec![Feature::from_parts(None, Some(geometry), Map::new())],
    })
}

/// Column mapping for [`read_csv_features`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvColumns {
    /// Column holding the longitude.
    pub lon: String,
    /// Column holding the latitude.
    pub lat: String,
    /// Column holding the feature id; rows are numbered from 1 when absent.
    pub id: Option<String>,
    /// Column holding the altitude; points stay two-dimensional when absent.
    pub altitude: Option<String>,
    /// Field delimiter.
    pub delimiter: u8,
}

impl CsvColumns {
    /// Comma-separated input with the given coordinate columns.
    #[must_use]
    pub fn new(lon: impl Into<String>, lat: impl Into<String>) -> Self {
        Self {
            lon: lon.into(),
            lat: lat.into(),
            id: None,
            altitude: None,
            delimiter: b',',
        }
    }

    /// Take feature ids from `column`.
    #[must_use]
    pub fn with_id(mut self, column: impl Into<String>) -> Self {
        self.id = Some(column.into());
        self
    }

    /// Take altitudes from `column`.
    #[must_use]
    pub fn with_altitude(mut self, column: impl Into<String>) -> Self {
        self.altitude = Some(column.into());
        self
    }

    /// Split fields on `delimiter` instead of a comma.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Read a CSV file with a header row as point features.
///
/// Each row becomes a point built from the mapped coordinate columns. Every
/// column that is not mapped becomes a string property.
///
/// # Errors
///
/// Fails when the file cannot be read, a mapped column is missing from the
/// header, a row is malformed or a coordinate is not a finite number.
pub fn read_csv_features(path: &Utf8Path, columns: &CsvColumns) -> Result<Vec<Feature>, ConvertError> {
    let text = geohub_fs::read_utf8_to_string(path).map_err(|source| ConvertError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(columns.delimiter)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| ConvertError::Csv {
            location: format!("{path}:1"),
            message: err.to_string(),
        })?
        .clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| ConvertError::CsvColumn {
                path: path.to_path_buf(),
                column: name.to_owned(),
            })
    };
    let layout = CsvLayout {
        lon: find(&columns.lon)?,
        lat: find(&columns.lat)?,
        id: columns.id.as_deref().map(find).transpose()?,
        altitude: columns.altitude.as_deref().map(find).transpose()?,
    };

    reader
        .records()
        .zip(1_usize..)
        .map(|(record, number)| {
            let row = record.map_err(|err| ConvertError::Csv {
                location: format!("{path}:{}", number.saturating_add(1)),
                message: err.to_string(),
            })?;
            let line = row.position().map_or(0, csv::Position::line);
            layout.feature(&headers, &row, number, &format!("{path}:{line}"))
        })
        .collect()
}

/// Header positions of the mapped CSV columns.
struct CsvLayout {
    lon: usize,
    lat: usize,
    id: Option<usize>,
    altitude: Option<usize>,
}

impl CsvLayout {
    fn feature(
        &self,
        headers: &csv::StringRecord,
        row: &csv::StringRecord,
        number: usize,
        location: &str,
    ) -> Result<Feature, ConvertError> {
        let mut position = vec![
            coordinate(row, self.lon, headers, location)?,
            coordinate(row, self.lat, headers, location)?,
        ];
        if let Some(altitude) = self.altitude {
            position.push(coordinate(row, altitude, headers, location)?);
        }
        let id = self.id.map_or_else(
            || number.to_string(),
            |column| row.get(column).unwrap_or_default().to_owned(),
        );
        let mapped = [Some(self.lon), Some(self.lat), self.id, self.altitude];
        let properties: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .enumerate()
            .filter(|(index, _)| !mapped.contains(&Some(*index)))
            .map(|(_, (name, value))| (name.to_owned(), Value::from(value)))
            .collect();
        let geometry = geojson::Geometry::new(geojson::Value::Point(position));
        Ok(Feature::from_parts(Some(id), Some(geometry), properties))
    }
}

fn coordinate(
    row: &csv::StringRecord,
    column: usize,
    headers: &csv::StringRecord,
    location: &str,
) -> Result<f64, ConvertError> {
    let name = headers.get(column).unwrap_or_default();
    let raw = row.get(column).unwrap_or_default().trim();
    let failed = |message: String| ConvertError::Csv {
        location: location.to_owned(),
        message: format!("column {name:?}: {message}"),
    };
    let value: f64 = raw.parse().map_err(|err: std::num::ParseFloatError| failed(err.to_string()))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(failed(format!("{raw} is not a finite number")))
    }
}

/// Convert one WKT geometry into a feature with the given id.
///
/// # Errors
///
/// Returns [`ConvertError::Wkt`] when `wkt` does not parse.
#[cfg(feature = "wkt")]
pub fn wkt_to_feature(wkt: &str, id: Option<String>) -> Result<Feature, ConvertError> {
    wkt_geometry(wkt, "input")
        .map(|geometry| Feature::from_parts(id, Some(geometry), Map::new()))
}

/// Read a file holding one WKT geometry per line.
///
/// Blank lines are skipped; each feature is identified by its 1-based line
/// number.
///
/// # Errors
///
/// Fails when the file cannot be read or a line is not valid WKT; the error
/// names the path and line.
#[cfg(feature = "wkt")]
pub fn read_wkt_features(path: &Utf8Path) -> Result<Vec<Feature>, ConvertError> {
    let text = geohub_fs::read_utf8_to_string(path).map_err(|source| ConvertError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    text.lines()
        .zip(1_usize..)
        .filter(|(line, _)| !line.trim().is_empty())
        .map(|(line, number)| {
            let geometry = wkt_geometry(line.trim(), &format!("{path}:{number}"))?;
            Ok(Feature::from_parts(
                Some(number.to_string()),
                Some(geometry),
                Map::new(),
            ))
        })
        .collect()
}

#[cfg(feature = "wkt")]
fn wkt_geometry(wkt: &str, location: &str) -> Result<geojson::Geometry, ConvertError> {
    use geozero::ToJson;

    let failed = |message: String| ConvertError::Wkt {
        location: location.to_owned(),
        message,
    };
    let json = geozero::wkt::Wkt(wkt)
        .to_json()
        .map_err(|err| failed(err.to_string()))?;
    serde_json::from_str(&json).map_err(|err| failed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn workdir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
        (dir, root)
    }

    fn write(root: &Utf8Path, name: &str, contents: &str) -> Utf8PathBuf {
        let path = root.join(name);
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    #[rstest]
    fn feature_collection_yields_every_feature(workdir: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workdir;
        let path = write(
            &root,
            "roads.geojson",
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","id":"a","geometry":{"type":"Point","coordinates":[1,2]},"properties":{}},
                {"type":"Feature","id":"b","geometry":null,"properties":{"name":"b"}}
            ]}"#,
        );

        let features = read_geojson_features(&path).expect("valid GeoJSON");

        let ids: Vec<Option<String>> = features.iter().map(Feature::id).collect();
        assert_eq!(ids, vec![Some("a".to_owned()), Some("b".to_owned())]);
    }

    #[rstest]
    fn bare_geometry_is_wrapped(workdir: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workdir;
        let path = write(&root, "point.json", r#"{"type":"Point","coordinates":[3,4]}"#);

        let features = read_geojson_features(&path).expect("valid GeoJSON");

        assert_eq!(features.len(), 1);
        let feature = features.first().expect("one feature");
        assert_eq!(feature.id(), None);
        assert!(feature.geometry().is_some());
    }

    #[rstest]
    fn invalid_geojson_names_the_file(workdir: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workdir;
        let path = write(&root, "broken.geojson", "{\"type\": \"Nonsense\"}");

        let err = read_geojson_features(&path).expect_err("invalid GeoJSON");

        assert!(matches!(&err, ConvertError::GeoJson { path: reported, .. } if *reported == path));
    }

    #[rstest]
    fn missing_file_is_a_read_error(workdir: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workdir;
        let err = read_geojson_features(&root.join("absent.geojson")).expect_err("missing file");
        assert!(matches!(err, ConvertError::Read { .. }));
    }

    #[rstest]
    fn csv_rows_become_points(workdir: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workdir;
        let path = write(
            &root,
            "stations.csv",
            "name,lon,lat,kind\nAlex,13.41,52.52,rail\nZoo,13.33,52.51,\n",
        );

        let features =
            read_csv_features(&path, &CsvColumns::new("lon", "lat")).expect("valid CSV");

        let ids: Vec<Option<String>> = features.iter().map(Feature::id).collect();
        assert_eq!(ids, vec![Some("1".to_owned()), Some("2".to_owned())]);
        let first = features.first().expect("first row");
        assert_eq!(
            first.geometry().map(|geometry| geometry.value.clone()),
            Some(geojson::Value::Point(vec![13.41, 52.52]))
        );
        assert_eq!(first.property("name"), Some(&Value::from("Alex")));
        assert_eq!(first.property("kind"), Some(&Value::from("rail")));
        assert_eq!(first.property("lon"), None);
    }

    #[rstest]
    fn csv_id_altitude_and_delimiter_are_configurable(workdir: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workdir;
        let path = write(&root, "peaks.csv", "ref;x;y;z\nzug;10.98;47.42;2962\n");
        let columns = CsvColumns::new("x", "y")
            .with_id("ref")
            .with_altitude("z")
            .with_delimiter(b';');

        let features = read_csv_features(&path, &columns).expect("valid CSV");

        let peak = features.first().expect("one row");
        assert_eq!(peak.id().as_deref(), Some("zug"));
        assert_eq!(
            peak.geometry().map(|geometry| geometry.value.clone()),
            Some(geojson::Value::Point(vec![10.98, 47.42, 2962.0]))
        );
        assert!(peak.properties().is_some_and(Map::is_empty));
    }

    #[rstest]
    fn csv_missing_column_is_named(workdir: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workdir;
        let path = write(&root, "plain.csv", "x,y\n1,2\n");

        let err = read_csv_features(&path, &CsvColumns::new("lon", "y")).expect_err("no lon");

        assert!(matches!(err, ConvertError::CsvColumn { column, .. } if column == "lon"));
    }

    #[rstest]
    #[case::text("a,b\n1,north\n")]
    #[case::infinite("a,b\n1,inf\n")]
    fn csv_bad_coordinate_reports_the_line(workdir: (TempDir, Utf8PathBuf), #[case] contents: &str) {
        let (_guard, root) = workdir;
        let path = write(&root, "bad.csv", contents);

        let err = read_csv_features(&path, &CsvColumns::new("a", "b")).expect_err("bad coordinate");

        let expected = format!("{path}:2");
        assert!(matches!(err, ConvertError::Csv { location, .. } if location == expected));
    }

    #[cfg(feature = "wkt")]
    #[rstest]
    fn wkt_point_becomes_a_feature() {
        let feature = wkt_to_feature("POINT (13.4 52.5)", Some("berlin".to_owned()))
            .expect("valid WKT");

        assert_eq!(feature.id().as_deref(), Some("berlin"));
        let geometry = feature.geometry().expect("geometry");
        assert_eq!(
            geometry.value,
            geojson::Value::Point(vec![13.4, 52.5])
        );
    }

    #[cfg(feature = "wkt")]
    #[rstest]
    fn wkt_lines_are_numbered(workdir: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workdir;
        let path = write(
            &root,
            "shapes.wkt",
            "POINT (1 2)\n\nLINESTRING (0 0, 1 1)\n",
        );

        let features = read_wkt_features(&path).expect("valid WKT");

        let ids: Vec<Option<String>> = features.iter().map(Feature::id).collect();
        assert_eq!(ids, vec![Some("1".to_owned()), Some("3".to_owned())]);
    }

    #[cfg(feature = "wkt")]
    #[rstest]
    fn invalid_wkt_reports_the_line(workdir: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workdir;
        let path = write(&root, "bad.wkt", "POINT (1 2)\nPOINT (oops)\n");

        let err = read_wkt_features(&path).expect_err("invalid WKT");

        let expected = format!("{path}:2");
        assert!(matches!(err, ConvertError::Wkt { location, .. } if location == expected));
    }
}
