//! City catalogue parsing (spec §6): the CSV describing which cities to
//! reconstruct and what counts/networks/modes each one is expected to have.

use crate::city::City;
use crate::error::Error;
use crate::model::Mode;
use std::collections::HashSet;
use std::io::Read;

/// Parses the catalogue CSV: a header row, then one row per city with
/// `id, name, country, continent, num_stations, num_lines, num_light_lines,
/// num_interchanges, bbox, modes_and_networks`. A row with no bbox column
/// (or an empty one) is skipped outright, mirroring the spreadsheet loader's
/// `len(row) > 8 and row[8]` guard — both the underground and the overground
/// sheet use this same shape.
pub fn load_catalogue(reader: impl Read) -> Result<Vec<City>, Error> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).flexible(true).from_reader(reader);
    let mut cities = Vec::new();
    let mut seen_names = HashSet::new();

    for result in rdr.records() {
        let record = result?;
        if record.get(8).map_or(true, str::is_empty) {
            continue;
        }
        let city = parse_row(&record)?;
        if !seen_names.insert(city.name.clone()) {
            tracing::warn!(name = %city.name, "duplicate city name in catalogue");
        }
        cities.push(city);
    }
    Ok(cities)
}

fn parse_row(record: &csv::StringRecord) -> Result<City, Error> {
    let field = |i: usize| record.get(i).unwrap_or("");

    let id: u64 = field(0)
        .parse()
        .map_err(|_| Error::Catalogue(format!("city row has a non-numeric id: {:?}", field(0))))?;
    let name = field(1).to_string();
    let country = field(2).to_string();
    let continent = field(3).to_string();
    let num_stations = parse_count(field(4))?;
    let num_lines = parse_count(field(5))?;
    let num_light_lines = parse_count(field(6))?;
    let num_interchanges = parse_count(field(7))?;
    let bbox = parse_bbox(field(8));
    let (active_modes, networks) = parse_modes_and_networks(field(9));

    Ok(City::new(
        id,
        name,
        country,
        continent,
        bbox,
        networks,
        active_modes,
        num_stations,
        num_lines,
        num_light_lines,
        num_interchanges,
    ))
}

fn parse_count(field: &str) -> Result<u32, Error> {
    if field.is_empty() {
        return Ok(0);
    }
    field.parse().map_err(|_| Error::Catalogue(format!("non-numeric count {field:?}")))
}

/// `"min_lat,min_lon,max_lat,max_lon"` straight into `City::bbox`'s own
/// `[lat_min, lon_min, lat_max, lon_max]` convention — no reordering needed,
/// since that's the axis order the column is already documented in.
fn parse_bbox(field: &str) -> Option<[f64; 4]> {
    let parts: Vec<&str> = field.split(',').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut out = [0.0f64; 4];
    for (slot, part) in out.iter_mut().zip(parts.iter()) {
        *slot = part.trim().parse().ok()?;
    }
    Some(out)
}

/// `"modes:networks"`: modes comma-separated, networks semicolon-separated,
/// either half may be empty.
fn parse_modes_and_networks(field: &str) -> (HashSet<Mode>, HashSet<String>) {
    let mut halves = field.splitn(2, ':');
    let modes_part = halves.next().unwrap_or("");
    let networks_part = halves.next().unwrap_or("");

    let modes = modes_part.split(',').map(str::trim).filter(|s| !s.is_empty()).filter_map(Mode::parse).collect();
    let networks =
        networks_part.split(';').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();

    (modes, networks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_row() {
        let csv = "id,name,country,continent,num_stations,num_lines,num_light_lines,num_interchanges,bbox,modes_and_networks\n\
                   1,Paris,France,Europe,300,16,0,50,\"48.0,2.0,49.0,2.5\",subway:RATP;SNCF\n";
        let cities = load_catalogue(csv.as_bytes()).expect("parses");
        assert_eq!(cities.len(), 1);
        let city = &cities[0];
        assert_eq!(city.id, 1);
        assert_eq!(city.name, "Paris");
        assert_eq!(city.num_lines, 16);
        assert_eq!(city.bbox, Some([48.0, 2.0, 49.0, 2.5]));
        assert!(city.active_modes.contains(&Mode::Subway));
        assert!(city.networks.contains("RATP"));
        assert!(city.networks.contains("SNCF"));
    }

    #[test]
    fn skips_rows_with_no_bbox() {
        let csv = "id,name,country,continent,num_stations,num_lines,num_light_lines,num_interchanges,bbox,modes_and_networks\n\
                   1,Nowhere,Nowhereland,Nowhere,0,0,0,0,,\n";
        let cities = load_catalogue(csv.as_bytes()).expect("parses");
        assert!(cities.is_empty());
    }

    #[test]
    fn empty_counts_default_to_zero() {
        let csv = "id,name,country,continent,num_stations,num_lines,num_light_lines,num_interchanges,bbox,modes_and_networks\n\
                   2,Town,Country,Continent,10,,,,\"1.0,1.0,2.0,2.0\",\n";
        let cities = load_catalogue(csv.as_bytes()).expect("parses");
        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].num_lines, 0);
        assert_eq!(cities[0].num_light_lines, 0);
    }

    #[test]
    fn duplicate_names_are_kept_but_logged() {
        let csv = "id,name,country,continent,num_stations,num_lines,num_light_lines,num_interchanges,bbox,modes_and_networks\n\
                   1,Springfield,USA,NA,1,1,0,0,\"1.0,1.0,2.0,2.0\",\n\
                   2,Springfield,USA,NA,1,1,0,0,\"3.0,3.0,4.0,4.0\",\n";
        let cities = load_catalogue(csv.as_bytes()).expect("parses");
        assert_eq!(cities.len(), 2);
    }

    #[test]
    fn non_numeric_id_is_an_error() {
        let csv = "id,name,country,continent,num_stations,num_lines,num_light_lines,num_interchanges,bbox,modes_and_networks\n\
                   abc,Town,Country,Continent,1,1,0,0,\"1.0,1.0,2.0,2.0\",\n";
        assert!(load_catalogue(csv.as_bytes()).is_err());
    }
}
