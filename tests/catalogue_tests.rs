//! Integration-level catalogue parsing: multi-row files, the flexible-row
//! skip rule at an actual short-row (not just empty-bbox) boundary, and a
//! parsed city fed straight into the full reconstruction pipeline.

mod support;

use std::collections::HashSet;

use transitfold::catalogue::load_catalogue;
use transitfold::model::Mode;
use transitfold::pipeline::PipelineOptions;
use transitfold::run;

use support::*;

const HEADER: &str = "id,name,country,continent,num_stations,num_lines,num_light_lines,num_interchanges,bbox,modes_and_networks\n";

#[test]
fn a_row_with_fewer_than_nine_columns_is_skipped_like_an_empty_bbox() {
    let csv = format!("{HEADER}1,Nowhere,Land,Cont,0,0,0,0\n");
    let cities = load_catalogue(csv.as_bytes()).expect("parses");
    assert!(cities.is_empty(), "a short row has no bbox column at all and must be skipped, not errored");
}

#[test]
fn multiple_modes_on_one_row_are_all_recognized() {
    let csv = format!("{HEADER}1,Mixedville,Land,Cont,10,2,1,0,\"0.0,0.0,1.0,1.0\",\"subway,tram:Metro;Trams\"\n");
    let cities = load_catalogue(csv.as_bytes()).expect("parses");
    assert_eq!(cities.len(), 1);
    let city = &cities[0];
    assert_eq!(city.active_modes, [Mode::Subway, Mode::Tram].into_iter().collect::<HashSet<_>>());
    assert_eq!(city.networks, ["Metro".to_string(), "Trams".to_string()].into_iter().collect::<HashSet<_>>());
}

#[test]
fn a_row_with_no_recognized_mode_still_parses_with_an_empty_mode_set() {
    let csv = format!("{HEADER}1,Modeless,Land,Cont,1,0,0,0,\"0.0,0.0,1.0,1.0\",\"ferry:SomeNetwork\"\n");
    let cities = load_catalogue(csv.as_bytes()).expect("parses");
    assert_eq!(cities.len(), 1);
    assert!(cities[0].active_modes.is_empty());
    assert!(cities[0].networks.contains("SomeNetwork"));
}

#[test]
fn several_cities_in_one_file_all_parse_independently() {
    let csv = format!(
        "{HEADER}\
         1,Alpha,LandA,ContA,5,1,0,0,\"0.0,0.0,1.0,1.0\",subway:A\n\
         2,Beta,LandB,ContB,8,0,2,1,\"2.0,2.0,3.0,3.0\",light_rail:B\n"
    );
    let cities = load_catalogue(csv.as_bytes()).expect("parses");
    assert_eq!(cities.len(), 2);
    assert_eq!(cities[0].name, "Alpha");
    assert_eq!(cities[1].name, "Beta");
    assert_eq!(cities[1].num_light_lines, 2);
    assert_eq!(cities[1].num_interchanges, 1);
}

/// A catalogue-parsed city is a plain [`transitfold::City`] like any other -
/// it should drive the full pipeline the same as a hand-built one.
#[test]
fn a_catalogue_parsed_city_drives_the_full_pipeline() {
    let csv = format!("{HEADER}1,Testville,Land,Cont,2,1,0,0,\"-2.0,-2.0,2.0,2.0\",subway:\n");
    let cities = load_catalogue(csv.as_bytes()).expect("parses");
    assert_eq!(cities.len(), 1);

    let records = vec![
        record(node_value(1, 0.0, 0.0, &[("railway", "station"), ("station", "subway"), ("name", "A")])),
        record(node_value(2, 0.01, 0.0, &[("railway", "station"), ("station", "subway"), ("name", "B")])),
        record(way_value(10, &[1, 2], &[("railway", "subway")])),
        record(relation_value(
            20,
            &[("way", "", 10), ("node", "", 1), ("node", "", 2)],
            &[("type", "route"), ("route", "subway"), ("ref", "1")],
        )),
    ];

    let result = run(records, cities, &PipelineOptions::default());
    assert_eq!(result.cities.len(), 1);
    assert!(result.cities[0].is_good(), "unexpected diagnostics: {:?}", result.cities[0].diagnostics.errors);
}
