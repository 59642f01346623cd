use crate::view::EntryView;
use crate::{Repository, Source};
use tabled::Table;
use tabled::settings::Style;

pub fn run(source: &Source, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Repository::open(source)?;
    let index = repository.index();

    let resolve: Vec<EntryView> = index.resolve_maps().iter().map(EntryView::from_entry).collect();
    let map: Vec<EntryView> = index.map_maps().iter().map(EntryView::from_entry).collect();

    if json {
        let doc = serde_json::json!({ "resolve": resolve, "map": map });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("Resolve entries ({}):", resolve.len());
    println!("{}", Table::new(&resolve).with(Style::psql()));
    println!("Map entries ({}):", map.len());
    println!("{}", Table::new(&map).with(Style::psql()));
    Ok(())
}
