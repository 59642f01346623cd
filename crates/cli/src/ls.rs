use crate::view::ChildView;
use crate::{Repository, Source};
use sling_resolver_api::ResourceResolver;
use tabled::Table;
use tabled::settings::Style;

pub fn run(source: &Source, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Repository::open(source)?;
    let session = repository.session()?;

    let parent = session
        .get_resource(path)
        .ok_or_else(|| format!("no resource at {path}"))?;
    let children: Vec<ChildView> = session.list_children(&parent).map(|r| ChildView::from_resource(&r)).collect();

    if children.is_empty() {
        println!("{path} has no children");
    } else {
        println!("{}", Table::new(children).with(Style::psql()));
    }
    Ok(())
}
