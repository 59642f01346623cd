use crate::{Repository, Source};
use sling_resolver_core::mapping::Resolution;
use tracing::debug;

pub fn run(source: &Source, url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Repository::open(source)?;
    debug!("Resolving {url}");

    match repository.factory().resolve_url(url)? {
        Some(Resolution::Internal(paths)) => {
            for path in paths {
                println!("{path}");
            }
        }
        Some(Resolution::Redirect { location, status }) => println!("{status} {location}"),
        None => println!("no mapping for {url}"),
    }
    Ok(())
}
