use crate::{Repository, Source};

pub fn run(source: &Source, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Repository::open(source)?;
    let mapped = repository.index().map(path);
    if mapped.is_empty() {
        println!("{path}");
    }
    for external in mapped {
        println!("{external}");
    }
    Ok(())
}
