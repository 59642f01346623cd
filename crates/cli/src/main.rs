fn main() {
    if let Err(e) = sling_resolver_cli::run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
