fn main() {
    if let Err(err) = dsload::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
