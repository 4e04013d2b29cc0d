fn main() {
    if let Err(e) = spacetrans_lib::run() {
        eprintln!("spacetrans: {}", e);
        std::process::exit(1);
    }
}
