fn main() {
    if let Err(err) = posturewatch_lib::run() {
        eprintln!("posturewatch failed: {err:?}");
        std::process::exit(1);
    }
}
