fn main() {
    if let Err(e) = race_day_lib::run() {
        eprintln!("race-day: {e}");
        std::process::exit(1);
    }
}
