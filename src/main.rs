fn main() {
    if let Err(err) = portfolio_dash::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
