use clarity::cli;

fn main() {
    let cli = cli::parse_from(std::env::args_os());
    if let Err(e) = cli::run(cli) {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}
