pub fn main() {
    std::process::exit(cql_cli::run_with_args(std::env::args_os()));
}
