//! `bgpgrep` binary entry point: parse arguments and hand off to
//! [`bgpgrep::cli::run`]. Logging setup follows the teacher's
//! `src/bin/main.rs`, which leaves `env_logger` uninitialized unless a
//! caller opts in via `RUST_LOG`; this binary does the same, since the
//! output stream (stdout) is the program's actual product and must stay
//! free of incidental log noise.
use bgpgrep::cli::Opts;
use clap::Parser;

fn main() {
    env_logger::init();
    let opts = Opts::parse();
    std::process::exit(bgpgrep::cli::run(opts));
}
