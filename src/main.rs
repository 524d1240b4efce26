use clap::Parser;

fn main() -> std::process::ExitCode {
    pulmo_lib::run(pulmo_lib::Cli::parse())
}
