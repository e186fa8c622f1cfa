use colored::Colorize;
use commands::command_argument_builder;
use netweave::handlers::{handle_init, handle_network, handle_report, handle_sessions};

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    if !quiet {
        print_banner();
    }

    match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("network", primary_command)) => handle_network(primary_command).await,
        Some(("report", primary_command)) => handle_report(primary_command),
        Some(("sessions", primary_command)) => handle_sessions(primary_command),
        None => {}
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

fn print_banner() {
    println!(
        "{} {}",
        "netweave".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    println!("{}", "relationship network crawler".bright_black());
    println!();
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
