use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("netweave")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("netweave")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the netweave database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the netweave database")
                        .default_value("~/.config/netweave/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help(
                            "Forces the overwriting of any existing database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("network")
                .about(
                    "Crawl the relationship network around a user and assemble it into a graph. \
                Stores the result as a session.",
                )
                .arg(
                    arg!(-u --"user" <HANDLE>)
                        .required(true)
                        .help("Handle of the user at the centre of the network"),
                )
                .arg(
                    arg!(-k --"kinds" <KINDS>)
                        .required(false)
                        .help("Comma-separated relation kinds to follow: contact, commenter")
                        .default_value("contact,commenter"),
                )
                .arg(
                    arg!(-l --"level" <LEVEL>)
                        .required(false)
                        .help(
                            "Expansion level: 1 (direct relations), 1.5 (plus relations among \
                        them), 2 (plus their direct relations)",
                        )
                        .value_parser(["1", "1.5", "2"])
                        .default_value("1"),
                )
                .arg(
                    arg!(-m --"max-per-request" <NUM>)
                        .required(false)
                        .help("Maximum number of items taken from each listing (default: unlimited)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"api-key" <KEY>)
                        .required(true)
                        .env("NETWEAVE_API_KEY")
                        .hide_env_values(true)
                        .help("API key for the photo service"),
                )
                .arg(
                    arg!(--"base-url" <URL>)
                        .required(false)
                        .help("Base URL of the REST endpoint")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("30"),
                )
                .arg(
                    arg!(--"no-enrich")
                        .required(false)
                        .help("Skip fetching profile details for discovered users")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Write the graph as JSON to this file")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Path to the netweave database")
                        .default_value("~/.config/netweave/netweave.db"),
                )
                .arg(
                    arg!(--"no-save")
                        .required(false)
                        .help("Do not store the session in the database")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("report")
                .about("Generate a report for a stored session")
                .arg(
                    arg!(-s --"session" <ID>)
                        .required(true)
                        .help("Session ID, as listed by `netweave sessions`"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"include-vertices")
                        .required(false)
                        .help("List every discovered user in the report")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Path to the netweave database")
                        .default_value("~/.config/netweave/netweave.db"),
                ),
        )
        .subcommand(
            command!("sessions").about("List stored sessions").arg(
                arg!(--"db" <PATH>)
                    .required(false)
                    .help("Path to the netweave database")
                    .default_value("~/.config/netweave/netweave.db"),
            ),
        )
}
