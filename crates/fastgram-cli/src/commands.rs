use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    value_parser, Arg, ArgAction, ColorChoice, Command,
};

fn connections(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(Arg::new("username").required(true))
        .arg(
            Arg::new("page")
                .long("page")
                .default_value("1")
                .value_parser(value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .default_value("20")
                .value_parser(value_parser!(u32).range(1..=100)),
        )
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("fastgram")
        .about("FastGram from the command line")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .help("FastGram API base URL")
                .env("FASTGRAM_API_BASE_URL")
                .global(true),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level, repeat for more (-v info, -vv debug, -vvv trace)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("login").about("Sign in and store the session").arg(
                Arg::new("email")
                    .short('e')
                    .long("email")
                    .help("Account email, defaults to the last one used"),
            ),
        )
        .subcommand(
            Command::new("register")
                .about("Create an account and sign in")
                .arg(Arg::new("username").long("username").required(true))
                .arg(Arg::new("email").long("email").required(true))
                .arg(
                    Arg::new("full-name")
                        .long("full-name")
                        .help("Display name")
                        .required(true),
                ),
        )
        .subcommand(Command::new("logout").about("End this session"))
        .subcommand(Command::new("logout-all").about("End every session of this account"))
        .subcommand(Command::new("whoami").about("Verify the session with the server"))
        .subcommand(Command::new("status").about("Show the local session state"))
        .subcommand(Command::new("profile").about("Show your profile"))
        .subcommand(
            Command::new("follow")
                .about("Follow a user")
                .arg(Arg::new("username").required(true)),
        )
        .subcommand(
            Command::new("unfollow")
                .about("Stop following a user")
                .arg(Arg::new("username").required(true)),
        )
        .subcommand(connections("followers", "List who follows a user"))
        .subcommand(connections("following", "List who a user follows"))
        .subcommand(
            Command::new("request")
                .about("Send an authenticated request and print the response")
                .arg(
                    Arg::new("method")
                        .help("HTTP method, e.g. GET or POST")
                        .required(true),
                )
                .arg(
                    Arg::new("path")
                        .help("Path relative to the API base URL, e.g. /api/posts/feed/timeline")
                        .required(true),
                )
                .arg(
                    Arg::new("data")
                        .short('d')
                        .long("data")
                        .help("JSON request body"),
                )
                .arg(
                    Arg::new("no-retry")
                        .long("no-retry")
                        .help("Do not refresh and retry on 401/403")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("route")
                .about("Show where the route guard sends a navigation")
                .arg(
                    Arg::new("target")
                        .help("Path with optional query, e.g. /login?next=/Groups")
                        .required(true),
                ),
        )
}
