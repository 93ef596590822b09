use std::io::{self, Read, Write};

use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use tracing::{error, info, span, Level};

use ossfs::{config, driver, fs, model, util};

fn cli() -> Command {
    let path = || Arg::new("PATH").required(true).index(1);
    let dir = || Arg::new("DIR").required(true).index(1);
    let src_dst = |cmd: Command| {
        cmd.arg(Arg::new("SRC").required(true).index(1))
            .arg(Arg::new("DST").required(true).index(2))
    };

    Command::new("ossfs")
        .about("Filesystem operations on an object storage bucket")
        .arg(Arg::new("BUCKET_URI").required(true).index(1))
        .arg(
            Arg::new("access-key")
                .long("access-key")
                .env("OSSFS_ACCESS_KEY")
                .hide_env_values(true)
                .default_value(""),
        )
        .arg(
            Arg::new("secret-key")
                .long("secret-key")
                .env("OSSFS_SECRET_KEY")
                .hide_env_values(true)
                .default_value(""),
        )
        .arg(
            Arg::new("domain")
                .long("domain")
                .env("OSSFS_DOMAIN")
                .default_value(""),
        )
        .arg(
            Arg::new("cname")
                .long("cname")
                .env("OSSFS_CNAME")
                .action(ArgAction::SetTrue),
        )
        .arg(Arg::new("prefix").long("prefix").env("OSSFS_PREFIX"))
        .arg(
            Arg::new("region")
                .long("region")
                .env("OSSFS_REGION")
                .default_value(config::DEFAULT_REGION),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("ls")
                .arg(Arg::new("DIR").index(1).default_value(""))
                .arg(
                    Arg::new("recursive")
                        .short('r')
                        .long("recursive")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("put")
                .arg(path())
                .arg(Arg::new("FILE").index(2))
                .arg(Arg::new("mimetype").long("mimetype")),
        )
        .subcommand(Command::new("cat").arg(path()))
        .subcommand(Command::new("stream").arg(path()))
        .subcommand(Command::new("rm").arg(path()))
        .subcommand(Command::new("rmdir").arg(dir()))
        .subcommand(Command::new("mkdir").arg(dir()))
        .subcommand(src_dst(Command::new("mv")))
        .subcommand(src_dst(Command::new("cp")))
        .subcommand(Command::new("stat").arg(path()))
        .subcommand(Command::new("exists").arg(path()))
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .unwrap_or("")
}

fn print_json<T: Serialize>(value: &T) -> Result<(), model::fs::FSError> {
    let mut out = io::stdout().lock();
    serde_json::to_writer(&mut out, value).map_err(io::Error::from)?;
    writeln!(out)?;
    Ok(())
}

fn adapter(matches: &ArgMatches) -> Result<fs::StorageAdapter, model::fs::FSError> {
    let (provider, bucket) = util::object::parse_bucket_uri(arg(matches, "BUCKET_URI"))?;

    let config = config::AdapterConfig::new(
        arg(matches, "access-key"),
        arg(matches, "secret-key"),
        &bucket,
        arg(matches, "domain"),
        matches.get_flag("cname"),
    )
    .with_provider(provider)
    .with_region(arg(matches, "region"))
    .with_prefix(matches.get_one::<String>("prefix").map(String::as_str));

    Ok(driver::from_config(config))
}

fn run(matches: &ArgMatches) -> Result<(), model::fs::FSError> {
    let adapter = adapter(matches)?;
    let no_config = config::WriteConfig::new();

    match matches.subcommand() {
        Some(("ls", sub)) => {
            for entry in adapter.list_contents(arg(sub, "DIR"), sub.get_flag("recursive"))? {
                print_json(&entry)?;
            }
        }
        Some(("put", sub)) => {
            let mut write_config = config::WriteConfig::new();
            if let Some(mimetype) = sub.get_one::<String>("mimetype") {
                write_config = write_config.with("mimetype", mimetype);
            }

            let reader: Box<dyn Read> = match sub.get_one::<String>("FILE") {
                None => Box::new(io::stdin()),
                Some(file) => Box::new(std::fs::File::open(file)?),
            };

            print_json(&adapter.write_stream(arg(sub, "PATH"), reader, &write_config)?)?;
        }
        Some(("cat", sub)) => {
            let resp = adapter.read(arg(sub, "PATH"))?;
            io::stdout().lock().write_all(&resp.contents)?;
        }
        Some(("stream", sub)) => {
            let mut resp = adapter.read_stream(arg(sub, "PATH"))?;
            io::copy(&mut resp.stream, &mut io::stdout().lock())?;
        }
        Some(("rm", sub)) => {
            let path = arg(sub, "PATH");
            let deleted = adapter.delete(path)?;
            print_json(&serde_json::json!({ "path": path, "deleted": deleted }))?;
        }
        Some(("rmdir", sub)) => {
            adapter.delete_dir(arg(sub, "DIR"))?;
        }
        Some(("mkdir", sub)) => {
            print_json(&adapter.create_dir(arg(sub, "DIR"), &no_config)?)?;
        }
        Some(("mv", sub)) => {
            let renamed = adapter.rename(arg(sub, "SRC"), arg(sub, "DST"))?;
            print_json(&serde_json::json!({ "path": arg(sub, "DST"), "renamed": renamed }))?;
        }
        Some(("cp", sub)) => {
            adapter.copy(arg(sub, "SRC"), arg(sub, "DST"))?;
        }
        Some(("stat", sub)) => {
            print_json(&adapter.get_metadata(arg(sub, "PATH"))?)?;
        }
        Some(("exists", sub)) => {
            let path = arg(sub, "PATH");
            print_json(&serde_json::json!({ "path": path, "exists": adapter.has(path) }))?;
        }
        _ => unreachable!("subcommand is required"),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    let level = match matches.get_count("verbose") {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .json()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let span = span!(Level::INFO, "main", context = "main");
    let _e = span.enter();
    info!(bucket_uri = arg(&matches, "BUCKET_URI"), "called");

    if let Err(err) = run(&matches) {
        error!(error_message = %err, error_group = "main");
        eprintln!("ossfs: {}", err);
        std::process::exit(1);
    }
}
