use std::collections::HashMap;
use std::fs;
use std::io;
use std::process::exit;

use clap::{App, Arg, SubCommand};
use env_logger::Builder;
use failure::format_err;
use log::{error, info, warn, LevelFilter};

use macaddress_provider::{
    lookup, registry, Handlers, ProviderError, ResourceConfig, ResourceState, Transition,
    RESOURCE_TYPE_NAME,
};

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const CARGO_PKG_NAME: &str = env!("CARGO_PKG_NAME");

const CREATE_SUBCOMMAND: &str = "create";
const READ_SUBCOMMAND: &str = "read";
const DELETE_SUBCOMMAND: &str = "delete";
const IMPORT_SUBCOMMAND: &str = "import";

fn state_arg() -> Arg<'static, 'static> {
    Arg::with_name("state")
        .long("state")
        .value_name("FILE")
        .help("the state file tracking the managed address")
        .required(true)
        .takes_value(true)
}

fn main() {
    let create = SubCommand::with_name(CREATE_SUBCOMMAND)
        .version(CARGO_PKG_VERSION)
        .about("generate a managed mac address")
        .arg(
            Arg::with_name("prefix")
                .long("prefix")
                .value_name("OCTETS")
                .help("comma-separated leading octet values to pin, at most six")
                .takes_value(true),
        )
        .arg(state_arg());

    let read = SubCommand::with_name(READ_SUBCOMMAND)
        .version(CARGO_PKG_VERSION)
        .about("report the tracked address")
        .arg(state_arg());

    let delete = SubCommand::with_name(DELETE_SUBCOMMAND)
        .version(CARGO_PKG_VERSION)
        .about("forget the tracked address")
        .arg(state_arg());

    let import = SubCommand::with_name(IMPORT_SUBCOMMAND)
        .version(CARGO_PKG_VERSION)
        .about("adopt an externally assigned address")
        .arg(
            Arg::with_name("address")
                .value_name("ADDRESS")
                .help("the address to adopt, in xx:xx:xx:xx:xx:xx form")
                .required(true),
        )
        .arg(state_arg());

    let matches = App::new(CARGO_PKG_NAME)
        .version(CARGO_PKG_VERSION)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("increase logging verbosity"),
        )
        .subcommand(create)
        .subcommand(read)
        .subcommand(delete)
        .subcommand(import)
        .get_matches();

    let mut builder = Builder::from_default_env();
    match matches.occurrences_of("verbose") {
        0 => builder.filter(None, LevelFilter::Warn),
        1 => builder.filter(None, LevelFilter::Info),
        2 => builder.filter(None, LevelFilter::Debug),
        3 | _ => builder.filter(None, LevelFilter::Trace),
    };
    builder.init();

    let resources = registry();

    let result = if let Some(matches) = matches.subcommand_matches(CREATE_SUBCOMMAND) {
        main_create(&resources, matches)
    } else if let Some(matches) = matches.subcommand_matches(READ_SUBCOMMAND) {
        main_read(&resources, matches)
    } else if let Some(matches) = matches.subcommand_matches(DELETE_SUBCOMMAND) {
        main_delete(&resources, matches)
    } else if let Some(matches) = matches.subcommand_matches(IMPORT_SUBCOMMAND) {
        main_import(&resources, matches)
    } else {
        eprintln!("{}", matches.usage());
        exit(1);
    };

    if let Err(err) = result {
        error!("{}", err);
        eprintln!("error: {}", err);
        exit(1);
    }
}

fn main_create(
    resources: &HashMap<&'static str, Handlers>,
    matches: &clap::ArgMatches,
) -> Result<(), failure::Error> {
    let handlers = lookup(resources, RESOURCE_TYPE_NAME)?;
    let state_path = matches.value_of("state").unwrap();

    let mut config = ResourceConfig::default();
    if let Some(prefix) = matches.value_of("prefix") {
        config.prefix = parse_prefix_arg(prefix)?;
    }

    let state = load_state(state_path)?;
    let state = Transition::Create(config).apply(handlers, state)?;
    store_state(state_path, state.as_ref())?;

    if let Some(state) = state {
        info!("tracking address {}", state.address);
        println!("{}", state.address);
    }
    Ok(())
}

fn main_read(
    resources: &HashMap<&'static str, Handlers>,
    matches: &clap::ArgMatches,
) -> Result<(), failure::Error> {
    let handlers = lookup(resources, RESOURCE_TYPE_NAME)?;
    let state_path = matches.value_of("state").unwrap();

    let state = load_state(state_path)?
        .ok_or_else(|| ProviderError::NoInstance(RESOURCE_TYPE_NAME))?;
    let state = Transition::Read.apply(handlers, Some(state))?;

    // read never mutates, so nothing is written back
    if let Some(state) = state {
        println!("{}", state.address);
    }
    Ok(())
}

fn main_delete(
    resources: &HashMap<&'static str, Handlers>,
    matches: &clap::ArgMatches,
) -> Result<(), failure::Error> {
    let handlers = lookup(resources, RESOURCE_TYPE_NAME)?;
    let state_path = matches.value_of("state").unwrap();

    let state = load_state(state_path)?;
    if state.is_none() {
        warn!("no tracked address at {:?}, nothing to delete", state_path);
    }
    let state = Transition::Delete.apply(handlers, state)?;
    store_state(state_path, state.as_ref())?;
    Ok(())
}

fn main_import(
    resources: &HashMap<&'static str, Handlers>,
    matches: &clap::ArgMatches,
) -> Result<(), failure::Error> {
    let handlers = lookup(resources, RESOURCE_TYPE_NAME)?;
    let state_path = matches.value_of("state").unwrap();
    let address = matches.value_of("address").unwrap();

    let state = load_state(state_path)?;
    let state = Transition::Import(address.to_string()).apply(handlers, state)?;
    store_state(state_path, state.as_ref())?;

    if let Some(state) = state {
        info!("adopted address {}", state.address);
        println!("{}", state.address);
    }
    Ok(())
}

fn parse_prefix_arg(arg: &str) -> Result<Vec<i64>, failure::Error> {
    let mut values = Vec::new();
    for part in arg.split(',') {
        let part = part.trim();
        let value = part
            .parse::<i64>()
            .map_err(|_| format_err!("prefix octet {:?} is not an integer", part))?;
        values.push(value);
    }
    Ok(values)
}

fn load_state(path: &str) -> Result<Option<ResourceState>, failure::Error> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(ref err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let state = serde_json::from_slice(&data)?;
    Ok(Some(state))
}

fn store_state(path: &str, state: Option<&ResourceState>) -> Result<(), failure::Error> {
    match state {
        Some(state) => {
            let data = serde_json::to_vec_pretty(state)?;
            fs::write(path, data)?;
        }
        None => match fs::remove_file(path) {
            Ok(()) => (),
            Err(ref err) if err.kind() == io::ErrorKind::NotFound => (),
            Err(err) => return Err(err.into()),
        },
    }
    Ok(())
}
