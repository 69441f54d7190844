// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use nplan::{NetplanState, Parser, ParserFlags};

fn main() {
    let cli_cmd = clap::Command::new("npg")
        .about("Generate backend configuration files from nplan YAML")
        .arg(
            clap::Arg::new("quiet")
                .short('q')
                .action(clap::ArgAction::SetTrue)
                .help("Disable logging"),
        )
        .arg(
            clap::Arg::new("verbose")
                .short('v')
                .action(clap::ArgAction::Count)
                .help("Increase verbose level"),
        )
        .arg(
            clap::Arg::new("root-dir")
                .long("root-dir")
                .value_name("DIR")
                .help(
                    "Search for and generate configuration files in \
                     this root directory instead of /",
                ),
        )
        .arg(
            clap::Arg::new("ignore-errors")
                .long("ignore-errors")
                .action(clap::ArgAction::SetTrue)
                .help(
                    "Log errors as warnings and drop the offending \
                     definitions instead of aborting",
                ),
        )
        .arg(
            clap::Arg::new("networkmanager-only")
                .long("networkmanager-only")
                .action(clap::ArgAction::SetTrue)
                .help("Only generate NetworkManager configuration"),
        )
        .arg(
            clap::Arg::new("input-file")
                .value_name("FILE")
                .num_args(0..)
                .help(
                    "Load these YAML files instead of walking the \
                     configuration hierarchy",
                ),
        );

    let matches = cli_cmd.get_matches();

    if !matches.get_flag("quiet") {
        let log_level = match matches.get_count("verbose") {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::new()
            .filter(Some("nplan"), log_level)
            .filter(Some("npg"), log_level)
            .init();
    }

    if let Err(e) = run(&matches) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run(matches: &clap::ArgMatches) -> Result<(), nplan::NplanError> {
    let root_dir = matches
        .get_one::<String>("root-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"));

    if nplan::try_stamp_exists(&root_dir) {
        return Err(nplan::NplanError::new(
            nplan::ErrorKind::FileError,
            format!(
                "Another 'try' transaction is in progress; remove {} \
                 to proceed",
                root_dir.join(nplan::TRY_STAMP_PATH).display()
            ),
        ));
    }

    let mut parser = Parser::new();
    if matches.get_flag("ignore-errors") {
        parser.set_flags(ParserFlags {
            ignore_errors: true,
        });
    }

    let input_files: Vec<&String> = matches
        .get_many::<String>("input-file")
        .map(|files| files.collect())
        .unwrap_or_default();
    if input_files.is_empty() {
        parser.load_yaml_hierarchy(&root_dir)?;
    } else {
        for file in input_files {
            parser.load_yaml(Path::new(file))?;
        }
    }

    let mut state = NetplanState::new();
    state.import_parser_results(&mut parser)?;

    if !matches.get_flag("networkmanager-only") {
        state.finish_networkd_write(&root_dir)?;
    }
    state.finish_nm_write(&root_dir)?;

    if state.error_count() > 0 {
        log::warn!(
            "generation finished with {} ignored error(s)",
            state.error_count()
        );
    }
    log::debug!("processed {} definition(s)", state.len());
    Ok(())
}
