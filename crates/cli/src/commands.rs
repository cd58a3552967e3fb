//! Clap command tree definition.
//!
//! Both subcommands take the same four positionals; what they mean depends
//! on the direction of the transfer.

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("tablesnap")
        .about("Snapshot and restore partitioned tables through an object store")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Config file (default: ./tablesnap.toml if present)")
                .value_parser(value_parser!(std::path::PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("compress")
                .long("compress")
                .help("Gzip snapshots (.7z suffix)")
                .action(ArgAction::SetTrue)
                .overrides_with("no-compress")
                .global(true),
        )
        .arg(
            Arg::new("no-compress")
                .long("no-compress")
                .help("Write plain-text snapshots")
                .action(ArgAction::SetTrue)
                .overrides_with("compress")
                .global(true),
        )
        .arg(
            Arg::new("page-size")
                .long("page-size")
                .value_name("N")
                .help("Rows per source query page")
                .value_parser(value_parser!(usize))
                .global(true),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .value_name("N")
                .help("Rows per restore transaction (1-100)")
                .value_parser(value_parser!(usize))
                .global(true),
        )
        .subcommand(build_backup())
        .subcommand(build_restore())
}

fn transfer_args(cmd: Command, source: &'static str, destination: &'static str) -> Command {
    cmd.arg(Arg::new("source").required(true).help(source))
        .arg(Arg::new("destination").required(true).help(destination))
        .arg(
            Arg::new("name")
                .required(true)
                .help("Blob root; its lowercased form names the container"),
        )
        .arg(
            Arg::new("folder")
                .required(true)
                .help("Folder inside the container"),
        )
}

fn build_backup() -> Command {
    let cmd = Command::new("backup").about("Back up tables into an object store");
    transfer_args(
        cmd,
        "Table store directory to read",
        "Object store directory to write",
    )
    .arg(
        Arg::new("table")
            .long("table")
            .value_name("TABLE")
            .help("Back up only this table"),
    )
    .arg(
        Arg::new("validate")
            .long("validate")
            .help("Read each snapshot written by this run back and check its footer")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("filter")
            .long("filter")
            .value_name("FILTER")
            .help("Row filter \"[and|or] <column> <op> <value>\" (repeatable)")
            .action(ArgAction::Append),
    )
    .arg(
        Arg::new("exclude")
            .long("exclude")
            .value_name("PROPERTY")
            .help("Leave a property out of every snapshot (repeatable)")
            .action(ArgAction::Append),
    )
}

fn build_restore() -> Command {
    let cmd = Command::new("restore").about("Restore tables from an object store");
    transfer_args(
        cmd,
        "Object store directory to read",
        "Table store directory to write",
    )
    .arg(
        Arg::new("file")
            .long("file")
            .value_name("FILE")
            .help("Restore only this snapshot inside the folder"),
    )
    .arg(
        Arg::new("table")
            .long("table")
            .value_name("TABLE")
            .requires("file")
            .help("Destination table for --file (default: the file stem, or --original)"),
    )
    .arg(
        Arg::new("original")
            .long("original")
            .value_name("TABLE")
            .requires("file")
            .help("Restore --file from the per-table folder of TABLE, downloading it first"),
    )
    .arg(
        Arg::new("work-dir")
            .long("work-dir")
            .value_name("PATH")
            .requires("original")
            .help("Download directory for --original (default: working_directory from the config, then the system temp dir)")
            .value_parser(value_parser!(std::path::PathBuf)),
    )
}
