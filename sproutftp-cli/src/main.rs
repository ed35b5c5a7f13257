//! # SproutFTP Client
//!
//! Command line file manager. Each command opens its own FTP session, runs, then quits.
//!

// -- mods
mod actions;
mod args;
mod command;

use std::io;
use std::io::Write;
use std::process::exit;
use std::str::FromStr;
use std::time::Duration;

use actions::*;
use args::Args;
use command::Command;
use env_logger::Builder as LogBuilder;
use log::LevelFilter;
use sproutftp::config::ENV_PASSWORD;
use sproutftp::{Config, EncryptionMode, FileManager, IpVersion};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

fn usage() {
    println!("Available commands:");
    println!("HELP                                Print this help");
    println!("LIST [dir]                          List files. If directory is not provided, the default path is used");
    println!("MKDIR <dir>                         Create directory");
    println!("PUT <file> [dest]                   Upload local file `file` to `dest`, replacing it");
    println!("PUTNEW <file> [dest]                Upload local file `file` to `dest`, unless it exists");
    println!("QUIT                                Quit sproutftp");
    println!("RETR <file> <dest>                  Download `file` to `dest`");
    println!("RM <path>                           Remove file or empty directory");
}

fn input() -> Option<Command> {
    loop {
        print!(">> ");
        let _ = io::stdout().flush();
        let mut input: String = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(err) => {
                eprintln!("Failed to read stdin: {}", err);
                return None;
            }
        }
        // Try to create command
        match Command::from_str(input.as_str()) {
            Ok(cmd) => return Some(cmd),
            Err(err) => println!("{}", err),
        }
    }
}

/// Environment settings, overridden by the command line
fn config(args: Args) -> Result<Config, String> {
    let mut config = Config::from_env().map_err(|e| e.to_string())?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(timeout) = args.timeout {
        config.connect_timeout = Duration::from_millis(timeout);
    }
    config.ip_version = match (args.ipv4, args.ipv6) {
        (true, true) => return Err(String::from("-4 and -6 are mutually exclusive")),
        (true, false) => IpVersion::V4,
        (false, true) => IpVersion::V6,
        (false, false) => config.ip_version,
    };
    if let Some(tls) = args.tls {
        config.encryption = EncryptionMode::from_str(&tls)
            .map_err(|_| format!("invalid TLS mode: {tls}"))?;
    }
    if let Some(user) = args.user {
        config.username = user;
        if std::env::var(ENV_PASSWORD).is_err() {
            config.password = rpassword::prompt_password("Password: ")
                .map_err(|e| format!("Could not read password: {e}"))?;
        }
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn main() {
    let args: Args = argh::from_env();
    // print version
    if args.version {
        println!("sproutftp {APP_VERSION} - developed by {APP_AUTHORS}");
        return;
    }
    // init logger
    LogBuilder::new()
        .filter_level(if args.debug {
            LevelFilter::Trace
        } else if args.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Off
        })
        .init();
    let manager = match config(args)
        .and_then(|config| FileManager::new(config).map_err(|e| e.to_string()))
    {
        Ok(manager) => manager,
        Err(err) => {
            eprintln!("Invalid configuration: {}", err);
            exit(1);
        }
    };
    println!(
        "Using {}:{} as {} (type HELP for commands)",
        manager.config().host,
        manager.config().port,
        manager.config().username
    );
    // Main loop
    while let Some(command) = input() {
        match command {
            Command::Quit => break,
            cmd => perform(&manager, cmd),
        }
    }
}

fn perform(manager: &FileManager, command: Command) {
    match command {
        Command::Help => usage(),
        Command::List(p) => list(manager, p.as_deref()),
        Command::Mkdir(dir) => mkdir(manager, dir.as_str()),
        Command::Put(src, dest, overwrite) => put(manager, src.as_path(), dest.as_deref(), overwrite),
        Command::Retr(file, dest) => retr(manager, file.as_str(), dest.as_path()),
        Command::Rm(path) => rm(manager, path.as_str()),
        Command::Quit => {}
    }
}
