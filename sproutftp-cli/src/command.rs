use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    List(Option<String>),
    Mkdir(String),
    /// Local file, remote destination, overwrite
    Put(PathBuf, Option<String>, bool),
    Quit,
    Retr(String, PathBuf),
    Rm(String),
}

impl FromStr for Command {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split string by space
        let mut args = s.split_ascii_whitespace();
        // Match args
        match args.next() {
            Some(cmd) => match cmd.to_ascii_uppercase().as_str() {
                "HELP" => Ok(Self::Help),
                "LIST" | "LS" => match args.next() {
                    Some(dir) => Ok(Self::List(Some(dir.to_string()))),
                    None => Ok(Self::List(None)),
                },
                "MKDIR" => match args.next() {
                    Some(dir) => Ok(Self::Mkdir(dir.to_string())),
                    None => Err("Missing `dir` field"),
                },
                cmd @ ("PUT" | "PUTNEW") => {
                    let local: PathBuf = match args.next() {
                        Some(l) => PathBuf::from(l),
                        None => return Err("Missing `file` field"),
                    };
                    let dest = args.next().map(String::from);
                    Ok(Self::Put(local, dest, cmd == "PUT"))
                }
                "QUIT" | "EXIT" => Ok(Self::Quit),
                "RETR" | "GET" => {
                    let file: String = match args.next() {
                        Some(f) => f.to_string(),
                        None => return Err("Missing `file` field"),
                    };
                    match args.next() {
                        Some(d) => Ok(Self::Retr(file, PathBuf::from(d))),
                        None => Err("Missing `dest` field"),
                    }
                }
                "RM" | "DELETE" => match args.next() {
                    Some(path) => Ok(Self::Rm(path.to_string())),
                    None => Err("Missing `path` field"),
                },
                _ => Err("Unknown command"),
            },
            None => Err("Unknown command"),
        }
    }
}
