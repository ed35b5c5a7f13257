//! # Test server
//!
//! In-process FTP server for the unit tests. It serves an in-memory tree over PASV and EPSV
//! and records every command line it receives. Replies to single commands can be replaced
//! with canned lines to reproduce misbehaving servers.

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::Config;

pub const TEST_USER: &str = "test";
pub const TEST_PASSWORD: &str = "test";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Dir,
    File(Vec<u8>),
}

type Tree = Arc<Mutex<BTreeMap<String, Node>>>;

#[derive(Debug, Clone)]
struct Options {
    greeting: Vec<String>,
    credentials: Option<(String, String)>,
    listing: Option<String>,
    size_supported: bool,
    hang_on: Option<String>,
    silent: bool,
    pasv_ip: String,
    overrides: HashMap<String, Vec<String>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            greeting: vec![String::from("220 sproutftp test server ready")],
            credentials: Some((TEST_USER.to_string(), TEST_PASSWORD.to_string())),
            listing: None,
            size_supported: true,
            hang_on: None,
            silent: false,
            pasv_ip: String::from("127,0,0,1"),
            overrides: HashMap::new(),
        }
    }
}

/// Builds a [`TestServer`]
#[derive(Default)]
pub struct TestServerBuilder {
    options: Options,
    tree: BTreeMap<String, Node>,
}

impl TestServerBuilder {
    /// Lines sent on connect
    pub fn greeting(mut self, lines: &[&str]) -> Self {
        self.options.greeting = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Accept `USER` without a password
    pub fn anonymous(mut self) -> Self {
        self.options.credentials = None;
        self
    }

    /// Send `body` as is for every `LIST`
    pub fn raw_listing(mut self, body: &str) -> Self {
        self.options.listing = Some(body.to_string());
        self
    }

    /// Answer `SIZE` with 502
    pub fn without_size(mut self) -> Self {
        self.options.size_supported = false;
        self
    }

    /// Close the control connection when `command` is received
    pub fn hang_on(mut self, command: &str) -> Self {
        self.options.hang_on = Some(command.to_string());
        self
    }

    /// Accept connections but never greet
    pub fn silent(mut self) -> Self {
        self.options.silent = true;
        self
    }

    /// Address advertised in PASV replies, as `h1,h2,h3,h4`
    pub fn pasv_ip(mut self, ip: &str) -> Self {
        self.options.pasv_ip = ip.to_string();
        self
    }

    /// Answer `command` with `lines` instead of running it
    pub fn reply_to(mut self, command: &str, lines: &[&str]) -> Self {
        self.options.overrides.insert(
            command.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.tree.insert(path.to_string(), Node::Dir);
        self
    }

    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.tree
            .insert(path.to_string(), Node::File(content.to_vec()));
        self
    }

    pub fn start(self) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = TestServer {
            addr,
            received: Arc::new(Mutex::new(Vec::new())),
            tree: Arc::new(Mutex::new(self.tree)),
        };
        let options = Arc::new(self.options);
        let received = server.received.clone();
        let tree = server.tree.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let options = options.clone();
                let received = received.clone();
                let tree = tree.clone();
                thread::spawn(move || serve(stream, &options, &received, &tree));
            }
        });
        server
    }
}

/// A running test server. Threads are left running until the test binary exits
pub struct TestServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    tree: Tree,
}

impl TestServer {
    pub fn builder() -> TestServerBuilder {
        TestServerBuilder::default()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Settings to reach this server with the test credentials
    pub fn config(&self) -> Config {
        Config::new("127.0.0.1")
            .port(self.port())
            .credentials(TEST_USER, TEST_PASSWORD)
            .connect_timeout(Duration::from_secs(5))
    }

    /// Command lines received so far, over all connections
    pub fn commands(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Whether a command starting with `prefix` was received
    pub fn received(&self, prefix: &str) -> bool {
        self.commands().iter().any(|line| line.starts_with(prefix))
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.tree.lock().unwrap().get(path) {
            Some(Node::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        is_dir(&self.tree.lock().unwrap(), path)
    }
}

fn serve(stream: TcpStream, options: &Options, received: &Mutex<Vec<String>>, tree: &Tree) {
    if options.silent {
        thread::sleep(Duration::from_secs(30));
        return;
    }
    let Ok(mut writer) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(stream);
    for line in &options.greeting {
        reply(&mut writer, line);
    }
    let mut cwd = String::from("/");
    let mut user: Option<String> = None;
    let mut data: Option<TcpListener> = None;
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        received.lock().unwrap().push(line.clone());
        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command.to_ascii_uppercase(), arg.to_string()),
            None => (line.to_ascii_uppercase(), String::new()),
        };
        if options.hang_on.as_deref() == Some(command.as_str()) {
            return;
        }
        if let Some(lines) = options.overrides.get(&command) {
            for line in lines {
                reply(&mut writer, line);
            }
            continue;
        }
        let path = resolve(&cwd, &arg);
        match command.as_str() {
            "USER" => match &options.credentials {
                None => reply(&mut writer, "230 Login successful."),
                Some(_) => {
                    user = Some(arg);
                    reply(&mut writer, "331 Please specify the password.");
                }
            },
            "PASS" => match &options.credentials {
                Some((u, p)) if user.as_deref() == Some(u.as_str()) && &arg == p => {
                    reply(&mut writer, "230 Login successful.")
                }
                _ => reply(&mut writer, "530 Login incorrect."),
            },
            "TYPE" => reply(&mut writer, "200 Switching to Binary mode."),
            "NOOP" => reply(&mut writer, "200 NOOP ok."),
            "PWD" => reply(
                &mut writer,
                &format!("257 \"{}\" is the current directory", cwd.replace('"', "\"\"")),
            ),
            "CWD" => {
                if is_dir(&tree.lock().unwrap(), &path) {
                    cwd = path;
                    reply(&mut writer, "250 Directory successfully changed.");
                } else {
                    reply(&mut writer, "550 Failed to change directory.");
                }
            }
            "MKD" => {
                let mut tree = tree.lock().unwrap();
                if path == "/" || tree.contains_key(&path) || !is_dir(&tree, &parent(&path)) {
                    reply(&mut writer, "550 Create directory operation failed.");
                } else {
                    tree.insert(path.clone(), Node::Dir);
                    reply(&mut writer, &format!("257 \"{path}\" created"));
                }
            }
            "RMD" => {
                let mut tree = tree.lock().unwrap();
                let has_children = tree.keys().any(|p| parent(p) == path);
                if tree.get(&path) == Some(&Node::Dir) && !has_children {
                    tree.remove(&path);
                    reply(&mut writer, "250 Remove directory operation successful.");
                } else {
                    reply(&mut writer, "550 Remove directory operation failed.");
                }
            }
            "DELE" => {
                let mut tree = tree.lock().unwrap();
                if matches!(tree.get(&path), Some(Node::File(_))) {
                    tree.remove(&path);
                    reply(&mut writer, "250 Delete operation successful.");
                } else {
                    reply(&mut writer, "550 Delete operation failed.");
                }
            }
            "SIZE" if !options.size_supported => {
                reply(&mut writer, "502 Command not implemented.")
            }
            "SIZE" => match tree.lock().unwrap().get(&path) {
                Some(Node::File(content)) => reply(&mut writer, &format!("213 {}", content.len())),
                _ => reply(&mut writer, "550 Could not get file size."),
            },
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").unwrap();
                let port = listener.local_addr().unwrap().port();
                data = Some(listener);
                reply(
                    &mut writer,
                    &format!(
                        "227 Entering Passive Mode ({},{},{}).",
                        options.pasv_ip,
                        port >> 8,
                        port & 0xff
                    ),
                );
            }
            "EPSV" => {
                let listener = TcpListener::bind("127.0.0.1:0").unwrap();
                let port = listener.local_addr().unwrap().port();
                data = Some(listener);
                reply(
                    &mut writer,
                    &format!("229 Entering Extended Passive Mode (|||{port}|)"),
                );
            }
            "LIST" => {
                let Some(listener) = data.take() else {
                    reply(&mut writer, "425 Use PASV or EPSV first.");
                    continue;
                };
                let body = match &options.listing {
                    Some(body) => Some(body.clone()),
                    None => list(&tree.lock().unwrap(), &path),
                };
                match body {
                    Some(body) => {
                        reply(&mut writer, "150 Here comes the directory listing.");
                        if let Ok((mut stream, _)) = listener.accept() {
                            let _ = stream.write_all(body.as_bytes());
                        }
                        reply(&mut writer, "226 Directory send OK.");
                    }
                    None => reply(&mut writer, "550 No such file or directory."),
                }
            }
            "RETR" => {
                let Some(listener) = data.take() else {
                    reply(&mut writer, "425 Use PASV or EPSV first.");
                    continue;
                };
                let content = match tree.lock().unwrap().get(&path) {
                    Some(Node::File(content)) => Some(content.clone()),
                    _ => None,
                };
                match content {
                    Some(content) => {
                        reply(&mut writer, "150 Opening BINARY mode data connection.");
                        if let Ok((mut stream, _)) = listener.accept() {
                            let _ = stream.write_all(&content);
                        }
                        reply(&mut writer, "226 Transfer complete.");
                    }
                    None => reply(&mut writer, "550 Failed to open file."),
                }
            }
            "STOR" => {
                let Some(listener) = data.take() else {
                    reply(&mut writer, "425 Use PASV or EPSV first.");
                    continue;
                };
                let writable = {
                    let tree = tree.lock().unwrap();
                    is_dir(&tree, &parent(&path)) && tree.get(&path) != Some(&Node::Dir)
                };
                if !writable {
                    reply(&mut writer, "553 Could not create file.");
                    continue;
                }
                reply(&mut writer, "150 Ok to send data.");
                let mut content = Vec::new();
                if let Ok((mut stream, _)) = listener.accept() {
                    let _ = stream.read_to_end(&mut content);
                }
                tree.lock().unwrap().insert(path, Node::File(content));
                reply(&mut writer, "226 Transfer complete.");
            }
            "QUIT" => {
                reply(&mut writer, "221 Goodbye.");
                return;
            }
            _ => reply(&mut writer, "502 Command not implemented."),
        }
    }
}

fn reply(writer: &mut TcpStream, line: &str) {
    let _ = writer.write_all(format!("{line}\r\n").as_bytes());
}

/// Absolute, normalized path of `path` relative to `cwd`
fn resolve(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{cwd}/{path}")
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => String::from("/"),
        Some((parent, _)) => parent.to_string(),
    }
}

fn is_dir(tree: &BTreeMap<String, Node>, path: &str) -> bool {
    path == "/" || tree.get(path) == Some(&Node::Dir)
}

/// Unix style listing of `path`; `None` if it doesn't exist
fn list(tree: &BTreeMap<String, Node>, path: &str) -> Option<String> {
    let line = |name: &str, node: &Node| match node {
        Node::Dir => format!("drwxr-xr-x    2 ftp      ftp          4096 Jan 01 2024 {name}\r\n"),
        Node::File(content) => format!(
            "-rw-r--r--    1 ftp      ftp      {:>8} Jan 01 2024 {name}\r\n",
            content.len()
        ),
    };
    if is_dir(tree, path) {
        Some(
            tree.iter()
                .filter(|(p, _)| p.as_str() != "/" && parent(p) == path)
                .map(|(p, node)| line(p.rsplit('/').next().unwrap_or(p), node))
                .collect(),
        )
    } else {
        tree.get(path)
            .map(|node| line(path.rsplit('/').next().unwrap_or(path), node))
    }
}

#[cfg(test)]
mod test {

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn should_resolve_paths() {
        assert_eq!(resolve("/", "").as_str(), "/");
        assert_eq!(resolve("/", "a.txt").as_str(), "/a.txt");
        assert_eq!(resolve("/pub", "a.txt").as_str(), "/pub/a.txt");
        assert_eq!(resolve("/pub", "/a.txt").as_str(), "/a.txt");
        assert_eq!(resolve("/pub/docs", "../a.txt").as_str(), "/pub/a.txt");
        assert_eq!(parent("/pub/a.txt").as_str(), "/pub");
        assert_eq!(parent("/a.txt").as_str(), "/");
    }
}
