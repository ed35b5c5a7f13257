use argh::FromArgs;

#[derive(FromArgs)]
#[argh(
    description = "Command line FTP file manager.
Settings not given on the command line are read from the SPROUTFTP_* environment variables."
)]
pub struct Args {
    #[argh(switch, short = 'D', description = "enable TRACE log level")]
    pub debug: bool,
    #[argh(switch, short = 'v', description = "verbose mode")]
    pub verbose: bool,
    #[argh(switch, short = 'V', description = "print version")]
    pub version: bool,
    #[argh(option, short = 'p', description = "control port (default: 21)")]
    pub port: Option<u16>,
    #[argh(option, short = 'u', description = "user name (default: anonymous)")]
    pub user: Option<String>,
    #[argh(switch, short = '4', description = "connect over IPv4 only")]
    pub ipv4: bool,
    #[argh(switch, short = '6', description = "connect over IPv6 only")]
    pub ipv6: bool,
    #[argh(option, description = "FTPS mode: explicit or implicit")]
    pub tls: Option<String>,
    #[argh(option, description = "connect timeout in milliseconds")]
    pub timeout: Option<u64>,
    #[argh(positional, description = "host to connect to")]
    pub host: Option<String>,
}
