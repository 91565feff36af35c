use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tarsoft::commands::{ConfigOptions, InstallRequest, install, locate};
use tarsoft::install::InstallSettings;
use tarsoft::integrity::IgnoreList;
use tarsoft::lock::LockPolicy;
use tarsoft::package::PackageRef;

/// tarsoft - shared-area software installer
///
/// Install versioned software packages and their dependencies into shared
/// install areas, then print the environment needed to use them.
///
/// Examples:
///   tarsoft --platform x86_64-slc5-gcc43-opt install ddsim 1.0 --area /sw
///   eval "$(tarsoft install root 6.0 --area /sw)"
///   tarsoft install lcsim 1.2 --area /sw -- java -jar lcsim.jar
#[derive(Parser, Debug)]
#[command(author, version = env!("TARSOFT_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Package configuration file (also via TARSOFT_CONFIG)
    #[arg(long, env = "TARSOFT_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Platform the packages are looked up for (also via TARSOFT_PLATFORM)
    #[arg(long, env = "TARSOFT_PLATFORM", global = true, default_value = "")]
    platform: String,

    /// Print more details (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install a package and its dependencies
    Install(InstallArgs),

    /// Show what the configuration registers for a package
    Locate(LocateArgs),
}

#[derive(clap::Args, Debug)]
struct InstallArgs {
    /// Package name, e.g. root
    name: String,

    /// Package version, e.g. 6.0
    version: String,

    /// Install area, tried in the given order (also via TARSOFT_AREAS, colon separated)
    #[arg(
        long = "area",
        short = 'a',
        env = "TARSOFT_AREAS",
        value_name = "DIR",
        value_delimiter = ':'
    )]
    areas: Vec<PathBuf>,

    /// Minutes after which a lock is considered abandoned
    #[arg(long, value_name = "MINUTES", default_value_t = 30)]
    lock_stale_minutes: u64,

    /// Number of waits on a held lock before giving up
    #[arg(long, value_name = "N", default_value_t = 60)]
    lock_wait_cycles: u32,

    /// Seconds between two checks of a held lock
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    lock_interval_secs: u64,

    /// Extra file pattern to ignore in manifests and bundled libraries
    #[arg(long = "ignore", value_name = "PATTERN")]
    ignore: Vec<String>,

    /// Print the installation as JSON instead of export lines
    #[arg(long)]
    json: bool,

    /// Command to run with the resulting environment
    #[arg(last = true, value_name = "COMMAND")]
    command: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct LocateArgs {
    name: String,
    version: String,

    /// Print the metadata as JSON
    #[arg(long)]
    json: bool,
}

impl InstallArgs {
    fn settings(&self) -> InstallSettings {
        let mut ignore = IgnoreList::default();
        ignore.extend(self.ignore.iter().cloned());
        InstallSettings {
            lock_policy: LockPolicy {
                stale_threshold: Duration::from_secs(self.lock_stale_minutes * 60),
                max_wait_cycles: self.lock_wait_cycles,
                cycle_interval: Duration::from_secs(self.lock_interval_secs),
            },
            ignore,
            ..InstallSettings::default()
        }
    }
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(cli.verbose)))
        .init();
    if cli.platform.is_empty() {
        anyhow::bail!("No platform given, use --platform or TARSOFT_PLATFORM");
    }
    let runtime = tarsoft::runtime::RealRuntime;

    match cli.command {
        Commands::Install(args) => {
            let options = ConfigOptions {
                config_file: cli.config,
                platform: cli.platform,
                settings: args.settings(),
            };
            let request = InstallRequest {
                package: PackageRef::new(args.name, args.version),
                areas: args.areas,
                json: args.json,
                command: args.command,
            };
            install(runtime, options, request).await?
        }
        Commands::Locate(args) => {
            let options = ConfigOptions {
                config_file: cli.config,
                platform: cli.platform,
                settings: InstallSettings::default(),
            };
            locate(
                runtime,
                options,
                &PackageRef::new(args.name, args.version),
                args.json,
            )?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from([
            "tarsoft",
            "--platform",
            "linux",
            "install",
            "root",
            "6.0",
            "--area",
            "/sw/a",
            "--area",
            "/sw/b",
        ])
        .unwrap();
        assert_eq!(cli.platform, "linux");
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.name, "root");
                assert_eq!(args.version, "6.0");
                assert_eq!(args.areas, vec![PathBuf::from("/sw/a"), PathBuf::from("/sw/b")]);
                assert!(!args.json);
                assert!(args.command.is_empty());
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_areas_colon_separated() {
        let cli = Cli::try_parse_from(["tarsoft", "install", "root", "6.0", "--area", "/sw/a:/sw/b"])
            .unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.areas, vec![PathBuf::from("/sw/a"), PathBuf::from("/sw/b")]);
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_lock_tunables_and_ignore() {
        let cli = Cli::try_parse_from([
            "tarsoft",
            "install",
            "root",
            "6.0",
            "--lock-stale-minutes",
            "5",
            "--lock-wait-cycles",
            "3",
            "--lock-interval-secs",
            "1",
            "--ignore",
            "*.pyc",
        ])
        .unwrap();
        match cli.command {
            Commands::Install(args) => {
                let settings = args.settings();
                assert_eq!(settings.lock_policy.stale_threshold, Duration::from_secs(300));
                assert_eq!(settings.lock_policy.max_wait_cycles, 3);
                assert_eq!(settings.lock_policy.cycle_interval, Duration::from_secs(1));
                assert!(settings.ignore.matches("lib/module.pyc"));
                assert!(settings.ignore.matches("lib/libc.so.6"));
                assert_eq!(settings.checksum_attempts, 2);
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_trailing_command() {
        let cli = Cli::try_parse_from([
            "tarsoft", "install", "lcsim", "1.2", "--", "java", "-jar", "lcsim.jar",
        ])
        .unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.command, vec!["java", "-jar", "lcsim.jar"]);
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_locate_parsing() {
        let cli = Cli::try_parse_from(["tarsoft", "locate", "ddsim", "1.0", "--json", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Locate(args) => {
                assert_eq!(args.name, "ddsim");
                assert!(args.json);
            }
            _ => panic!("Expected Locate command"),
        }
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["tarsoft", "root"]).is_err());
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(log_filter(0), "warn");
        assert_eq!(log_filter(1), "info");
        assert_eq!(log_filter(5), "debug");
    }
}
