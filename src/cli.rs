use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use topology::{FilterOptions, WILDCARD};

#[derive(Parser)]
#[command(name = "clusteradm")]
#[command(version)]
#[command(about = "Deploy and operate a storage cluster across many hosts", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level; also shows one status row per instance
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Host directory
    #[arg(long, global = true, default_value = "hosts.yaml")]
    pub hosts: PathBuf,

    /// Cluster topology
    #[arg(long, global = true, default_value = "topology.yaml")]
    pub topology: PathBuf,

    /// Settings file (default: ~/.clusteradm/clusteradm.toml)
    #[arg(long, global = true, env = "CLUSTERADM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check hosts are ready for deployment
    Precheck(FilterArgs),

    /// Deploy the cluster
    Deploy(FilterArgs),

    /// Start services
    Start(FilterArgs),

    /// Stop services
    Stop(FilterArgs),

    /// Restart services
    Restart(FilterArgs),

    /// Replace service containers with the topology's current image
    Upgrade(FilterArgs),

    /// Remove service logs, data and containers
    Clean(CleanArgs),

    /// Show service status
    Status(FilterArgs),

    /// Run a shell command on every host of the cluster
    Exec(ExecArgs),

    /// Open a shell inside a service container
    Enter {
        /// Service id
        id: String,
    },

    /// Manage filesystem client mounts
    #[command(subcommand)]
    Client(ClientCommand),

    /// Manage monitoring services
    #[command(subcommand)]
    Monitor(MonitorCommand),

    /// Manage hosts
    #[command(subcommand)]
    Hosts(HostsCommand),

    /// Show recent invocations
    Audit {
        /// Number of records to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Service selection; `*` matches everything
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Service id
    #[arg(long, default_value = WILDCARD)]
    pub id: String,

    /// Service role
    #[arg(long, default_value = WILDCARD)]
    pub role: String,

    /// Host name
    #[arg(long = "host", default_value = WILDCARD)]
    pub host: String,
}

impl FilterArgs {
    pub fn options(&self) -> FilterOptions {
        FilterOptions::default()
            .id(&self.id)
            .role(&self.role)
            .host(&self.host)
    }
}

#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// What to remove: log, data, container (default: all)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ExecArgs {
    /// Only this host
    #[arg(long = "host", default_value = WILDCARD)]
    pub host: String,

    /// Command to run
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Subcommand)]
pub enum ClientCommand {
    /// Mount filesystems
    Mount(ClientArgs),

    /// Unmount filesystems
    Umount(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Client mounts config
    #[arg(long, default_value = "client.yaml")]
    pub clients: PathBuf,

    /// Only this host
    #[arg(long = "host", default_value = WILDCARD)]
    pub host: String,
}

#[derive(Subcommand)]
pub enum MonitorCommand {
    /// Start monitoring services
    Start(MonitorArgs),

    /// Stop monitoring services
    Stop(MonitorArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MonitorArgs {
    /// Monitor config
    #[arg(long, default_value = "monitor.yaml")]
    pub monitors: PathBuf,

    /// Only this role (prometheus, grafana, node_exporter)
    #[arg(long, default_value = WILDCARD)]
    pub role: String,
}

#[derive(Subcommand)]
pub enum HostsCommand {
    /// Check SSH connectivity to every host
    Check,

    /// List hosts
    List,

    /// Copy a local file to every host
    Copy {
        /// Local file
        source: PathBuf,

        /// Destination path on each host
        destination: String,

        /// Only this host
        #[arg(long = "host", default_value = WILDCARD)]
        host: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "clusteradm", "stop", "--role", "mds", "-y", "--topology", "t.yaml",
        ])
        .unwrap();
        assert!(cli.yes);
        assert_eq!(cli.topology, PathBuf::from("t.yaml"));
        let Command::Stop(filter) = cli.command else {
            panic!("expected stop");
        };
        assert_eq!(filter.role, "mds");
        assert_eq!(filter.id, WILDCARD);
    }

    #[test]
    fn test_clean_only_is_comma_separated() {
        let cli = Cli::try_parse_from(["clusteradm", "clean", "--only", "log,data"]).unwrap();
        let Command::Clean(args) = cli.command else {
            panic!("expected clean");
        };
        assert_eq!(args.only, vec!["log", "data"]);
    }

    #[test]
    fn test_exec_takes_trailing_command() {
        let cli = Cli::try_parse_from(["clusteradm", "exec", "df", "-h", "/data"]).unwrap();
        let Command::Exec(args) = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(args.command, vec!["df", "-h", "/data"]);
    }

    #[test]
    fn test_status_verbose() {
        let cli = Cli::try_parse_from(["clusteradm", "status", "--verbose"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }
}
