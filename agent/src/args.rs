use clap::Parser;

/// Boot-time environment discovery, per §6: everything the pod needs to
/// find its ensemble and announce itself before a single line of the
/// clustering/lifecycle config (damper, checks, shell, ...) comes into
/// play — that part is baked into the pod binary by whoever implements
/// [`crate::api::LifeCycle`]/[`crate::api::Model`], not env-driven.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Cluster identifier shared by every peer this pod coordinates with.
    #[arg(long, env = "ochopod_cluster")]
    pub ochopod_cluster: String,

    /// Namespace the cluster lives in.
    #[arg(long, env = "ochopod_namespace", default_value = "default")]
    pub ochopod_namespace: String,

    /// Control-surface HTTP port.
    #[arg(long, env = "ochopod_port", default_value_t = 8080)]
    pub ochopod_port: u16,

    /// Lowers the tracing filter to `debug`.
    #[arg(long, env = "ochopod_debug", default_value_t = false)]
    pub ochopod_debug: bool,

    /// Spawn the child process immediately on the first `configure`
    /// rather than waiting for an explicit `/control/on`.
    #[arg(long, env = "ochopod_start", default_value_t = false)]
    pub ochopod_start: bool,

    /// Local-test mode: binds the control surface and resolves peers on
    /// localhost instead of through container networking.
    #[arg(long, env = "ochopod_local", default_value_t = false)]
    pub ochopod_local: bool,

    /// ZooKeeper ensemble connection string, e.g. `127.0.0.1:2181`.
    #[arg(long, env = "ochopod_zk")]
    pub ochopod_zk: String,
}
