//! Boot-time discovery of this pod's [`Breadcrumbs`] from its environment,
//! mirroring the generic Marathon binding's `$HOST`/`PORT_*` convention
//! when no richer platform integration is wired in.

use std::collections::BTreeMap;
use std::net::ToSocketAddrs;

use warden_types::Breadcrumbs;

use crate::args::Args;

pub fn discover(args: &Args, uuid: &str) -> Breadcrumbs {
    let ports = port_mappings();

    let (ip, public, node) = if args.ochopod_local {
        ("127.0.0.1".to_string(), "127.0.0.1".to_string(), "local".to_string())
    } else {
        let host = std::env::var("HOST").unwrap_or_else(|_| "localhost".to_string());
        let ip = resolve(&host).unwrap_or_else(|| host.clone());
        (ip.clone(), ip, host)
    };

    let application = std::env::var("MARATHON_APP_ID")
        .map(|id| id.trim_start_matches('/').to_string())
        .unwrap_or_else(|_| args.ochopod_cluster.clone());
    let task = std::env::var("MESOS_TASK_ID").unwrap_or_else(|_| uuid.to_string());

    Breadcrumbs {
        cluster: args.ochopod_cluster.clone(),
        namespace: args.ochopod_namespace.clone(),
        port: args.ochopod_port,
        ip,
        public,
        ports,
        node,
        task,
        application,
        seq: 0,
    }
}

fn port_mappings() -> BTreeMap<String, u16> {
    std::env::vars()
        .filter_map(|(key, val)| {
            let exposed = key.strip_prefix("PORT_")?;
            let host_port: u16 = val.parse().ok()?;
            Some((exposed.to_string(), host_port))
        })
        .collect()
}

fn resolve(host: &str) -> Option<String> {
    (host, 0u16).to_socket_addrs().ok()?.find_map(|addr| if addr.is_ipv4() { Some(addr.ip().to_string()) } else { None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(local: bool) -> Args {
        let mut args = Args::parse_from(["agentd", "--ochopod-cluster", "web", "--ochopod-zk", "127.0.0.1:2181"]);
        args.ochopod_local = local;
        args
    }

    #[test]
    fn local_mode_defaults_to_loopback() {
        let breadcrumbs = discover(&args(true), "u1");
        assert_eq!(breadcrumbs.ip, "127.0.0.1");
        assert_eq!(breadcrumbs.node, "local");
    }
}
