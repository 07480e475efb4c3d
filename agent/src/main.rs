//! Default standalone binary: a pod that sleeps and says hello, the same
//! shape as the SDK's own minimal example. Real deployments depend on this
//! crate as a library and supply their own [`warden_agent::api::LifeCycle`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use warden_agent::api::{ConfigureOutput, LifeCycle, NoProbe, Tool};
use warden_agent::args::Args;
use warden_types::{ClusterView, PipedConfig, ReactiveConfig};

struct Sleeper;

#[async_trait]
impl LifeCycle for Sleeper {
    async fn configure(&self, _view: &ClusterView) -> anyhow::Result<ConfigureOutput> {
        let env = BTreeMap::from([("LAPSE".to_string(), "5".to_string())]);
        Ok(("sleep $LAPSE && echo 'hello world' && exit 0".to_string(), env))
    }
}

struct Echo;

#[async_trait]
impl Tool for Echo {
    fn tag(&self) -> &str {
        "echo"
    }

    async fn body(&self, args: &str, _workdir: &std::path::Path) -> anyhow::Result<String> {
        Ok(format!("your command was {args}"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let reactive = ReactiveConfig::default();
    let piped = PipedConfig { shell: true, pipe_subprocess: true, ..PipedConfig::default() };
    warden_agent::run(args, reactive, piped, Arc::new(Sleeper), Arc::new(NoProbe), vec![Arc::new(Echo)]).await
}
