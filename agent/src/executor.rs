//! Lifecycle Executor (§4.6): one per pod. FIFO-serializes `check`/`on`/
//! `off`/`ok`/`kill`/`signal` against a single supervised child process.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use owo_colors::OwoColorize;
use serde_json::Value;
use tokio::process::{Child, Command as ProcessCommand};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use warden_common::colors::EXECUTOR;
use warden_types::{ClusterView, PipedConfig, ProcessState};

use crate::api::LifeCycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Check,
    On,
    Off,
    Ok,
    Kill,
    Signal,
}

/// A request arriving from the Control Surface: reply carries `(status,
/// body)`, matching §4.7's "reply with the executor's `(body, code)`".
pub struct ExecutorRequest {
    pub command: Command,
    pub payload: Value,
    pub reply: oneshot::Sender<(u16, Value)>,
}

enum Pending {
    External(ExecutorRequest),
    Internal(Command, Value),
}

pub struct Executor {
    hints: warden_types::Hints,
    lifecycle: Arc<dyn LifeCycle>,
    config: PipedConfig,
    start: bool,
    rx: mpsc::Receiver<ExecutorRequest>,
    cancel: CancellationToken,
    terminate_tx: mpsc::Sender<()>,

    queue: VecDeque<Pending>,
    child: Option<Child>,
    pid: Option<u32>,
    initialized: bool,
    spawned_before: bool,
    last_view: Option<ClusterView>,
    failures: u32,
    credit: u32,
    next_sanity_check: Instant,
}

impl Executor {
    pub fn new(
        hints: warden_types::Hints,
        lifecycle: Arc<dyn LifeCycle>,
        config: PipedConfig,
        start: bool,
        rx: mpsc::Receiver<ExecutorRequest>,
        cancel: CancellationToken,
        terminate_tx: mpsc::Sender<()>,
    ) -> Self {
        let credit = config.checks;
        Executor {
            hints,
            lifecycle,
            config,
            start,
            rx,
            cancel,
            terminate_tx,
            queue: VecDeque::new(),
            child: None,
            pid: None,
            initialized: false,
            spawned_before: false,
            last_view: None,
            failures: 0,
            credit,
            next_sanity_check: Instant::now(),
        }
    }

    pub async fn run(mut self) {
        let mut spin_tick = tokio::time::interval(Duration::from_secs(1));
        loop {
            while let Ok(req) = self.rx.try_recv() {
                self.queue.push_back(Pending::External(req));
            }

            let next = match self.queue.pop_front() {
                Some(item) => item,
                None => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            self.terminate().await;
                            return;
                        }
                        _ = spin_tick.tick() => {
                            self.spin().await;
                            continue;
                        }
                        req = self.rx.recv() => match req {
                            Some(req) => Pending::External(req),
                            None => { self.terminate().await; return; }
                        },
                    }
                }
            };
            self.dispatch(next).await;
        }
    }

    async fn terminate(&mut self) {
        if self.child.is_some() {
            self.reset_child().await;
        }
    }

    /// Polls the running child and sanity-checks it when no command is
    /// pending; this is the `spin` state's "otherwise" branch.
    async fn spin(&mut self) {
        let Some(child) = self.child.as_mut() else { return };
        match child.try_wait() {
            Ok(Some(status)) => {
                self.child = None;
                self.pid = None;
                if status.success() {
                    self.enqueue_internal(Command::Kill, Value::Null);
                } else {
                    warn!("{}", "child exited non-zero, cycling off/on".color(EXECUTOR));
                    self.failures += 1;
                    self.enqueue_internal(Command::Off, Value::Null);
                    let payload =
                        self.last_view.as_ref().map(|v| serde_json::to_value(v).unwrap_or(Value::Null)).unwrap_or(Value::Null);
                    self.enqueue_internal(Command::On, payload);
                }
            }
            Ok(None) => {
                if Instant::now() >= self.next_sanity_check {
                    self.next_sanity_check = Instant::now() + self.config.check_every;
                    let result = self.lifecycle.sanity_check(self.pid).await;
                    match result {
                        Ok(metrics) if self.failures == 0 => {
                            if let Some(metrics) = metrics {
                                self.hints.set_metrics(metrics);
                            }
                            self.failures = 0;
                            self.credit = self.config.checks;
                        }
                        Ok(_) => self.consume_credit().await,
                        Err(err) => {
                            warn!(%err, "{}", "sanity_check failed".color(EXECUTOR));
                            self.consume_credit().await;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(%err, "{}", "failed to poll child".color(EXECUTOR));
            }
        }
    }

    async fn consume_credit(&mut self) {
        self.credit = self.credit.saturating_sub(1);
        if self.credit == 0 {
            self.enqueue_internal(Command::Off, Value::Null);
            self.credit = self.config.checks;
        }
    }

    fn enqueue_internal(&mut self, command: Command, payload: Value) {
        self.queue.push_back(Pending::Internal(command, payload));
    }

    async fn dispatch(&mut self, pending: Pending) {
        let (command, payload, reply) = match pending {
            Pending::External(req) => (req.command, req.payload, Some(req.reply)),
            Pending::Internal(command, payload) => (command, payload, None),
        };
        let (status, body) = self.handle(command, payload).await;
        if let Some(reply) = reply {
            let _ = reply.send((status, body));
        }
    }

    async fn handle(&mut self, command: Command, payload: Value) -> (u16, Value) {
        match command {
            Command::Check => {
                let view: Option<ClusterView> = serde_json::from_value(payload).ok();
                match view {
                    Some(view) => match self.lifecycle.can_configure(&view).await {
                        Ok(()) => (200, Value::Null),
                        Err(err) => (406, Value::String(err.to_string())),
                    },
                    None => (400, Value::String("missing cluster view".to_string())),
                }
            }
            Command::Off => {
                if self.child.is_some() {
                    self.reset_child().await;
                }
                (200, Value::Null)
            }
            Command::On => self.handle_on(payload).await,
            Command::Ok => {
                let view: Option<ClusterView> = serde_json::from_value(payload).ok();
                match view {
                    Some(view) => match self.lifecycle.configured(&view).await {
                        Ok(()) => (200, Value::Null),
                        Err(err) => (500, Value::String(err.to_string())),
                    },
                    None => (400, Value::String("missing cluster view".to_string())),
                }
            }
            Command::Kill => {
                if self.child.is_some() {
                    self.reset_child().await;
                }
                self.lifecycle.finalize().await;
                self.hints.set_process(ProcessState::Dead);
                let _ = self.terminate_tx.send(()).await;
                (200, Value::Null)
            }
            Command::Signal => match self.lifecycle.signaled(payload, self.hints.process()).await {
                Ok(body) => (200, body.unwrap_or(Value::Null)),
                Err(err) => (500, Value::String(err.to_string())),
            },
        }
    }

    async fn handle_on(&mut self, payload: Value) -> (u16, Value) {
        let view: Option<ClusterView> = serde_json::from_value(payload).ok();

        if self.child.is_some() {
            let deps_changed = match (&view, &self.last_view) {
                (Some(new), Some(old)) => {
                    serde_json::to_string(&new.dependencies).unwrap_or_default()
                        != serde_json::to_string(&old.dependencies).unwrap_or_default()
                }
                _ => false,
            };
            if self.config.strict || deps_changed {
                self.reset_child().await;
            } else {
                return (200, Value::Null);
            }
        }

        if !self.initialized {
            if let Err(err) = self.lifecycle.initialize().await {
                warn!(%err, "{}", "initialize() failed".color(EXECUTOR));
                self.enqueue_internal(Command::Kill, Value::Null);
                return (406, Value::String(err.to_string()));
            }
            self.initialized = true;
        }

        let Some(view) = view else {
            return (400, Value::String("missing cluster view".to_string()));
        };

        let (invocation, env) = match self.lifecycle.configure(&view).await {
            Ok(result) => result,
            Err(err) => {
                warn!(%err, "{}", "configure() failed".color(EXECUTOR));
                self.enqueue_internal(Command::Kill, Value::Null);
                return (406, Value::String(err.to_string()));
            }
        };
        self.last_view = Some(view);

        if self.start || self.spawned_before {
            match self.spawn(&invocation, env).await {
                Ok(()) => {
                    self.spawned_before = true;
                    self.hints.set_process(ProcessState::Running);
                    (200, Value::Null)
                }
                Err(err) => {
                    warn!(%err, "{}", "failed to spawn child".color(EXECUTOR));
                    self.enqueue_internal(Command::Kill, Value::Null);
                    (406, Value::String(err.to_string()))
                }
            }
        } else {
            (200, Value::Null)
        }
    }

    async fn spawn(&mut self, invocation: &str, env: std::collections::BTreeMap<String, String>) -> std::io::Result<()> {
        let mut command = if self.config.shell {
            let mut c = ProcessCommand::new("/bin/sh");
            c.arg("-c").arg(invocation);
            c
        } else {
            let mut parts = invocation.split_whitespace();
            let program = parts.next().unwrap_or(invocation);
            let mut c = ProcessCommand::new(program);
            c.args(parts);
            c
        };
        command.envs(env);
        if let Some(cwd) = &self.config.cwd {
            command.current_dir(cwd);
        }
        if self.config.pipe_subprocess {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        let child = command.spawn()?;
        self.pid = child.id();
        self.child = Some(child);
        self.failures = 0;
        self.credit = self.config.checks;
        self.next_sanity_check = Instant::now() + self.config.check_every;
        info!(pid = ?self.pid, "{}", "spawned child process".color(EXECUTOR));
        Ok(())
    }

    /// `reset`/`wait_for_termination`: polite signal, then grace period,
    /// then a forcible kill -- unless `soft`, in which case the child is
    /// deliberately leaked.
    async fn reset_child(&mut self) {
        let Some(pid) = self.pid else {
            self.child = None;
            return;
        };
        self.hints.set_process(ProcessState::Terminating);
        self.lifecycle.tear_down(pid).await;

        let Some(mut child) = self.child.take() else { return };
        let deadline = Instant::now() + self.config.grace;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        if self.config.soft {
                            warn!(pid, "{}", "grace elapsed, leaking child (soft)".color(EXECUTOR));
                            std::mem::forget(child);
                        } else {
                            warn!(pid, "{}", "grace elapsed, forcing kill".color(EXECUTOR));
                            let _ = child.start_kill();
                            let _ = child.wait().await;
                        }
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Err(_) => break,
            }
        }
        self.child = None;
        self.pid = None;
        self.hints.set_process(ProcessState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_enqueues_append_after_externals() {
        let mut queue: VecDeque<Pending> = VecDeque::new();
        let (reply, _rx) = oneshot::channel();
        queue.push_back(Pending::External(ExecutorRequest { command: Command::Check, payload: Value::Null, reply }));
        queue.push_back(Pending::Internal(Command::Off, Value::Null));
        queue.push_back(Pending::Internal(Command::On, Value::Null));
        let order: Vec<Command> = queue
            .iter()
            .map(|p| match p {
                Pending::External(req) => req.command,
                Pending::Internal(cmd, _) => *cmd,
            })
            .collect();
        assert_eq!(order, vec![Command::Check, Command::Off, Command::On]);
    }

    struct DefaultLifeCycle;

    #[async_trait::async_trait]
    impl LifeCycle for DefaultLifeCycle {
        async fn configure(&self, _view: &ClusterView) -> anyhow::Result<crate::api::ConfigureOutput> {
            unimplemented!()
        }
    }

    fn breadcrumbs() -> warden_types::Breadcrumbs {
        warden_types::Breadcrumbs {
            cluster: "web".into(),
            namespace: "default".into(),
            port: 8080,
            ip: "10.0.0.1".into(),
            public: "10.0.0.1".into(),
            ports: std::collections::BTreeMap::new(),
            node: "node".into(),
            task: "task".into(),
            application: "app".into(),
            seq: 0,
        }
    }

    fn executor_with(config: PipedConfig) -> Executor {
        let (_tx, rx) = mpsc::channel(1);
        let (terminate_tx, _terminate_rx) = mpsc::channel(1);
        Executor::new(
            warden_types::Hints::new(breadcrumbs()),
            Arc::new(DefaultLifeCycle),
            config,
            false,
            rx,
            CancellationToken::new(),
            terminate_tx,
        )
    }

    /// A pod with no custom `sanity_check` override gets the documented
    /// no-op default (`Ok(None)`); that must restore full credit, not
    /// consume it, or every such pod would turn itself off on its first
    /// tick (default `checks == 1`).
    #[tokio::test]
    async fn default_sanity_check_restores_credit_instead_of_consuming_it() {
        let mut executor = executor_with(PipedConfig { checks: 1, ..PipedConfig::default() });
        let child = ProcessCommand::new("sleep").arg("100").stdout(Stdio::null()).stderr(Stdio::null()).spawn().unwrap();
        executor.pid = child.id();
        executor.child = Some(child);
        executor.next_sanity_check = Instant::now() - Duration::from_secs(1);

        executor.spin().await;

        assert_eq!(executor.credit, 1);
        assert!(executor.queue.is_empty());

        if let Some(mut child) = executor.child.take() {
            let _ = child.kill().await;
        }
    }
}
