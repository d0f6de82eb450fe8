//! Test doubles shared by the unit tests of this crate

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use monokit_core::RunnerError;

use crate::runner::{ContainerRunner, ExecOutput};

type Respond = Box<dyn Fn(&[String]) -> Result<ExecOutput, RunnerError> + Send + Sync>;

/// Runner that records every call and answers from a script
pub(crate) struct ScriptedRunner {
    calls: Mutex<Vec<Vec<String>>>,
    envs: Mutex<Vec<HashMap<String, String>>>,
    respond: Respond,
}

impl ScriptedRunner {
    /// Answer every call with `respond`
    pub(crate) fn new(respond: impl Fn(&[String]) -> Result<ExecOutput, RunnerError> + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            envs: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Every call succeeds with stdout `ok`
    pub(crate) fn ok() -> Self {
        Self::new(|_| Ok(ExecOutput::success("ok")))
    }

    /// Calls whose argv contains `needle` exit with `code`
    pub(crate) fn failing_on(needle: &'static str, code: i32) -> Self {
        Self::new(move |argv| {
            if argv.iter().any(|a| a == needle) {
                Ok(ExecOutput {
                    exit_code: code,
                    stdout: String::new(),
                    stderr: format!("{} failed", needle),
                })
            } else {
                Ok(ExecOutput::success("ok"))
            }
        })
    }

    pub(crate) fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn envs(&self) -> Vec<HashMap<String, String>> {
        self.envs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRunner for ScriptedRunner {
    async fn run(&self, argv: &[String], env: &HashMap<String, String>) -> Result<ExecOutput, RunnerError> {
        self.calls.lock().unwrap().push(argv.to_vec());
        self.envs.lock().unwrap().push(env.clone());
        (self.respond)(argv)
    }
}

/// Runner that holds every call for `delay` and tracks how many overlap
pub(crate) struct GaugeRunner {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl GaugeRunner {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Highest number of calls seen running at once
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerRunner for GaugeRunner {
    async fn run(&self, _argv: &[String], _env: &HashMap<String, String>) -> Result<ExecOutput, RunnerError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(ExecOutput::success("ok"))
    }
}
