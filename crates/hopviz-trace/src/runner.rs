use crate::error::ExecutionError;
use log::debug;
use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct TraceSettings {
    pub max_hops: u32,
    /// Probes per hop. `tracert` always sends three and ignores this.
    pub probes: u32,
    pub wait_secs: u64,
    /// Probe with ICMP echo instead of UDP (`traceroute -I`, usually needs root).
    pub icmp: bool,
    /// Skip reverse DNS, so no hostnames are printed.
    pub numeric: bool,
    /// Upper bound on a whole invocation before the child is killed.
    pub timeout: Duration,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            max_hops: 30,
            probes: 3,
            wait_secs: 3,
            icmp: false,
            numeric: false,
            timeout: Duration::from_secs(90),
        }
    }
}

/// The trace utility available on a given host OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceCommand {
    Traceroute,
    Tracert,
}

impl TraceCommand {
    pub fn for_host() -> Self {
        if cfg!(windows) {
            TraceCommand::Tracert
        } else {
            TraceCommand::Traceroute
        }
    }

    pub fn program(self) -> &'static str {
        match self {
            TraceCommand::Traceroute => "traceroute",
            TraceCommand::Tracert => "tracert",
        }
    }

    pub fn args(self, destination: &str, settings: &TraceSettings) -> Vec<String> {
        let mut args = Vec::new();
        match self {
            TraceCommand::Traceroute => {
                if settings.icmp {
                    args.push("-I".to_string());
                }
                if settings.numeric {
                    args.push("-n".to_string());
                }
                args.extend([
                    "-q".to_string(),
                    settings.probes.max(1).to_string(),
                    "-m".to_string(),
                    settings.max_hops.to_string(),
                    "-w".to_string(),
                    settings.wait_secs.max(1).to_string(),
                ]);
            }
            TraceCommand::Tracert => {
                if settings.numeric {
                    args.push("-d".to_string());
                }
                args.extend([
                    "-h".to_string(),
                    settings.max_hops.to_string(),
                    "-w".to_string(),
                    (settings.wait_secs.max(1) * 1000).to_string(),
                ]);
            }
        }
        args.push(destination.to_string());
        args
    }
}

/// Source of raw trace output. The aggregator only talks to this seam.
pub trait TracerouteRunner {
    fn run(&self, destination: &str, settings: &TraceSettings) -> Result<String, ExecutionError>;
}

/// Runs the host's trace utility as a child process.
#[derive(Debug, Clone, Copy)]
pub struct SystemTracerouteRunner {
    command: TraceCommand,
}

impl SystemTracerouteRunner {
    pub fn new(command: TraceCommand) -> Self {
        Self { command }
    }
}

impl Default for SystemTracerouteRunner {
    fn default() -> Self {
        Self::new(TraceCommand::for_host())
    }
}

impl TracerouteRunner for SystemTracerouteRunner {
    fn run(&self, destination: &str, settings: &TraceSettings) -> Result<String, ExecutionError> {
        let args = self.command.args(destination, settings);
        run_command(self.command.program(), &args, destination, settings.timeout)
    }
}

pub fn run_trace(destination: &str, settings: &TraceSettings) -> Result<String, ExecutionError> {
    SystemTracerouteRunner::default().run(destination, settings)
}

fn run_command(
    program: &'static str,
    args: &[String],
    destination: &str,
    timeout: Duration,
) -> Result<String, ExecutionError> {
    debug!("running {} {}", program, args.join(" "));

    let spawn_error = |source: std::io::Error| {
        if source.kind() == ErrorKind::NotFound {
            ExecutionError::NotFound { program }
        } else {
            ExecutionError::Spawn {
                program,
                destination: destination.to_string(),
                source,
            }
        }
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_error)?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                stop(&mut child);
                return Err(ExecutionError::TimedOut {
                    program,
                    destination: destination.to_string(),
                    after: timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                stop(&mut child);
                return Err(ExecutionError::Spawn {
                    program,
                    destination: destination.to_string(),
                    source,
                });
            }
        }
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if !status.success() {
        return Err(ExecutionError::Failed {
            program,
            destination: destination.to_string(),
            status,
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&stdout).to_string())
}

/// Kills the child and reaps it so no zombie is left behind.
fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}
