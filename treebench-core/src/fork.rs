//! Isolation Channel
//!
//! Runs one case in a freshly spawned replica of the harness binary so a
//! measurement never sees interpreter state left behind by earlier cases.
//! The parent sends a single request naming the tree path down to the
//! target; the child re-materializes only that path, streams one result
//! per repetition back over an inherited pipe and exits.
//!
//! Uses fd 3/4 for IPC (advertised via `TREEBENCH_IPC_FD`), with a
//! stdin/stdout fallback when the variable is absent.

use std::env;
use std::fs::File;
use std::io::{Read, Write};
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

use tracing::debug;

use crate::suite::Session;
use crate::CoreError;
use treebench_ipc::{
    CaseOptions, CaseRequest, CaseResult, ChildMessage, CmdlineOverrides, FrameError, FrameReader,
    FrameWriter, IPC_FD_ENV, PROTOCOL_VERSION,
};

/// Hidden flag that switches a spawned harness binary into child mode.
pub const CHILD_FLAG: &str = "--tree-child";

/// Result of polling for data
#[derive(Debug)]
enum PollResult {
    DataAvailable,
    Timeout,
    PipeClosed,
    Error(std::io::Error),
}

/// Wait for data to be available on a file descriptor with timeout
fn wait_for_data(fd: RawFd, timeout_ms: i32) -> PollResult {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    let result = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };

    if result < 0 {
        PollResult::Error(std::io::Error::last_os_error())
    } else if result == 0 {
        PollResult::Timeout
    } else if pollfd.revents & libc::POLLIN != 0 {
        // Data first: a closing pipe may still hold final messages.
        PollResult::DataAvailable
    } else if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        PollResult::PipeClosed
    } else {
        PollResult::Timeout
    }
}

/// Create a pipe pair, returning (read_fd, write_fd).
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // Close-on-exec on both ends; pre_exec clears it for the two we pass.
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

fn is_alive(child: &mut Child) -> bool {
    matches!(child.try_wait(), Ok(None))
}

/// Spawn a child replica for the given tree path and collect one raw
/// result per repetition.
///
/// `options` are the target case's effective options; the child receives
/// only the raw overrides and resolves the same effective values from its
/// own registration of the suite.
pub(crate) fn run_isolated(
    path: &[String],
    options: &CaseOptions,
    overrides: &CmdlineOverrides,
) -> Result<Vec<CaseResult>, CoreError> {
    let binary = env::current_exe().map_err(CoreError::Spawn)?;

    // cmd_pipe: parent writes the request → child reads from fd 3
    let (cmd_read, cmd_write) = create_pipe().map_err(CoreError::Spawn)?;
    // msg_pipe: child writes results from fd 4 → parent reads
    let (msg_read, msg_write) = match create_pipe() {
        Ok(fds) => fds,
        Err(e) => {
            close_fd(cmd_read);
            close_fd(cmd_write);
            return Err(CoreError::Spawn(e));
        }
    };

    let mut command = Command::new(&binary);
    command
        .arg(CHILD_FLAG)
        .args(&options.fork_args)
        .env(IPC_FD_ENV, "3,4")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit());
    for (key, value) in &options.fork_env {
        command.env(key, value);
    }

    // In the child: dup cmd_read→3, msg_write→4, close originals.
    unsafe {
        command.pre_exec(move || {
            if cmd_read != 3 {
                libc::dup2(cmd_read, 3);
                libc::close(cmd_read);
            }
            let flags = libc::fcntl(3, libc::F_GETFD);
            libc::fcntl(3, libc::F_SETFD, flags & !libc::FD_CLOEXEC);

            if msg_write != 4 {
                libc::dup2(msg_write, 4);
                libc::close(msg_write);
            }
            let flags = libc::fcntl(4, libc::F_GETFD);
            libc::fcntl(4, libc::F_SETFD, flags & !libc::FD_CLOEXEC);

            // Close the parent-side ends that leaked into the child
            libc::close(cmd_write);
            libc::close(msg_read);

            Ok(())
        });
    }

    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => {
            close_fd(cmd_read);
            close_fd(cmd_write);
            close_fd(msg_read);
            close_fd(msg_write);
            return Err(CoreError::Spawn(e));
        }
    };

    // Close the child-side ends in the parent
    close_fd(cmd_read);
    close_fd(msg_write);

    let mut writer = FrameWriter::new(unsafe { File::from_raw_fd(cmd_write) });
    let mut reader = FrameReader::new(unsafe { File::from_raw_fd(msg_read) });

    let request = CaseRequest {
        protocol_version: PROTOCOL_VERSION,
        case: path.to_vec(),
        cmdline_overrides: *overrides,
    };
    writer.write(&request)?;

    let mut results = Vec::new();
    let mut failure: Option<String> = None;
    loop {
        if !reader.has_buffered_data() {
            match wait_for_data(msg_read, 100) {
                PollResult::DataAvailable => {}
                PollResult::Timeout => {
                    // A dead child with no pending data will never send more.
                    if !is_alive(&mut child) {
                        break;
                    }
                    continue;
                }
                PollResult::PipeClosed => break,
                PollResult::Error(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CoreError::Io(e));
                }
            }
        }

        match reader.read::<ChildMessage>() {
            Ok(ChildMessage::Result(result)) => results.push(result),
            Ok(ChildMessage::Failure { message }) => {
                failure = Some(message);
                break;
            }
            Err(FrameError::EndOfStream) => break,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CoreError::Ipc(e));
            }
        }
    }

    // The case resolves only once the child is gone.
    let status = child.wait().map_err(CoreError::Io)?;
    debug!(?status, received = results.len(), "isolated child finished");

    let path_string = path.join("|");
    if let Some(message) = failure {
        return Err(CoreError::ChildFailure {
            path: path_string,
            message,
        });
    }
    // A child that dies before transmitting anything is "no data
    // collected", which must stay distinguishable from a legitimate
    // zero-repeat empty result set.
    if results.is_empty() && options.repeat > 0 {
        return Err(CoreError::ChildNoData { path: path_string });
    }
    Ok(results)
}

/// IPC transport: either inherited fd pair or stdin/stdout fallback.
enum IpcTransport {
    Fds { read_fd: i32, write_fd: i32 },
    Stdio,
}

fn detect_transport() -> IpcTransport {
    if let Ok(val) = env::var(IPC_FD_ENV) {
        let parts: Vec<&str> = val.split(',').collect();
        if parts.len() == 2 {
            if let (Ok(r), Ok(w)) = (parts[0].parse::<i32>(), parts[1].parse::<i32>()) {
                return IpcTransport::Fds {
                    read_fd: r,
                    write_fd: w,
                };
            }
        }
        eprintln!(
            "treebench: warning: invalid {IPC_FD_ENV}={val:?} (expected <read_fd>,<write_fd>), falling back to stdio"
        );
    }
    IpcTransport::Stdio
}

/// Entry point of the isolated-child role.
///
/// Reads the single case request, re-registers the named suite and runs
/// the requested path with results streaming back to the parent. Called
/// by the CLI front-end when the hidden child flag is present.
pub fn child_main() -> Result<(), CoreError> {
    let (read, write): (Box<dyn Read>, Box<dyn Write>) = match detect_transport() {
        IpcTransport::Fds { read_fd, write_fd } => (
            Box::new(unsafe { File::from_raw_fd(read_fd) }),
            Box::new(unsafe { File::from_raw_fd(write_fd) }),
        ),
        IpcTransport::Stdio => (Box::new(std::io::stdin()), Box::new(std::io::stdout())),
    };

    let mut reader = FrameReader::new(read);
    let request: CaseRequest = reader.read()?;
    let session = Session::child(request.cmdline_overrides, FrameWriter::new(write));

    if request.protocol_version != PROTOCOL_VERSION {
        let err = CoreError::ProtocolMismatch {
            parent: request.protocol_version,
            child: PROTOCOL_VERSION,
        };
        let _ = session.send_failure(&err.to_string());
        return Err(err);
    }

    match session.run(&request.case) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = session.send_failure(&e.to_string());
            Err(e)
        }
    }
}
